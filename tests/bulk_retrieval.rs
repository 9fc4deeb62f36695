//! End-to-end retrieval tests over temporary workspaces.

use symscope::{DirectorySymDefRequest, FileSymDefRequest, SymbolRetriever};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn request(path: &str, names: &[&str]) -> FileSymDefRequest {
    FileSymDefRequest {
        file_path: path.to_string(),
        symbol_names: names.iter().map(|s| s.to_string()).collect(),
    }
}

async fn run(
    workspace: &TempDir,
    requests: Vec<FileSymDefRequest>,
    num_context_lines: Option<u32>,
) -> symscope::SymDefResults {
    let retriever = SymbolRetriever::new();
    let cancel = CancellationToken::new();
    retriever
        .bulk_get_symbol_definitions(
            &cancel,
            DirectorySymDefRequest {
                workspace_root: workspace.path().to_path_buf(),
                requests,
                num_context_lines,
                include_related_symbols: false,
            },
        )
        .await
        .expect("bulk retrieval")
}

#[tokio::test]
async fn single_function_with_header_merges_into_one_block() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("file0.go"),
        "package cools\n\nfunc TestFunc() {\n\tprintln(\"Hello, world!\")\n}\n",
    )
    .unwrap();

    let results = run(&dir, vec![request("file0.go", &["TestFunc"])], Some(0)).await;

    assert_eq!(
        results.symbol_definitions,
        "File: file0.go\nSymbol: TestFunc\nLines: 1-5\n```go\npackage cools\n\nfunc TestFunc() {\n\tprintln(\"Hello, world!\")\n}\n```\n\n"
    );
    assert_eq!(results.failures, "");
}

#[tokio::test]
async fn duplicate_definitions_emit_two_blocks_and_a_note() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("dup.go"),
        "package dup\n\nfunc TestFunc() {\n\tprintln(\"one\")\n}\n\nfunc Unrelated() {\n\tprintln(\"mid\")\n}\n\nfunc TestFunc() {\n\tprintln(\"two\")\n}\n",
    )
    .unwrap();

    let results = run(&dir, vec![request("dup.go", &["TestFunc"])], Some(0)).await;

    let symbol_headers = results
        .symbol_definitions
        .matches("Symbol: TestFunc\n")
        .count();
    assert_eq!(symbol_headers, 2);
    assert!(results
        .symbol_definitions
        .contains("NOTE: Multiple definitions were found for symbol TestFunc"));
}

#[tokio::test]
async fn missing_symbol_hints_at_the_defining_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("primary.go"), "package p\n\nfunc Local() {}\n").unwrap();
    std::fs::write(
        dir.path().join("other_file.go"),
        "package p\n\nfunc ExistsElsewhere() {}\n",
    )
    .unwrap();

    let results = run(
        &dir,
        vec![request("primary.go", &["ExistsElsewhere"])],
        Some(0),
    )
    .await;

    let hint = "The symbol 'ExistsElsewhere' is defined in: other_file.go";
    assert!(results.symbol_definitions.contains(hint));
    assert!(results.failures.contains(hint));
}

#[tokio::test]
async fn wildcard_request_renders_the_full_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("whole.go"),
        "package whole\n\nfunc A() {}\n\nfunc B() {}\n",
    )
    .unwrap();

    let results = run(&dir, vec![request("whole.go", &[])], Some(0)).await;

    assert!(results.symbol_definitions.contains("Lines: 1-5 (full file)\n"));
    assert!(!results.symbol_definitions.contains("Symbol:"));
}

#[tokio::test]
async fn blank_separated_symbols_merge_and_code_separated_do_not() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("merge.go"),
        "package m\n\nfunc A() {}\n\nfunc B() {}\n\nvar skip = 1\n\nfunc C() {}\n",
    )
    .unwrap();

    let merged = run(&dir, vec![request("merge.go", &["A", "B"])], Some(0)).await;
    assert!(merged.symbol_definitions.contains("Symbols: A, B\n"));

    let split = run(&dir, vec![request("merge.go", &["B", "C"])], Some(0)).await;
    // `var skip` sits between them, so they stay apart.
    assert!(split.symbol_definitions.contains("Symbol: B\n"));
    assert!(split.symbol_definitions.contains("Symbol: C\n"));
    assert!(!split.symbol_definitions.contains("Symbols: B, C\n"));
}

#[tokio::test]
async fn file_without_trailing_newline_includes_last_line() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("tail.go"),
        "package tail\n\nfunc Last() {}",
    )
    .unwrap();

    let results = run(&dir, vec![request("tail.go", &[])], Some(0)).await;

    assert!(results.symbol_definitions.contains("Lines: 1-3 (full file)\n"));
    assert!(results.symbol_definitions.contains("func Last() {}\n```"));
}

#[tokio::test]
async fn dot_suffix_fallback_finds_the_method() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("recv.go"),
        "package r\n\ntype Box struct{}\n\nfunc (b Box) Open() {}\n",
    )
    .unwrap();

    // `pkg.Box.Open` matches nothing directly nor as an alternative name;
    // the tail after the final dot does.
    let results = run(&dir, vec![request("recv.go", &["pkg.Box.Open"])], Some(0)).await;
    assert!(results.symbol_definitions.contains("Symbol: pkg.Box.Open\n"));
    assert!(results.symbol_definitions.contains("func (b Box) Open() {}"));
    assert_eq!(results.failures, "");
}

#[tokio::test]
async fn unknown_extension_produces_failure_hint() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("data.csv"), "a,b,c\n").unwrap();

    let results = run(&dir, vec![request("data.csv", &["Column"])], Some(0)).await;

    assert!(results.failures.contains("unsupported language"));
    assert!(results.symbol_definitions.contains("unsupported language"));
}

#[tokio::test]
async fn missing_file_suggests_similar_paths() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("pkg")).unwrap();
    std::fs::write(
        dir.path().join("pkg/server.go"),
        "package pkg\n\nfunc Serve() {}\n",
    )
    .unwrap();

    let results = run(&dir, vec![request("pkg/servre.go", &["Serve"])], Some(0)).await;

    assert!(results.failures.contains("Did you mean"));
    assert!(results.failures.contains("pkg/server.go"));
}

#[tokio::test]
async fn output_is_sorted_by_path() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("zz.go"), "package z\n\nfunc Z() {}\n").unwrap();
    std::fs::write(dir.path().join("aa.go"), "package a\n\nfunc A() {}\n").unwrap();

    let results = run(
        &dir,
        vec![request("zz.go", &["Z"]), request("aa.go", &["A"])],
        Some(0),
    )
    .await;

    let first = results.symbol_definitions.find("File: aa.go").unwrap();
    let second = results.symbol_definitions.find("File: zz.go").unwrap();
    assert!(first < second);
}

#[tokio::test]
async fn oversized_output_is_truncated_to_the_budget() {
    let dir = TempDir::new().unwrap();
    for name in ["big1.go", "big2.go"] {
        let mut content = String::from("package big\n\n");
        while content.len() < 600 * 1024 {
            content.push_str("// filler filler filler filler filler filler filler filler\n");
        }
        std::fs::write(dir.path().join(name), content).unwrap();
    }

    let results = run(
        &dir,
        vec![request("big1.go", &[]), request("big2.go", &[])],
        Some(0),
    )
    .await;

    assert!(results.symbol_definitions.len() <= 1024 * 1024);
    assert!(results
        .symbol_definitions
        .contains("bytes were truncated from this file's output."));
}

#[tokio::test]
async fn far_oversized_files_are_excluded_and_small_ones_kept() {
    let dir = TempDir::new().unwrap();
    for name in ["huge1.go", "huge2.go", "huge3.go"] {
        let mut content = String::from("package huge\n\n");
        while content.len() < 900 * 1024 {
            content.push_str("// filler filler filler filler filler filler filler filler\n");
        }
        std::fs::write(dir.path().join(name), content).unwrap();
    }
    std::fs::write(dir.path().join("small.go"), "package small\n\nfunc S() {}\n").unwrap();

    let results = run(
        &dir,
        vec![
            request("huge1.go", &[]),
            request("huge2.go", &[]),
            request("huge3.go", &[]),
            request("small.go", &["S"]),
        ],
        Some(0),
    )
    .await;

    assert!(results.symbol_definitions.len() <= 1024 * 1024);
    assert!(results
        .symbol_definitions
        .contains("bytes: exceeded 1MB limit for a single bulk request"));
    assert!(results.symbol_definitions.contains("func S() {}"));
    assert_eq!(results.failures, "");
}

#[tokio::test]
async fn component_file_request_by_component_name_is_a_wildcard() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("MyWidget.vue"),
        "<template>\n  <div/>\n</template>\n",
    )
    .unwrap();

    let results = run(
        &dir,
        vec![request("MyWidget.vue", &["my_widget"])],
        Some(0),
    )
    .await;

    assert!(results.symbol_definitions.contains("Lines: 1-3 (full file)\n"));
    assert!(results.symbol_definitions.contains("```vue\n"));
}
