//! Bulk output rendering
//!
//! Stage 1 groups raw retrieval results per file, merges their blocks and
//! emits annotated code-fenced text; stage 2 enforces the global byte
//! budget by truncating or excluding the largest files.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use super::hints::DiagnosticHints;
use super::related::{RelatedSymbolThresholds, render_related_symbols_hint};
use super::{RelatedSymbol, SymDefResults, SymbolRetrievalResult};
use crate::error::RetrieveError;
use crate::parser::{Language, ParseCache};
use crate::symbol::{SourceBlock, merge_adjacent_or_overlapping};
use crate::workspace::Workspace;

/// Sentinel symbol name for whole-file results.
pub(crate) const WILDCARD: &str = "*";

// ============================================================================
// Merged Results
// ============================================================================

/// Per-file merged view: blocks and related symbols keyed by the sorted,
/// comma-joined names of the contributing symbols; errors indexed by the
/// original symbol name.
pub struct MergedSymbolRetrievalResult {
    pub relative_path: String,
    pub source_blocks: BTreeMap<String, Vec<SourceBlock>>,
    pub related_symbols: BTreeMap<String, Vec<RelatedSymbol>>,
    pub errors: Vec<(String, RetrieveError)>,
    /// Symbols that had more than one definition block before merging.
    pub multiply_defined: Vec<String>,
}

/// Merge all successful blocks of one file's results, labeling each
/// merged block with the sorted, deduplicated names of the symbols whose
/// original blocks it contains.
pub(crate) fn merge_file_results(
    relative_path: String,
    results: Vec<SymbolRetrievalResult>,
) -> MergedSymbolRetrievalResult {
    let mut errors = Vec::new();
    let mut labeled: Vec<(String, SourceBlock)> = Vec::new();
    let mut related_by_name: BTreeMap<String, Vec<RelatedSymbol>> = BTreeMap::new();
    let mut multiply_defined = Vec::new();

    for result in results {
        match result.error {
            Some(error) => errors.push((result.symbol_name, error)),
            None => {
                if result.source_blocks.len() > 1
                    && !result.symbol_name.is_empty()
                    && result.symbol_name != WILDCARD
                {
                    multiply_defined.push(result.symbol_name.clone());
                }
                if !result.related_symbols.is_empty() {
                    related_by_name
                        .entry(result.symbol_name.clone())
                        .or_default()
                        .extend(result.related_symbols);
                }
                for block in result.source_blocks {
                    labeled.push((result.symbol_name.clone(), block));
                }
            }
        }
    }

    let mut source_blocks: BTreeMap<String, Vec<SourceBlock>> = BTreeMap::new();
    let mut related_symbols: BTreeMap<String, Vec<RelatedSymbol>> = BTreeMap::new();
    if let Some((_, first)) = labeled.first() {
        let source = Arc::clone(&first.source);
        let blocks: Vec<SourceBlock> = labeled.iter().map(|(_, b)| b.clone()).collect();
        let merged = merge_adjacent_or_overlapping(blocks, &source);
        for block in merged {
            let names: BTreeSet<&str> = labeled
                .iter()
                .filter(|(_, original)| block.range.contains_rows(&original.range))
                .map(|(name, _)| name.as_str())
                .collect();
            let key = names.into_iter().collect::<Vec<_>>().join(",");
            if !related_symbols.contains_key(&key) {
                let related: Vec<RelatedSymbol> = key
                    .split(',')
                    .filter_map(|name| related_by_name.get(name))
                    .flatten()
                    .cloned()
                    .collect();
                if !related.is_empty() {
                    related_symbols.insert(key.clone(), related);
                }
            }
            source_blocks.entry(key).or_default().push(block);
        }
    }

    MergedSymbolRetrievalResult {
        relative_path,
        source_blocks,
        related_symbols,
        errors,
        multiply_defined,
    }
}

// ============================================================================
// Stage 1: Per-File Composition
// ============================================================================

/// A file's rendered content and failure text, before budget enforcement.
pub(crate) struct FileOutput {
    pub relative_path: String,
    pub content: String,
    pub failures: String,
}

pub(crate) fn compose_file_outputs(
    workspace: &Workspace,
    cache: &ParseCache,
    results: Vec<SymbolRetrievalResult>,
    thresholds: &RelatedSymbolThresholds,
) -> Vec<FileOutput> {
    let hints = DiagnosticHints::new(workspace, cache);
    let mut by_path: BTreeMap<String, Vec<SymbolRetrievalResult>> = BTreeMap::new();
    for result in results {
        by_path
            .entry(result.relative_path.clone())
            .or_default()
            .push(result);
    }

    let mut outputs = Vec::with_capacity(by_path.len());
    for (path, file_results) in by_path {
        let merged = merge_file_results(path.clone(), file_results);
        let mut content = String::new();
        let mut failures = String::new();

        for (symbol_name, error) in &merged.errors {
            let hint = hints.hint_for_failure(&path, symbol_name, error);
            content.push_str(&hint);
            content.push('\n');
            failures.push_str(&hint);
            failures.push('\n');
        }

        // Flatten the keyed groups back into row order for emission.
        let mut ordered: Vec<(&str, &SourceBlock)> = merged
            .source_blocks
            .iter()
            .flat_map(|(key, blocks)| blocks.iter().map(move |b| (key.as_str(), b)))
            .collect();
        ordered.sort_by_key(|(_, block)| block.range.start.row);

        let fence_tag = Language::from_path(Path::new(&path)).fence_tag();
        for (key, block) in ordered {
            emit_block(&mut content, &path, key, block, fence_tag);
            if let Some(related) = merged.related_symbols.get(key) {
                content.push_str(&render_related_symbols_hint(&path, related, thresholds));
            }
        }

        for name in &merged.multiply_defined {
            content.push_str(&format!(
                "NOTE: Multiple definitions were found for symbol {name}\n"
            ));
        }

        outputs.push(FileOutput {
            relative_path: path,
            content,
            failures,
        });
    }
    outputs
}

fn emit_block(content: &mut String, path: &str, key: &str, block: &SourceBlock, fence_tag: &str) {
    let names: Vec<&str> = key.split(',').collect();
    let display_names: Vec<&str> = names
        .iter()
        .copied()
        .filter(|n| !n.is_empty() && *n != WILDCARD)
        .collect();
    let wildcard = names.contains(&WILDCARD);

    content.push_str(&format!("File: {path}\n"));
    match display_names.len() {
        0 => {}
        1 => content.push_str(&format!("Symbol: {}\n", display_names[0])),
        _ => content.push_str(&format!("Symbols: {}\n", display_names.join(", "))),
    }
    let start = block.range.start.row + 1;
    let end = block.range.end.row + 1;
    if wildcard {
        content.push_str(&format!("Lines: {start}-{end} (full file)\n"));
    } else {
        content.push_str(&format!("Lines: {start}-{end}\n"));
    }
    content.push_str(&format!("```{fence_tag}\n"));
    let text = block.text();
    content.push_str(text);
    if !text.ends_with('\n') {
        content.push('\n');
    }
    content.push_str("```\n\n");
}

// ============================================================================
// Stage 2: Budget Enforcement
// ============================================================================

fn truncation_notice(truncated: usize) -> String {
    format!("NOTE: {truncated} bytes were truncated from this file's output.\n")
}

fn exclusion_message(original_size: usize) -> String {
    format!("{original_size} bytes: exceeded 1MB limit for a single bulk request\n\n")
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    index = index.min(text.len());
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// Enforce the global byte budget and concatenate the final artifact.
/// Failures are never truncated; only rendered symbol content is reduced.
///
/// Files are visited once, largest first; each is either truncated by
/// exactly the current excess, excluded entirely, or (when smaller than
/// the exclusion message itself) kept intact.
pub(crate) fn render(mut outputs: Vec<FileOutput>, max_bytes: usize) -> SymDefResults {
    let mut total: usize = outputs.iter().map(|o| o.content.len()).sum();

    let mut order: Vec<usize> = (0..outputs.len()).collect();
    order.sort_by_key(|&i| std::cmp::Reverse(outputs[i].content.len()));
    for idx in order {
        if total <= max_bytes {
            break;
        }
        let excess = total - max_bytes;
        let content_len = outputs[idx].content.len();

        // The notice length depends on the count of truncated bytes;
        // two or three fixed-point passes settle it.
        let mut truncated = excess;
        for _ in 0..3 {
            truncated = excess + truncation_notice(truncated).len();
        }

        if truncated < content_len {
            let keep = floor_char_boundary(&outputs[idx].content, content_len - truncated);
            let mut replacement = truncation_notice(truncated);
            replacement.push_str(&outputs[idx].content[..keep]);
            debug!(
                "truncated {truncated} bytes from {}",
                outputs[idx].relative_path
            );
            outputs[idx].content = replacement;
        } else {
            let exclusion = exclusion_message(content_len);
            if exclusion.len() < content_len {
                debug!("excluded {} from the output", outputs[idx].relative_path);
                outputs[idx].content = exclusion;
            }
        }
        total = outputs.iter().map(|o| o.content.len()).sum();
    }

    outputs.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    let mut symbol_definitions = String::with_capacity(total);
    let mut failures = String::new();
    for output in outputs {
        symbol_definitions.push_str(&output.content);
        failures.push_str(&output.failures);
    }
    SymDefResults {
        symbol_definitions,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::LineIndex;

    fn block_for(source: &Arc<str>, name: Option<&str>, start_row: u32, end_row: u32) -> SourceBlock {
        let index = LineIndex::new(source);
        let name_range = name.map(|_| crate::symbol::Range::default());
        SourceBlock::from_rows(Arc::clone(source), &index, start_row, end_row, name_range)
    }

    fn result(path: &str, name: &str, blocks: Vec<SourceBlock>) -> SymbolRetrievalResult {
        SymbolRetrievalResult {
            relative_path: path.to_string(),
            symbol_name: name.to_string(),
            source_blocks: blocks,
            related_symbols: Vec::new(),
            error: None,
        }
    }

    fn output(path: &str, content: String) -> FileOutput {
        FileOutput {
            relative_path: path.to_string(),
            content,
            failures: String::new(),
        }
    }

    #[test]
    fn emit_block_formats_header_and_fence() {
        let source: Arc<str> = Arc::from("package cools\n\nfunc TestFunc() {\n}\n");
        let block = block_for(&source, Some("TestFunc"), 0, 3);
        let mut content = String::new();
        emit_block(&mut content, "file0.go", ",TestFunc", &block, "go");
        assert_eq!(
            content,
            "File: file0.go\nSymbol: TestFunc\nLines: 1-4\n```go\npackage cools\n\nfunc TestFunc() {\n}\n```\n\n"
        );
    }

    #[test]
    fn emit_block_wildcard_suffix_and_no_symbol_line() {
        let source: Arc<str> = Arc::from("a\nb\n");
        let block = block_for(&source, None, 0, 1);
        let mut content = String::new();
        emit_block(&mut content, "x.vue", WILDCARD, &block, "vue");
        assert!(content.contains("Lines: 1-2 (full file)\n"));
        assert!(!content.contains("Symbol:"));
    }

    #[test]
    fn lines_header_round_trips() {
        let source: Arc<str> = Arc::from("l0\nl1\nl2\nl3\nl4\n");
        let block = block_for(&source, Some("s"), 1, 3);
        let mut content = String::new();
        emit_block(&mut content, "f.go", "s", &block, "go");
        let lines_line = content
            .lines()
            .find(|l| l.starts_with("Lines: "))
            .unwrap();
        let range = lines_line.trim_start_matches("Lines: ");
        let (a, b) = range.split_once('-').unwrap();
        assert_eq!(a.parse::<u32>().unwrap(), block.range.start.row + 1);
        assert_eq!(b.parse::<u32>().unwrap(), block.range.end.row + 1);
    }

    #[test]
    fn merge_groups_blocks_and_labels_by_contributors() {
        let source: Arc<str> = Arc::from("func a\n\nfunc b\nX\nX\nfunc c\n");
        let results = vec![
            result("f.go", "a", vec![block_for(&source, Some("a"), 0, 0)]),
            result("f.go", "b", vec![block_for(&source, Some("b"), 2, 2)]),
            result("f.go", "c", vec![block_for(&source, Some("c"), 5, 5)]),
        ];
        let merged = merge_file_results("f.go".to_string(), results);
        let keys: Vec<&String> = merged.source_blocks.keys().collect();
        assert_eq!(keys, vec!["a,b", "c"]);
    }

    #[test]
    fn multiply_defined_symbols_are_recorded() {
        let source: Arc<str> = Arc::from("func x\nA\nA\nA\nfunc x\n");
        let results = vec![result(
            "f.go",
            "x",
            vec![
                block_for(&source, Some("x"), 0, 0),
                block_for(&source, Some("x"), 4, 4),
            ],
        )];
        let merged = merge_file_results("f.go".to_string(), results);
        assert_eq!(merged.multiply_defined, vec!["x"]);
        assert_eq!(merged.source_blocks.get("x").map(Vec::len), Some(2));
    }

    #[test]
    fn render_within_budget_is_untouched() {
        let results = render(vec![output("a.go", "short\n".to_string())], 1024);
        assert_eq!(results.symbol_definitions, "short\n");
    }

    #[test]
    fn render_truncates_largest_file_to_fit() {
        let big = "x".repeat(800);
        let small = "y".repeat(100);
        let results = render(
            vec![output("big.go", big), output("small.go", small)],
            512,
        );
        assert!(results.symbol_definitions.len() <= 512);
        assert!(results
            .symbol_definitions
            .contains("bytes were truncated from this file's output."));
        assert!(results.symbol_definitions.contains(&"y".repeat(100)));
    }

    #[test]
    fn render_truncation_hits_budget_exactly() {
        let big = "x".repeat(2000);
        let results = render(vec![output("a.go", big)], 1000);
        assert_eq!(results.symbol_definitions.len(), 1000);
        assert!(results.symbol_definitions.starts_with("NOTE: "));
    }

    #[test]
    fn render_excludes_file_when_truncation_cannot_save_enough() {
        let huge = "z".repeat(400);
        let other = "w".repeat(400);
        // Budget far below a single file: exclusion replaces the content.
        let results = render(vec![output("a.go", huge), output("b.go", other)], 100);
        assert!(results
            .symbol_definitions
            .contains("400 bytes: exceeded 1MB limit for a single bulk request"));
    }

    #[test]
    fn render_keeps_tiny_files_intact() {
        let tiny = "ab\n".to_string();
        let results = render(vec![output("a.go", tiny.clone())], 1);
        // The exclusion message is larger than the file; it stays.
        assert_eq!(results.symbol_definitions, tiny);
    }

    #[test]
    fn render_orders_files_by_path() {
        let results = render(
            vec![
                output("z.go", "Z\n".to_string()),
                output("a.go", "A\n".to_string()),
            ],
            1024,
        );
        assert_eq!(results.symbol_definitions, "A\nZ\n");
    }

    #[test]
    fn failures_are_never_truncated() {
        let mut out = output("a.go", "c".repeat(500));
        out.failures = "failure text\n".to_string();
        let results = render(vec![out], 100);
        assert_eq!(results.failures, "failure text\n");
    }
}
