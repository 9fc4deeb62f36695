//! Workspace-edit application
//!
//! Applies versioned text-document edits to files on disk, preserving the
//! file's detected line endings, and drives the source-fix code actions
//! (`source.fixAll`, `source.organizeImports`) that produce such edits.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use lsp_types::{
    CodeActionKind, CodeActionOrCommand, DocumentChangeOperation, DocumentChanges, OneOf,
    TextEdit, WorkspaceEdit,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::client::{LspClient, LspError, uri_for_path};
use crate::symbol::LineIndex;
use crate::workspace::Workspace;

/// Edit application errors.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("text edits overlap at line {line}, column {column}")]
    Overlap { line: u32, column: u32 },

    #[error("invalid document URI: {0}")]
    InvalidUri(String),

    #[error("language server error: {0}")]
    Lsp(#[from] LspError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Text Edit Application
// ============================================================================

/// Apply a set of text edits to document contents.
///
/// Edits are sorted descending by start position and applied in order so
/// earlier offsets stay valid. Overlapping edits fail. Line endings are
/// detected from the contents (CRLF if any `\r\n` is present, else LF)
/// and preserved in the result.
pub fn apply_text_edits(content: &str, edits: &[TextEdit]) -> Result<String, EditError> {
    let crlf = content.contains("\r\n");
    let mut text = if crlf {
        content.replace("\r\n", "\n")
    } else {
        content.to_string()
    };

    let mut sorted: Vec<&TextEdit> = edits.iter().collect();
    sorted.sort_by(|a, b| {
        let key = |e: &TextEdit| {
            (
                e.range.start.line,
                e.range.start.character,
                e.range.end.line,
                e.range.end.character,
            )
        };
        key(b).cmp(&key(a))
    });

    let mut previous_start: Option<lsp_types::Position> = None;
    for edit in sorted {
        if let Some(prev) = previous_start {
            let end = (edit.range.end.line, edit.range.end.character);
            if end > (prev.line, prev.character) {
                return Err(EditError::Overlap {
                    line: edit.range.end.line,
                    column: edit.range.end.character,
                });
            }
        }
        previous_start = Some(edit.range.start);

        let start = offset_of(&text, edit.range.start.line, edit.range.start.character);
        let end = offset_of(&text, edit.range.end.line, edit.range.end.character);
        let new_text = if crlf {
            edit.new_text.replace("\r\n", "\n")
        } else {
            edit.new_text.clone()
        };
        text.replace_range(start..end, &new_text);
    }

    if crlf {
        Ok(text.replace('\n', "\r\n"))
    } else {
        Ok(text)
    }
}

/// Byte offset of a (line, character) position, clamped to the document.
fn offset_of(text: &str, line: u32, character: u32) -> usize {
    let mut line_start = 0usize;
    if line > 0 {
        let mut current_line = 0u32;
        let mut found = false;
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                current_line += 1;
                if current_line == line {
                    line_start = i + 1;
                    found = true;
                    break;
                }
            }
        }
        if !found {
            return text.len();
        }
    }
    let line_end = text[line_start..]
        .find('\n')
        .map(|i| line_start + i)
        .unwrap_or(text.len());
    for (count, (byte_idx, _)) in text[line_start..line_end].char_indices().enumerate() {
        if count as u32 == character {
            return line_start + byte_idx;
        }
    }
    line_end
}

// ============================================================================
// Workspace Edit Application
// ============================================================================

/// Apply a workspace edit to the files it names. Returns the changed
/// paths. Each file is rewritten atomically via a sibling temp file.
pub fn apply_workspace_edit(
    workspace: &Workspace,
    edit: &WorkspaceEdit,
) -> Result<Vec<PathBuf>, EditError> {
    let mut per_document: HashMap<String, Vec<TextEdit>> = HashMap::new();

    if let Some(changes) = &edit.changes {
        for (uri, edits) in changes {
            per_document
                .entry(uri.path().as_str().to_string())
                .or_default()
                .extend(edits.iter().cloned());
        }
    }
    if let Some(document_changes) = &edit.document_changes {
        let document_edits: Vec<&lsp_types::TextDocumentEdit> = match document_changes {
            DocumentChanges::Edits(edits) => edits.iter().collect(),
            DocumentChanges::Operations(ops) => ops
                .iter()
                .filter_map(|op| match op {
                    DocumentChangeOperation::Edit(edit) => Some(edit),
                    DocumentChangeOperation::Op(_) => None,
                })
                .collect(),
        };
        for document_edit in document_edits {
            let entry = per_document
                .entry(document_edit.text_document.uri.path().as_str().to_string())
                .or_default();
            for item in &document_edit.edits {
                match item {
                    OneOf::Left(text_edit) => entry.push(text_edit.clone()),
                    OneOf::Right(annotated) => entry.push(annotated.text_edit.clone()),
                }
            }
        }
    }

    let mut changed = Vec::new();
    for (path, edits) in per_document {
        if edits.is_empty() {
            continue;
        }
        let absolute = workspace.absolute(&path);
        let content = std::fs::read_to_string(&absolute)?;
        let updated = apply_text_edits(&content, &edits)?;
        if updated != content {
            write_atomic(&absolute, updated.as_bytes())?;
            debug!("applied {} text edits to {}", edits.len(), absolute.display());
            changed.push(absolute);
        }
    }
    Ok(changed)
}

fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "edit".to_string());
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));
    std::fs::write(&tmp, contents)?;
    std::fs::rename(&tmp, path)
}

// ============================================================================
// Source-Fix Code Actions
// ============================================================================

/// Request `source.fixAll` and `source.organizeImports` code actions over
/// the entire document and apply those carrying a workspace edit. Returns
/// how many actions were applied.
pub async fn apply_source_fix_actions(
    client: &LspClient,
    workspace: &Workspace,
    relative_path: &str,
    cancel: &CancellationToken,
) -> Result<usize, EditError> {
    let absolute = workspace.absolute(relative_path);
    let content = std::fs::read_to_string(&absolute)?;
    let line_count = LineIndex::new(&content).line_count();
    let uri = uri_for_path(&absolute)?;

    let full_range = lsp_types::Range {
        start: lsp_types::Position {
            line: 0,
            character: 0,
        },
        end: lsp_types::Position {
            line: line_count,
            character: 0,
        },
    };
    let actions = client
        .code_action(
            uri,
            full_range,
            vec![
                CodeActionKind::SOURCE_FIX_ALL,
                CodeActionKind::SOURCE_ORGANIZE_IMPORTS,
            ],
            cancel,
        )
        .await?;

    let mut applied = 0;
    for action in actions {
        let CodeActionOrCommand::CodeAction(action) = action else {
            continue;
        };
        if let Some(edit) = &action.edit {
            apply_workspace_edit(workspace, edit)?;
            applied += 1;
            info!("applied code action '{}' to {relative_path}", action.title);
        }
    }
    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lsp_types::{Position, Range};

    fn edit(sl: u32, sc: u32, el: u32, ec: u32, text: &str) -> TextEdit {
        TextEdit {
            range: Range {
                start: Position {
                    line: sl,
                    character: sc,
                },
                end: Position {
                    line: el,
                    character: ec,
                },
            },
            new_text: text.to_string(),
        }
    }

    #[test]
    fn applies_single_edit() {
        let content = "hello world\nsecond line\n";
        let result = apply_text_edits(content, &[edit(0, 6, 0, 11, "rust")]).unwrap();
        assert_eq!(result, "hello rust\nsecond line\n");
    }

    #[test]
    fn applies_multiple_edits_in_descending_order() {
        let content = "aaa\nbbb\nccc\n";
        let edits = vec![edit(0, 0, 0, 3, "AAA"), edit(2, 0, 2, 3, "CCC")];
        let result = apply_text_edits(content, &edits).unwrap();
        assert_eq!(result, "AAA\nbbb\nCCC\n");
    }

    #[test]
    fn preserves_crlf_line_endings() {
        let content = "first\r\nsecond\r\n";
        let result = apply_text_edits(content, &[edit(1, 0, 1, 6, "changed")]).unwrap();
        assert_eq!(result, "first\r\nchanged\r\n");
    }

    #[test]
    fn preserves_lf_line_endings() {
        let content = "first\nsecond\n";
        let result = apply_text_edits(content, &[edit(0, 0, 0, 5, "1st")]).unwrap();
        assert_eq!(result, "1st\nsecond\n");
    }

    #[test]
    fn rejects_overlapping_edits() {
        let content = "abcdef\n";
        let edits = vec![edit(0, 0, 0, 4, "x"), edit(0, 3, 0, 6, "y")];
        assert!(matches!(
            apply_text_edits(content, &edits),
            Err(EditError::Overlap { .. })
        ));
    }

    #[test]
    fn insertion_at_shared_position_is_not_overlap() {
        let content = "abc\n";
        // A zero-width edit at the start of a replaced range.
        let edits = vec![edit(0, 1, 0, 1, "X"), edit(0, 1, 0, 3, "Y")];
        let result = apply_text_edits(content, &edits).unwrap();
        assert_eq!(result, "aXY\n");
    }

    #[test]
    fn reverse_edit_restores_original() {
        let content = "package main\n\nfunc main() {}\n";
        let forward = edit(2, 5, 2, 9, "run");
        let updated = apply_text_edits(content, &[forward]).unwrap();
        assert_eq!(updated, "package main\n\nfunc run() {}\n");

        let reverse = edit(2, 5, 2, 8, "main");
        let restored = apply_text_edits(&updated, &[reverse]).unwrap();
        assert_eq!(restored, content);
    }

    #[test]
    fn multiline_replacement() {
        let content = "one\ntwo\nthree\nfour\n";
        let result = apply_text_edits(content, &[edit(1, 0, 2, 5, "TWO-THREE")]).unwrap();
        assert_eq!(result, "one\nTWO-THREE\nfour\n");
    }

    #[test]
    fn workspace_edit_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.go");
        std::fs::write(&path, "package main\n").unwrap();
        let workspace = Workspace::new(dir.path());

        let uri: lsp_types::Uri = format!("file://{}", path.display()).parse().unwrap();
        let mut changes = HashMap::new();
        changes.insert(uri, vec![edit(0, 8, 0, 12, "app")]);
        let workspace_edit = WorkspaceEdit {
            changes: Some(changes),
            document_changes: None,
            change_annotations: None,
        };

        let changed = apply_workspace_edit(&workspace, &workspace_edit).unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "package app\n");
    }
}
