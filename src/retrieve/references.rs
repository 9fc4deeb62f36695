//! Reference resolution
//!
//! Locates a symbol's on-disk position by scanning the file text and asks
//! the language server for the references to it.

use lsp_types::Location;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::RetrieveError;
use crate::lsp::LspRegistry;
use crate::lsp::client::uri_for_path;
use crate::parser::{Language, ParseCache};
use crate::symbol::{Point, Range};
use crate::workspace::Workspace;

/// Find the first occurrence of `symbol_text` in the file (restricted to
/// `search_range` when given) and return the references the language
/// server reports for the position of its last character. Declarations
/// are excluded.
pub async fn find_symbol_references(
    workspace: &Workspace,
    cache: &ParseCache,
    registry: &LspRegistry,
    relative_path: &str,
    symbol_text: &str,
    search_range: Option<Range>,
    cancel: &CancellationToken,
) -> Result<Vec<Location>, RetrieveError> {
    let absolute = workspace.absolute(relative_path);
    let source = cache
        .read_source(&absolute)
        .map_err(|e| RetrieveError::from_parser(e, relative_path))?;

    let position = locate_symbol_text(&source, symbol_text, search_range).ok_or_else(|| {
        RetrieveError::SymbolNotFound {
            name: symbol_text.to_string(),
            path: relative_path.to_string(),
        }
    })?;

    let language = Language::from_path(&absolute);
    let client = registry
        .get_or_init(workspace.working_directory(), language, cancel)
        .await?;

    let uri = uri_for_path(&absolute)?;
    client
        .did_open(uri.clone(), lsp_language_id(language), source.to_string())
        .await?;

    debug!(
        "resolving references for '{symbol_text}' at {relative_path}:{}:{}",
        position.row + 1,
        position.column + 1
    );
    Ok(client
        .references(uri, position.row, position.column, false, cancel)
        .await?)
}

/// The LSP language identifier differs from ours only for Go.
fn lsp_language_id(language: Language) -> &'static str {
    match language {
        Language::Golang => "go",
        other => other.identifier(),
    }
}

/// Scan lines for the first occurrence of `symbol_text`; the reported
/// point is the last character of that occurrence.
fn locate_symbol_text(source: &str, symbol_text: &str, search_range: Option<Range>) -> Option<Point> {
    if symbol_text.is_empty() {
        return None;
    }
    for (row, line) in source.lines().enumerate() {
        let row = row as u32;
        if let Some(range) = &search_range {
            if row < range.start.row || row > range.end.row {
                continue;
            }
        }
        if let Some(byte_idx) = line.find(symbol_text) {
            let column = line[..byte_idx].chars().count() + symbol_text.chars().count() - 1;
            return Some(Point::new(row, column as u32));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "package cools\n\nfunc TestFunc() {\n\tTestFunc()\n}\n";

    #[test]
    fn locates_first_occurrence() {
        let point = locate_symbol_text(SOURCE, "TestFunc", None).unwrap();
        assert_eq!(point, Point::new(2, 12));
    }

    #[test]
    fn restricts_to_search_range() {
        let range = Range::new(Point::new(3, 0), Point::new(4, 0), 0, 0);
        let point = locate_symbol_text(SOURCE, "TestFunc", Some(range)).unwrap();
        assert_eq!(point.row, 3);
    }

    #[test]
    fn missing_text_yields_none() {
        assert!(locate_symbol_text(SOURCE, "Absent", None).is_none());
        assert!(locate_symbol_text(SOURCE, "", None).is_none());
    }
}
