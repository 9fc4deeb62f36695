//! Related-symbol resolution and summarization
//!
//! Joins the language server's reference locations with the structural
//! symbols and signatures of each referencing file, producing a ranked,
//! file-grouped view of the symbols that reference a definition.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{RelatedSymbol, references};
use crate::error::RetrieveError;
use crate::lsp::LspRegistry;
use crate::parser::{self, ParseCache};
use crate::symbol::{Point, Range, Signature, SymbolInfo, SymbolKind};
use crate::workspace::Workspace;

// ============================================================================
// Thresholds
// ============================================================================

/// Tuning thresholds for related-symbol summaries.
#[derive(Debug, Clone)]
pub struct RelatedSymbolThresholds {
    /// List full same-file signatures while their total line count stays
    /// at or under this.
    pub max_same_file_signature_lines: usize,
    /// Otherwise list same-file symbol names while there are at most this
    /// many.
    pub max_same_file_related_symbols: usize,
    /// Per-file breakdowns are shown for at most this many other files.
    pub max_other_files: usize,
    /// Per other file, list full signatures up to this many lines.
    pub max_per_file_signature_lines: usize,
    /// Per other file, otherwise list names up to this count.
    pub max_per_file_related_symbols: usize,
}

impl Default for RelatedSymbolThresholds {
    fn default() -> Self {
        Self {
            max_same_file_signature_lines: 20,
            max_same_file_related_symbols: 10,
            max_other_files: 8,
            max_per_file_signature_lines: 12,
            max_per_file_related_symbols: 8,
        }
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the symbols whose declarations overlap references to
/// `symbol_text` located at `symbol_range` in `relative_path`.
pub(crate) async fn collect_related_symbols(
    workspace: &Workspace,
    cache: &ParseCache,
    registry: &LspRegistry,
    relative_path: &str,
    symbol_text: &str,
    symbol_range: Range,
    cancel: &CancellationToken,
) -> Result<Vec<RelatedSymbol>, RetrieveError> {
    let locations = references::find_symbol_references(
        workspace,
        cache,
        registry,
        relative_path,
        symbol_text,
        Some(symbol_range),
        cancel,
    )
    .await?;
    debug!(
        "{} reference locations for '{symbol_text}' in {relative_path}",
        locations.len()
    );

    // Symbols and signatures are memoized per referencing file.
    let mut memo: HashMap<PathBuf, (Vec<SymbolInfo>, Vec<Signature>)> = HashMap::new();
    let mut related: Vec<RelatedSymbol> = Vec::new();
    let mut dedup: HashMap<(String, String, String), usize> = HashMap::new();

    for location in locations {
        let path = PathBuf::from(location.uri.path().as_str());
        let file_relative = workspace.relative(&path);
        let (symbols, signatures) = memo.entry(path.clone()).or_insert_with(|| {
            match cache.parse_file(&path) {
                Ok(parsed) => (
                    parser::file_symbols(&parsed),
                    parser::file_signatures(&parsed),
                ),
                Err(e) => {
                    debug!("cannot parse referencing file {}: {e}", path.display());
                    (Vec::new(), Vec::new())
                }
            }
        });

        let reference_range: Range = location.range.into();
        for symbol in symbols.iter() {
            if !symbol.declaration_range.overlaps_rows(&reference_range) {
                continue;
            }
            let signature = signatures
                .iter()
                .find(|s| rows_overlap(s.start, s.end, &symbol.declaration_range))
                .cloned()
                .unwrap_or_else(|| Signature {
                    content: symbol.content.clone(),
                    start: symbol.declaration_range.start,
                    end: symbol.declaration_range.end,
                });
            let in_signature =
                rows_overlap(signature.start, signature.end, &reference_range);

            let key = (
                symbol.content.clone(),
                signature.content.clone(),
                file_relative.clone(),
            );
            match dedup.get(&key) {
                Some(&i) => {
                    related[i].locations.push(location.clone());
                    related[i].in_signature |= in_signature;
                }
                None => {
                    dedup.insert(key, related.len());
                    related.push(RelatedSymbol {
                        symbol: symbol.clone(),
                        locations: vec![location.clone()],
                        relative_file_path: file_relative.clone(),
                        in_signature,
                        signature,
                    });
                }
            }
        }
    }
    Ok(related)
}

fn rows_overlap(start: Point, end: Point, range: &Range) -> bool {
    start.row <= range.end.row && end.row >= range.start.row
}

/// The sentinel entry recorded when related-symbol resolution fails; the
/// containing retrieval still succeeds.
pub(crate) fn degraded_related_symbol(error: &RetrieveError, relative_path: &str) -> RelatedSymbol {
    let message = format!("related symbols unavailable: {error}");
    RelatedSymbol {
        symbol: SymbolInfo {
            content: message.clone(),
            kind: SymbolKind::Other,
            declaration_range: Range::default(),
            name_range: Range::default(),
        },
        locations: Vec::new(),
        relative_file_path: relative_path.to_string(),
        in_signature: false,
        signature: Signature {
            content: message,
            start: Point::default(),
            end: Point::default(),
        },
    }
}

// ============================================================================
// Summaries
// ============================================================================

/// Render a concise cross-reference summary for one retrieved symbol,
/// grouped into same-file and other-file references and collapsed to
/// names or counts past the configured thresholds.
pub(crate) fn render_related_symbols_hint(
    origin_relative_path: &str,
    related: &[RelatedSymbol],
    thresholds: &RelatedSymbolThresholds,
) -> String {
    if related.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    let (same_file, other): (Vec<&RelatedSymbol>, Vec<&RelatedSymbol>) = related
        .iter()
        .partition(|r| r.relative_file_path == origin_relative_path);

    if !same_file.is_empty() {
        out.push_str("Referenced in this file by:\n");
        let total_signature_lines: usize =
            same_file.iter().map(|r| r.signature.line_count()).sum();
        if total_signature_lines <= thresholds.max_same_file_signature_lines {
            for r in &same_file {
                push_signature_entry(&mut out, r);
            }
        } else if same_file.len() <= thresholds.max_same_file_related_symbols {
            let names: Vec<&str> = same_file.iter().map(|r| r.symbol.content.as_str()).collect();
            out.push_str(&format!("  {}\n", names.join(", ")));
        } else {
            let reference_count: usize = same_file.iter().map(|r| r.locations.len()).sum();
            out.push_str(&format!(
                "  {} symbols ({} references)\n",
                same_file.len(),
                reference_count
            ));
        }
    }

    if !other.is_empty() {
        let mut by_file: BTreeMap<&str, Vec<&RelatedSymbol>> = BTreeMap::new();
        for r in &other {
            by_file.entry(r.relative_file_path.as_str()).or_default().push(r);
        }
        out.push_str("Referenced in other files:\n");
        if by_file.len() > thresholds.max_other_files {
            let reference_count: usize = other.iter().map(|r| r.locations.len()).sum();
            out.push_str(&format!(
                "  {} references from {} symbols across {} files\n",
                reference_count,
                other.len(),
                by_file.len()
            ));
        } else {
            for (file, entries) in by_file {
                let signature_lines: usize =
                    entries.iter().map(|r| r.signature.line_count()).sum();
                if signature_lines <= thresholds.max_per_file_signature_lines {
                    out.push_str(&format!("  {file}:\n"));
                    for r in entries {
                        out.push_str("  ");
                        push_signature_entry(&mut out, r);
                    }
                } else if entries.len() <= thresholds.max_per_file_related_symbols {
                    let names: Vec<&str> =
                        entries.iter().map(|r| r.symbol.content.as_str()).collect();
                    out.push_str(&format!("  {file}: {}\n", names.join(", ")));
                } else {
                    let reference_count: usize =
                        entries.iter().map(|r| r.locations.len()).sum();
                    out.push_str(&format!(
                        "  {file}: {} symbols ({} references)\n",
                        entries.len(),
                        reference_count
                    ));
                }
            }
        }
    }
    out
}

fn push_signature_entry(out: &mut String, related: &RelatedSymbol) {
    let marker = if related.in_signature {
        " (in signature)"
    } else {
        ""
    };
    out.push_str(&format!("  {}{marker}\n", related.signature.content));
}
