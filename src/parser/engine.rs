//! Tree-sitter parsing and query execution
//!
//! Wraps grammar loading, per-language query compilation, and the typed
//! extraction operations the retrieval pipeline consumes. Parse trees are
//! cached per bulk call via [`ParseCache`]; compiled queries are cached
//! process-wide.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use tracing::debug;
use tree_sitter::{Query, QueryCursor, StreamingIterator};

use super::queries::{header_patterns, symbol_patterns};
use super::{Language, ParserError};
use crate::symbol::{LineIndex, Point, Range, Signature, SourceBlock, SymbolInfo, SymbolKind};

// ============================================================================
// Parsed Files
// ============================================================================

/// A parsed source file. The source buffer is shared by every block
/// produced from this parse.
pub struct ParsedFile {
    pub language: Language,
    pub source: Arc<str>,
    pub tree: tree_sitter::Tree,
    pub index: LineIndex,
}

/// Parse a source buffer with the grammar for `language`.
pub fn parse_source(language: Language, source: Arc<str>) -> Result<ParsedFile, ParserError> {
    let grammar = language.grammar().ok_or(ParserError::NoGrammar(language))?;
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&grammar)
        .map_err(|_| ParserError::ParseFailed)?;
    let tree = parser
        .parse(source.as_bytes(), None)
        .ok_or(ParserError::ParseFailed)?;
    Ok(ParsedFile {
        language,
        index: LineIndex::new(&source),
        source,
        tree,
    })
}

// ============================================================================
// Parse Cache
// ============================================================================

/// Caches file sources and parse trees for the duration of one bulk call,
/// so multiple symbols requested from the same file reuse a single parse.
#[derive(Default)]
pub struct ParseCache {
    sources: Mutex<HashMap<PathBuf, Arc<str>>>,
    parses: Mutex<HashMap<PathBuf, Arc<ParsedFile>>>,
}

impl ParseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a file's contents, cached by absolute path.
    pub fn read_source(&self, path: &Path) -> Result<Arc<str>, ParserError> {
        if let Some(source) = self.sources.lock().expect("source cache lock").get(path) {
            return Ok(Arc::clone(source));
        }
        let text = std::fs::read_to_string(path)?;
        let source: Arc<str> = Arc::from(text);
        self.sources
            .lock()
            .expect("source cache lock")
            .insert(path.to_path_buf(), Arc::clone(&source));
        Ok(source)
    }

    /// Parse a file, cached by absolute path.
    pub fn parse_file(&self, path: &Path) -> Result<Arc<ParsedFile>, ParserError> {
        if let Some(parsed) = self.parses.lock().expect("parse cache lock").get(path) {
            return Ok(Arc::clone(parsed));
        }
        let language = Language::from_path(path);
        if language == Language::Unknown {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_string();
            return Err(ParserError::UnsupportedLanguage(ext));
        }
        let source = self.read_source(path)?;
        let parsed = Arc::new(parse_source(language, source)?);
        self.parses
            .lock()
            .expect("parse cache lock")
            .insert(path.to_path_buf(), Arc::clone(&parsed));
        Ok(parsed)
    }
}

// ============================================================================
// Compiled Queries
// ============================================================================

struct CompiledQueries {
    symbols: Vec<Query>,
    headers: Vec<Query>,
}

fn compiled_queries(language: Language) -> Option<Arc<CompiledQueries>> {
    static CACHE: OnceLock<Mutex<HashMap<Language, Arc<CompiledQueries>>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    if let Some(queries) = cache.lock().expect("query cache lock").get(&language) {
        return Some(Arc::clone(queries));
    }

    let grammar = language.grammar()?;
    let compile = |patterns: &[&str]| -> Vec<Query> {
        patterns
            .iter()
            .filter_map(|pattern| match Query::new(&grammar, pattern) {
                Ok(query) => Some(query),
                Err(e) => {
                    // Grammar drift: skip the pattern rather than fail the
                    // whole language.
                    debug!("skipping query pattern for {language}: {e}");
                    None
                }
            })
            .collect()
    };
    let compiled = Arc::new(CompiledQueries {
        symbols: compile(symbol_patterns(language)),
        headers: compile(header_patterns(language)),
    });
    cache
        .lock()
        .expect("query cache lock")
        .insert(language, Arc::clone(&compiled));
    Some(compiled)
}

// ============================================================================
// Symbol Extraction
// ============================================================================

#[derive(Debug, Clone)]
struct RawSymbol {
    name: String,
    kind: SymbolKind,
    declaration_range: Range,
    name_range: Range,
    signature_end_byte: u32,
    signature_end_point: Point,
    has_body: bool,
    context: Option<String>,
}

fn kind_from_capture(suffix: &str) -> SymbolKind {
    match suffix {
        "class" => SymbolKind::Class,
        "function" => SymbolKind::Function,
        "method" => SymbolKind::Method,
        "type" => SymbolKind::Type,
        "const" => SymbolKind::Constant,
        "var" => SymbolKind::Variable,
        "field" => SymbolKind::Field,
        "enum" => SymbolKind::Enum,
        "interface" => SymbolKind::Interface,
        "alias" => SymbolKind::Alias,
        "module" => SymbolKind::Module,
        _ => SymbolKind::Other,
    }
}

fn raw_symbols(parsed: &ParsedFile) -> Vec<RawSymbol> {
    let Some(queries) = compiled_queries(parsed.language) else {
        return Vec::new();
    };
    let source_bytes = parsed.source.as_bytes();
    let mut collected: Vec<RawSymbol> = Vec::new();
    let mut cursor = QueryCursor::new();

    for query in &queries.symbols {
        let capture_names = query.capture_names();
        let mut matches = cursor.matches(query, parsed.tree.root_node(), source_bytes);
        while let Some(m) = matches.next() {
            let mut decl = None;
            let mut kind = SymbolKind::Other;
            let mut name_node = None;
            let mut body_node = None;
            let mut context_node = None;
            for capture in m.captures {
                let capture_name = capture_names[capture.index as usize];
                if let Some(suffix) = capture_name.strip_prefix("def.") {
                    decl = Some(capture.node);
                    kind = kind_from_capture(suffix);
                } else {
                    match capture_name {
                        "name" => name_node = Some(capture.node),
                        "body" => body_node = Some(capture.node),
                        "context" => context_node = Some(capture.node),
                        _ => {}
                    }
                }
            }
            let (Some(decl), Some(name_node)) = (decl, name_node) else {
                continue;
            };
            let name = name_node.utf8_text(source_bytes).unwrap_or("").to_string();
            if name.is_empty() {
                continue;
            }
            let (signature_end_byte, signature_end_point, has_body) = match body_node {
                Some(body) => (body.start_byte() as u32, body.start_position().into(), true),
                None => (decl.end_byte() as u32, decl.end_position().into(), false),
            };
            collected.push(RawSymbol {
                name,
                kind,
                declaration_range: decl.range().into(),
                name_range: name_node.range().into(),
                signature_end_byte,
                signature_end_point,
                has_body,
                context: context_node
                    .map(|n| n.utf8_text(source_bytes).unwrap_or("").to_string()),
            });
        }
    }

    // The same definition can match several patterns; keep the richest
    // entry per (declaration, name) pair.
    let mut seen: HashMap<(u32, u32, u32), usize> = HashMap::new();
    let mut deduped: Vec<RawSymbol> = Vec::with_capacity(collected.len());
    for raw in collected {
        let key = (
            raw.declaration_range.start_byte,
            raw.declaration_range.end_byte,
            raw.name_range.start_byte,
        );
        match seen.get(&key) {
            Some(&i) => {
                let existing = &deduped[i];
                let richer = (raw.context.is_some() && existing.context.is_none())
                    || (raw.context.is_some() == existing.context.is_some()
                        && raw.has_body
                        && !existing.has_body);
                if richer {
                    deduped[i] = raw;
                }
            }
            None => {
                seen.insert(key, deduped.len());
                deduped.push(raw);
            }
        }
    }
    deduped.sort_by_key(|r| (r.declaration_range.start_byte, r.name_range.start_byte));
    deduped
}

fn signature_of(parsed: &ParsedFile, raw: &RawSymbol) -> Signature {
    let start = raw.declaration_range.start_byte as usize;
    let end = (raw.signature_end_byte as usize).min(parsed.source.len());
    let content = parsed.source[start.min(end)..end].trim_end().to_string();
    Signature {
        content,
        start: raw.declaration_range.start,
        end: raw.signature_end_point,
    }
}

/// Alternative name forms for a symbol with an enclosing context.
///
/// Go methods are also queryable as `Recv.Method` and `*Recv.Method`;
/// class and impl members as `Container.member`.
fn alternative_names(language: Language, context: &str, name: &str) -> Vec<String> {
    match language {
        Language::Golang => {
            let inner = context.trim().trim_start_matches('(').trim_end_matches(')');
            let receiver_type = inner.split_whitespace().last().unwrap_or("");
            let stripped = receiver_type.trim_start_matches('*');
            if stripped.is_empty() {
                return Vec::new();
            }
            vec![format!("{stripped}.{name}"), format!("*{stripped}.{name}")]
        }
        _ => {
            let container = context.trim();
            if container.is_empty() {
                Vec::new()
            } else {
                vec![format!("{container}.{name}")]
            }
        }
    }
}

// ============================================================================
// Public Operations
// ============================================================================

/// All named definitions in a file, under their primary names.
pub fn file_symbols(parsed: &ParsedFile) -> Vec<SymbolInfo> {
    raw_symbols(parsed)
        .into_iter()
        .map(|raw| SymbolInfo {
            content: raw.name,
            kind: raw.kind,
            declaration_range: raw.declaration_range,
            name_range: raw.name_range,
        })
        .collect()
}

/// All named definitions, under primary and alternative name forms.
pub fn all_alternative_file_symbols(parsed: &ParsedFile) -> Vec<SymbolInfo> {
    let mut out = Vec::new();
    for raw in raw_symbols(parsed) {
        let alternatives = raw
            .context
            .as_deref()
            .map(|ctx| alternative_names(parsed.language, ctx, &raw.name))
            .unwrap_or_default();
        out.push(SymbolInfo {
            content: raw.name,
            kind: raw.kind,
            declaration_range: raw.declaration_range,
            name_range: raw.name_range,
        });
        for alt in alternatives {
            out.push(SymbolInfo {
                content: alt,
                kind: raw.kind,
                declaration_range: raw.declaration_range,
                name_range: raw.name_range,
            });
        }
    }
    out
}

/// Declaration headers of every definition in the file.
pub fn file_signatures(parsed: &ParsedFile) -> Vec<Signature> {
    let mut signatures: Vec<Signature> = raw_symbols(parsed)
        .iter()
        .map(|raw| signature_of(parsed, raw))
        .collect();
    signatures.sort_by_key(|s| (s.start, s.end));
    signatures.dedup();
    signatures
}

/// File prologue blocks (package declarations, imports, includes), each
/// extended by `num_context_lines` lines.
pub fn file_headers(
    parsed: &ParsedFile,
    num_context_lines: u32,
) -> Result<Vec<SourceBlock>, ParserError> {
    let queries = compiled_queries(parsed.language).ok_or(ParserError::NoGrammar(parsed.language))?;
    let mut blocks = Vec::new();
    let mut cursor = QueryCursor::new();
    for query in &queries.headers {
        let mut matches = cursor.matches(query, parsed.tree.root_node(), parsed.source.as_bytes());
        while let Some(m) = matches.next() {
            for capture in m.captures {
                let node = capture.node;
                blocks.push(SourceBlock::from_rows(
                    Arc::clone(&parsed.source),
                    &parsed.index,
                    node.start_position().row as u32,
                    node.end_position().row as u32 + num_context_lines,
                    None,
                ));
            }
        }
    }
    if blocks.is_empty() {
        return Err(ParserError::NoHeadersFound);
    }
    blocks.sort_by_key(|b| b.range.start.row);
    Ok(blocks)
}

/// Definition blocks for a named symbol, matched against primary and
/// alternative name forms, each extended by `num_context_lines` lines of
/// context on both sides.
pub fn symbol_definitions(
    parsed: &ParsedFile,
    symbol_name: &str,
    num_context_lines: u32,
) -> Result<Vec<SourceBlock>, ParserError> {
    let mut blocks = Vec::new();
    for raw in raw_symbols(parsed) {
        let matched = raw.name == symbol_name
            || raw
                .context
                .as_deref()
                .map(|ctx| {
                    alternative_names(parsed.language, ctx, &raw.name)
                        .iter()
                        .any(|alt| alt == symbol_name)
                })
                .unwrap_or(false);
        if !matched {
            continue;
        }
        let start_row = raw
            .declaration_range
            .start
            .row
            .saturating_sub(num_context_lines);
        let end_row = raw.declaration_range.end.row + num_context_lines;
        blocks.push(SourceBlock::from_rows(
            Arc::clone(&parsed.source),
            &parsed.index,
            start_row,
            end_row,
            Some(raw.name_range),
        ));
    }
    if blocks.is_empty() {
        return Err(ParserError::SymbolNotFound(symbol_name.to_string()));
    }
    Ok(blocks)
}

/// Extract a canonical symbol name from a free-form snippet (e.g. a pasted
/// declaration) by parsing it as source of the given language.
pub fn normalize_symbol_from_snippet(language: Language, text: &str) -> Option<String> {
    let parsed = parse_source(language, Arc::from(text)).ok()?;
    raw_symbols(&parsed).into_iter().next().map(|raw| raw.name)
}

/// All definitions in an in-memory source buffer, as `(name, range)` pairs.
pub fn all_symbol_definitions_from_source(
    language: Language,
    source: &str,
) -> Result<Vec<(String, Range)>, ParserError> {
    let parsed = parse_source(language, Arc::from(source))?;
    Ok(raw_symbols(&parsed)
        .into_iter()
        .map(|raw| (raw.name, raw.declaration_range))
        .collect())
}
