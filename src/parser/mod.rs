//! Language-aware structural parsing
//!
//! Infers languages from file extensions, loads tree-sitter grammars, and
//! executes named queries that extract symbols, signatures, headers and
//! full definitions from source files.

mod engine;
mod language;
mod queries;

pub use engine::{
    ParseCache, ParsedFile, all_alternative_file_symbols, all_symbol_definitions_from_source,
    file_headers, file_signatures, file_symbols, normalize_symbol_from_snippet, parse_source,
    symbol_definitions,
};
pub use language::Language;

/// Parser operation errors.
#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    /// The file extension maps to no known language.
    #[error("unsupported language for extension '{0}'")]
    UnsupportedLanguage(String),

    /// The language is recognized but has no tree-sitter grammar wired.
    #[error("no grammar available for {0}")]
    NoGrammar(Language),

    #[error("failed to produce a parse tree")]
    ParseFailed,

    #[error("no header declarations found")]
    NoHeadersFound,

    #[error("symbol '{0}' is not defined in this file")]
    SymbolNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
