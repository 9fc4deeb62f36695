//! Top-level error taxonomy for the retrieval engine
//!
//! Single-symbol failures never fail a batch; they are rendered into the
//! failures stream. Cancellation is the only fatal error of a bulk call.

use crate::lsp::LspError;
use crate::parser::ParserError;

/// Errors surfaced by symbol retrieval operations.
#[derive(Debug, thiserror::Error)]
pub enum RetrieveError {
    #[error("unsupported language for file {path}")]
    UnsupportedLanguage { path: String },

    #[error("symbol '{name}' not found in {path}")]
    SymbolNotFound { name: String, path: String },

    #[error("file {path} does not exist")]
    FileNotFound { path: String },

    #[error("failed to parse {path}")]
    Parse { path: String },

    #[error("language server unavailable: {0}")]
    LspUnavailable(String),

    #[error("language server request failed: {0}")]
    LspRequest(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation was cancelled")]
    Cancelled,
}

impl RetrieveError {
    /// Attach a file path to a parser error.
    pub fn from_parser(err: ParserError, path: &str) -> Self {
        match err {
            ParserError::UnsupportedLanguage(_) | ParserError::NoGrammar(_) => {
                Self::UnsupportedLanguage {
                    path: path.to_string(),
                }
            }
            ParserError::SymbolNotFound(name) => Self::SymbolNotFound {
                name,
                path: path.to_string(),
            },
            ParserError::ParseFailed => Self::Parse {
                path: path.to_string(),
            },
            ParserError::NoHeadersFound => Self::Parse {
                path: path.to_string(),
            },
            ParserError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => Self::FileNotFound {
                path: path.to_string(),
            },
            ParserError::Io(e) => Self::Io(e),
        }
    }
}

impl From<LspError> for RetrieveError {
    fn from(err: LspError) -> Self {
        match err {
            LspError::UnsupportedLanguage(lang) => Self::LspUnavailable(format!(
                "no language server is configured for {lang}"
            )),
            LspError::Spawn(msg) => Self::LspUnavailable(msg),
            other => Self::LspRequest(other.to_string()),
        }
    }
}
