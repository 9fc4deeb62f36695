//! symscope — bulk symbol-definition retrieval
//!
//! Given a batch of (file, symbol-names) requests scoped to a workspace
//! directory, returns a rendered, size-bounded, merged view of the source
//! ranges defining those symbols, augmented with related-symbol
//! cross-references resolved through a language server.
//!
//! Structural extraction uses tree-sitter queries per language; reference
//! resolution uses one long-lived LSP client per (workspace, language).

pub mod error;
pub mod logging;
pub mod lsp;
pub mod parser;
pub mod retrieve;
pub mod symbol;
pub mod workspace;

pub use error::RetrieveError;
pub use retrieve::{
    DirectorySymDefRequest, FileSymDefRequest, RelatedSymbol, RelatedSymbolThresholds,
    SymDefResults, SymbolRetriever, bulk_get_symbol_definitions, default_lsp_registry,
    related_symbols,
};
pub use workspace::Workspace;
