//! Bulk symbol-definition retrieval
//!
//! The public surface of the engine: given a batch of (file, symbol-names)
//! requests scoped to a workspace, returns a rendered, size-bounded,
//! merged view of the source ranges defining those symbols, with optional
//! related-symbol cross-references.

mod hints;
mod references;
mod related;
mod render;
mod retriever;

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::RetrieveError;
use crate::lsp::LspRegistry;
use crate::symbol::{Range, Signature, SourceBlock, SymbolInfo};

pub use related::RelatedSymbolThresholds;
pub use render::MergedSymbolRetrievalResult;
pub use retriever::SymbolRetriever;

/// Upper bound on the rendered symbol definitions.
pub const MAX_SYMBOL_DEFINITIONS_BYTES: usize = 1024 * 1024;

/// Context lines added around definitions when the caller does not say.
pub const DEFAULT_NUM_CONTEXT_LINES: u32 = 5;

pub(crate) const EMPTY_REQUESTS_MESSAGE: &str = "No symbol definition requests were provided.";

// ============================================================================
// Requests and Results
// ============================================================================

/// Symbols requested from one file. An empty list, an empty name or `"*"`
/// requests the whole file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSymDefRequest {
    pub file_path: String,
    #[serde(default)]
    pub symbol_names: Vec<String>,
}

/// A batch of file requests scoped to a workspace directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySymDefRequest {
    pub workspace_root: PathBuf,
    pub requests: Vec<FileSymDefRequest>,
    #[serde(default)]
    pub num_context_lines: Option<u32>,
    #[serde(default)]
    pub include_related_symbols: bool,
}

/// The rendered artifact plus the failure stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymDefResults {
    pub symbol_definitions: String,
    pub failures: String,
}

/// One retrieval outcome: a symbol's definition blocks, a file header
/// (empty symbol name), or a whole file (`"*"`).
#[derive(Debug)]
pub struct SymbolRetrievalResult {
    pub relative_path: String,
    pub symbol_name: String,
    pub source_blocks: Vec<SourceBlock>,
    pub related_symbols: Vec<RelatedSymbol>,
    pub error: Option<RetrieveError>,
}

/// A symbol whose declaration overlaps a reference to the queried symbol.
#[derive(Debug, Clone)]
pub struct RelatedSymbol {
    pub symbol: SymbolInfo,
    pub locations: Vec<lsp_types::Location>,
    pub relative_file_path: String,
    /// Whether the reference sits inside the enclosing signature rather
    /// than the body.
    pub in_signature: bool,
    pub signature: Signature,
}

// ============================================================================
// Public API
// ============================================================================

fn default_retriever() -> &'static SymbolRetriever {
    static DEFAULT: OnceLock<SymbolRetriever> = OnceLock::new();
    DEFAULT.get_or_init(SymbolRetriever::new)
}

/// Retrieve and render symbol definitions for a batch of requests, using
/// the process-wide client registry.
pub async fn bulk_get_symbol_definitions(
    cancel: &CancellationToken,
    request: DirectorySymDefRequest,
) -> Result<SymDefResults, RetrieveError> {
    default_retriever()
        .bulk_get_symbol_definitions(cancel, request)
        .await
}

/// Resolve the symbols related to `symbol_text` at `symbol_range` in a
/// file, using the process-wide client registry.
pub async fn related_symbols(
    cancel: &CancellationToken,
    workspace_root: &std::path::Path,
    relative_path: &str,
    symbol_text: &str,
    symbol_range: Range,
) -> Result<Vec<RelatedSymbol>, RetrieveError> {
    default_retriever()
        .related_symbols(cancel, workspace_root, relative_path, symbol_text, symbol_range)
        .await
}

/// The process-wide LSP client registry backing the default retriever.
/// Exposed as a teardown hook for tests and embedding processes.
pub fn default_lsp_registry() -> Arc<LspRegistry> {
    Arc::clone(default_retriever().registry())
}
