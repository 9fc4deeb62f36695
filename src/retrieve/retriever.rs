//! Symbol retrieval fan-out
//!
//! Parallelizes over the files of a bulk request and over the symbols of
//! each file, applying the wildcard policy and the retry ladder, then
//! hands the accumulated results to the renderer.

use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::related::{self, RelatedSymbolThresholds};
use super::render;
use super::{
    DEFAULT_NUM_CONTEXT_LINES, DirectorySymDefRequest, EMPTY_REQUESTS_MESSAGE, FileSymDefRequest,
    MAX_SYMBOL_DEFINITIONS_BYTES, RelatedSymbol, SymDefResults, SymbolRetrievalResult,
};
use crate::error::RetrieveError;
use crate::lsp::LspRegistry;
use crate::parser::{self, Language, ParseCache};
use crate::symbol::{LineIndex, Range, SourceBlock};
use crate::workspace::Workspace;

/// The retrieval engine: holds the process-wide client registry and the
/// related-symbol rendering thresholds.
pub struct SymbolRetriever {
    registry: Arc<LspRegistry>,
    thresholds: RelatedSymbolThresholds,
}

impl Default for SymbolRetriever {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolRetriever {
    pub fn new() -> Self {
        Self::with_thresholds(RelatedSymbolThresholds::default())
    }

    pub fn with_thresholds(thresholds: RelatedSymbolThresholds) -> Self {
        Self {
            registry: Arc::new(LspRegistry::new()),
            thresholds,
        }
    }

    pub fn registry(&self) -> &Arc<LspRegistry> {
        &self.registry
    }

    /// Retrieve and render the definitions for a batch of requests.
    pub async fn bulk_get_symbol_definitions(
        &self,
        cancel: &CancellationToken,
        request: DirectorySymDefRequest,
    ) -> Result<SymDefResults, RetrieveError> {
        if request.requests.is_empty() {
            return Ok(SymDefResults {
                symbol_definitions: EMPTY_REQUESTS_MESSAGE.to_string(),
                failures: String::new(),
            });
        }
        info!(
            "bulk symbol retrieval: {} file requests under {}",
            request.requests.len(),
            request.workspace_root.display()
        );

        let ctx = TaskContext {
            workspace: Workspace::new(&request.workspace_root),
            cache: Arc::new(ParseCache::new()),
            registry: Arc::clone(&self.registry),
            num_context_lines: request
                .num_context_lines
                .unwrap_or(DEFAULT_NUM_CONTEXT_LINES),
            include_related_symbols: request.include_related_symbols,
            cancel: cancel.clone(),
        };

        let results: Arc<Mutex<Vec<SymbolRetrievalResult>>> = Arc::new(Mutex::new(Vec::new()));
        let mut tasks = JoinSet::new();
        for file_request in request.requests {
            let ctx = ctx.clone();
            let results = Arc::clone(&results);
            tasks.spawn(async move {
                let file_results = retrieve_file(ctx, file_request).await;
                results.lock().expect("results lock").extend(file_results);
            });
        }
        while tasks.join_next().await.is_some() {}

        if cancel.is_cancelled() {
            return Err(RetrieveError::Cancelled);
        }
        let results = std::mem::take(&mut *results.lock().expect("results lock"));
        let outputs =
            render::compose_file_outputs(&ctx.workspace, &ctx.cache, results, &self.thresholds);
        Ok(render::render(outputs, MAX_SYMBOL_DEFINITIONS_BYTES))
    }

    /// Resolve related symbols for one definition, outside a bulk call.
    pub async fn related_symbols(
        &self,
        cancel: &CancellationToken,
        workspace_root: &Path,
        relative_path: &str,
        symbol_text: &str,
        symbol_range: Range,
    ) -> Result<Vec<RelatedSymbol>, RetrieveError> {
        let workspace = Workspace::new(workspace_root);
        let cache = ParseCache::new();
        related::collect_related_symbols(
            &workspace,
            &cache,
            &self.registry,
            relative_path,
            symbol_text,
            symbol_range,
            cancel,
        )
        .await
    }
}

// ============================================================================
// Per-File and Per-Symbol Tasks
// ============================================================================

#[derive(Clone)]
struct TaskContext {
    workspace: Workspace,
    cache: Arc<ParseCache>,
    registry: Arc<LspRegistry>,
    num_context_lines: u32,
    include_related_symbols: bool,
    cancel: CancellationToken,
}

async fn retrieve_file(ctx: TaskContext, request: FileSymDefRequest) -> Vec<SymbolRetrievalResult> {
    if wants_full_file(&request) {
        return vec![retrieve_full_file(&ctx, &request.file_path)];
    }

    let results: Arc<Mutex<Vec<SymbolRetrievalResult>>> = Arc::new(Mutex::new(Vec::new()));
    let mut tasks = JoinSet::new();
    for symbol_name in request.symbol_names.clone() {
        let ctx = ctx.clone();
        let relative_path = request.file_path.clone();
        let results = Arc::clone(&results);
        tasks.spawn(async move {
            let result = retrieve_symbol(&ctx, &relative_path, &symbol_name).await;
            results.lock().expect("symbol results lock").push(result);
        });
    }
    while tasks.join_next().await.is_some() {}

    let mut results = std::mem::take(&mut *results.lock().expect("symbol results lock"));
    // Show package/imports alongside any successfully retrieved symbol.
    if results.iter().any(|r| r.error.is_none()) {
        if let Some(header) = header_result(&ctx, &request.file_path) {
            results.push(header);
        }
    }
    results
}

/// Whole-file policy: an empty symbol list, an empty name, `"*"`, or a
/// component-file request named after the component.
fn wants_full_file(request: &FileSymDefRequest) -> bool {
    if request.symbol_names.is_empty() {
        return true;
    }
    if request
        .symbol_names
        .iter()
        .any(|name| name.is_empty() || name == render::WILDCARD)
    {
        return true;
    }
    component_name_wildcard(&request.file_path, &request.symbol_names)
}

/// In single-file-component formats, a request for the component itself
/// (the file base name, or the directory name for `index.*`) means the
/// whole file.
fn component_name_wildcard(file_path: &str, symbol_names: &[String]) -> bool {
    let path = Path::new(file_path);
    if !Language::from_path(path).is_component() || symbol_names.len() != 1 {
        return false;
    }
    let normalize = |s: &str| s.replace('_', "").to_lowercase();
    let requested = normalize(&symbol_names[0]);
    if requested.is_empty() {
        return false;
    }
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    if normalize(stem) == requested {
        return true;
    }
    if stem.eq_ignore_ascii_case("index") {
        if let Some(parent) = path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|s| s.to_str())
        {
            return normalize(parent) == requested;
        }
    }
    false
}

fn retrieve_full_file(ctx: &TaskContext, relative_path: &str) -> SymbolRetrievalResult {
    let absolute = ctx.workspace.absolute(relative_path);
    match ctx.cache.read_source(&absolute) {
        Ok(source) => {
            let index = LineIndex::new(&source);
            let block = SourceBlock::from_rows(source, &index, 0, index.last_row(), None);
            SymbolRetrievalResult {
                relative_path: relative_path.to_string(),
                symbol_name: render::WILDCARD.to_string(),
                source_blocks: vec![block],
                related_symbols: Vec::new(),
                error: None,
            }
        }
        Err(e) => SymbolRetrievalResult {
            relative_path: relative_path.to_string(),
            symbol_name: render::WILDCARD.to_string(),
            source_blocks: Vec::new(),
            related_symbols: Vec::new(),
            error: Some(RetrieveError::from_parser(e, relative_path)),
        },
    }
}

fn header_result(ctx: &TaskContext, relative_path: &str) -> Option<SymbolRetrievalResult> {
    let absolute = ctx.workspace.absolute(relative_path);
    let parsed = ctx.cache.parse_file(&absolute).ok()?;
    let blocks = parser::file_headers(&parsed, ctx.num_context_lines).ok()?;
    Some(SymbolRetrievalResult {
        relative_path: relative_path.to_string(),
        symbol_name: String::new(),
        source_blocks: blocks,
        related_symbols: Vec::new(),
        error: None,
    })
}

/// One symbol's retrieval: exact name, then snippet normalization, then
/// the tail after the final dot. The first success wins; otherwise the
/// last error is kept.
async fn retrieve_symbol(
    ctx: &TaskContext,
    relative_path: &str,
    symbol_name: &str,
) -> SymbolRetrievalResult {
    let failure = |error: RetrieveError| SymbolRetrievalResult {
        relative_path: relative_path.to_string(),
        symbol_name: symbol_name.to_string(),
        source_blocks: Vec::new(),
        related_symbols: Vec::new(),
        error: Some(error),
    };

    if ctx.cancel.is_cancelled() {
        return failure(RetrieveError::Cancelled);
    }
    let absolute = ctx.workspace.absolute(relative_path);
    let parsed = match ctx.cache.parse_file(&absolute) {
        Ok(parsed) => parsed,
        Err(e) => return failure(RetrieveError::from_parser(e, relative_path)),
    };

    let mut blocks: Option<Vec<SourceBlock>> = None;
    let mut last_error: Option<RetrieveError> = None;
    match parser::symbol_definitions(&parsed, symbol_name, ctx.num_context_lines) {
        Ok(found) => blocks = Some(found),
        Err(e) => last_error = Some(RetrieveError::from_parser(e, relative_path)),
    }

    if blocks.is_none() {
        if let Some(normalized) = parser::normalize_symbol_from_snippet(parsed.language, symbol_name)
        {
            if normalized != symbol_name {
                debug!("retrying '{symbol_name}' as normalized '{normalized}'");
                match parser::symbol_definitions(&parsed, &normalized, ctx.num_context_lines) {
                    Ok(found) => blocks = Some(found),
                    Err(e) => last_error = Some(RetrieveError::from_parser(e, relative_path)),
                }
            }
        }
    }

    if blocks.is_none() && symbol_name.contains('.') {
        let tail = symbol_name.rsplit('.').next().unwrap_or_default();
        if !tail.is_empty() && tail != symbol_name {
            debug!("retrying '{symbol_name}' as dot-suffix '{tail}'");
            match parser::symbol_definitions(&parsed, tail, ctx.num_context_lines) {
                Ok(found) => blocks = Some(found),
                Err(e) => last_error = Some(RetrieveError::from_parser(e, relative_path)),
            }
        }
    }

    let Some(blocks) = blocks else {
        return failure(last_error.unwrap_or(RetrieveError::SymbolNotFound {
            name: symbol_name.to_string(),
            path: relative_path.to_string(),
        }));
    };

    let mut related_symbols = Vec::new();
    if ctx.include_related_symbols {
        // Header-like blocks without a name range skip this step.
        if let Some((block, name_range)) = blocks
            .iter()
            .find_map(|b| b.name_range.map(|r| (b, r)))
        {
            let name_start = name_range.start_byte as usize;
            let name_end = (name_range.end_byte as usize).min(block.source.len());
            let name_text = block.source[name_start.min(name_end)..name_end].to_string();
            match related::collect_related_symbols(
                &ctx.workspace,
                &ctx.cache,
                &ctx.registry,
                relative_path,
                &name_text,
                name_range,
                &ctx.cancel,
            )
            .await
            {
                Ok(found) => related_symbols = found,
                Err(e) => {
                    warn!("related symbols degraded for '{symbol_name}': {e}");
                    related_symbols = vec![related::degraded_related_symbol(&e, relative_path)];
                }
            }
        }
    }

    SymbolRetrievalResult {
        relative_path: relative_path.to_string(),
        symbol_name: symbol_name.to_string(),
        source_blocks: blocks,
        related_symbols,
        error: None,
    }
}
