//! High-level LSP client
//!
//! Typed API over the JSON-RPC layer using the lsp-types crate. One client
//! wraps one language server subprocess; operations are gated on the
//! capabilities the server declared during initialization.

use std::path::Path;
use std::process::Stdio;
use std::sync::Mutex;

use lsp_types::{
    ClientCapabilities, ClientInfo, CodeActionContext, CodeActionKind, CodeActionParams,
    CodeActionProviderCapability, CodeActionResponse, DidChangeTextDocumentParams,
    DidCloseTextDocumentParams, DidOpenTextDocumentParams, DidSaveTextDocumentParams,
    GotoDefinitionParams, GotoDefinitionResponse, ImplementationProviderCapability,
    InitializeParams, InitializeResult, InitializedParams, Location, OneOf, PartialResultParams,
    Position, ReferenceContext, ReferenceParams, ServerCapabilities, TextDocumentClientCapabilities,
    TextDocumentContentChangeEvent, TextDocumentIdentifier, TextDocumentItem,
    TextDocumentPositionParams, TextDocumentSyncCapability, TextDocumentSyncKind,
    VersionedTextDocumentIdentifier, WorkDoneProgressParams, WorkspaceClientCapabilities,
};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::protocol::{JsonRpcClient, JsonRpcError};
use super::transport::StdioTransport;

// ============================================================================
// Errors
// ============================================================================

/// LSP client errors.
#[derive(Debug, thiserror::Error)]
pub enum LspError {
    #[error("no language server is wired for language '{0}'")]
    UnsupportedLanguage(String),

    #[error("failed to start language server: {0}")]
    Spawn(String),

    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcError),

    #[error("server capability not supported: {0}")]
    UnsupportedCapability(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Build a file URI for an absolute path.
pub fn uri_for_path(path: &Path) -> Result<lsp_types::Uri, LspError> {
    format!("file://{}", path.display())
        .parse()
        .map_err(|_| LspError::Protocol(format!("invalid file URI for {}", path.display())))
}

// ============================================================================
// Client
// ============================================================================

/// A long-lived client for one language server subprocess.
///
/// Lifecycle: started and initialized before it becomes visible to
/// callers, then shared read-only; after a fatal transport error or
/// process exit every operation fails with a transport error.
pub struct LspClient {
    rpc: JsonRpcClient,
    capabilities: ServerCapabilities,
    child: Mutex<Option<tokio::process::Child>>,
}

impl LspClient {
    /// Spawn a language server and run the initialize handshake.
    pub async fn start(
        command: &str,
        args: &[&str],
        workspace_root: &Path,
        cancel: &CancellationToken,
    ) -> Result<Self, LspError> {
        info!(
            "starting language server '{command}' for workspace {}",
            workspace_root.display()
        );
        let mut child = Command::new(command)
            .args(args)
            .current_dir(workspace_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| LspError::Spawn(format!("{command}: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| LspError::Spawn("child stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| LspError::Spawn("child stdout unavailable".to_string()))?;
        let rpc = JsonRpcClient::new(StdioTransport::new(stdin, stdout));

        let root_uri = uri_for_path(workspace_root)?;
        #[allow(deprecated)]
        let params = InitializeParams {
            process_id: Some(std::process::id()),
            root_path: None,
            root_uri: Some(root_uri),
            initialization_options: None,
            capabilities: ClientCapabilities {
                workspace: Some(WorkspaceClientCapabilities {
                    workspace_folders: Some(false),
                    ..Default::default()
                }),
                text_document: Some(TextDocumentClientCapabilities {
                    definition: Some(lsp_types::GotoCapability {
                        dynamic_registration: Some(false),
                        link_support: Some(false),
                    }),
                    references: Some(lsp_types::ReferenceClientCapabilities {
                        dynamic_registration: Some(false),
                    }),
                    implementation: Some(lsp_types::GotoCapability {
                        dynamic_registration: Some(false),
                        link_support: Some(false),
                    }),
                    code_action: Some(lsp_types::CodeActionClientCapabilities {
                        dynamic_registration: Some(false),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
            trace: None,
            workspace_folders: None,
            client_info: Some(ClientInfo {
                name: "symscope".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            locale: None,
            work_done_progress_params: WorkDoneProgressParams::default(),
        };

        let result: InitializeResult = rpc.request("initialize", Some(params), cancel).await?;
        debug!("language server capabilities: {:?}", result.capabilities);
        rpc.notify("initialized", Some(InitializedParams {})).await?;

        Ok(Self {
            rpc,
            capabilities: result.capabilities,
            child: Mutex::new(Some(child)),
        })
    }

    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    pub fn is_connected(&self) -> bool {
        self.rpc.is_connected()
    }

    // ------------------------------------------------------------------
    // Capability gates
    // ------------------------------------------------------------------

    fn sync_options(&self) -> Option<&TextDocumentSyncCapability> {
        self.capabilities.text_document_sync.as_ref()
    }

    fn supports_open_close(&self) -> bool {
        match self.sync_options() {
            Some(TextDocumentSyncCapability::Kind(kind)) => *kind != TextDocumentSyncKind::NONE,
            Some(TextDocumentSyncCapability::Options(options)) => {
                options.open_close.unwrap_or(false)
            }
            None => false,
        }
    }

    fn supports_save(&self) -> bool {
        match self.sync_options() {
            Some(TextDocumentSyncCapability::Kind(kind)) => *kind != TextDocumentSyncKind::NONE,
            Some(TextDocumentSyncCapability::Options(options)) => options.save.is_some(),
            None => false,
        }
    }

    fn supports_definition(&self) -> bool {
        match &self.capabilities.definition_provider {
            Some(OneOf::Left(enabled)) => *enabled,
            Some(OneOf::Right(_)) => true,
            None => false,
        }
    }

    fn supports_references(&self) -> bool {
        match &self.capabilities.references_provider {
            Some(OneOf::Left(enabled)) => *enabled,
            Some(OneOf::Right(_)) => true,
            None => false,
        }
    }

    fn supports_implementation(&self) -> bool {
        match &self.capabilities.implementation_provider {
            Some(ImplementationProviderCapability::Simple(enabled)) => *enabled,
            Some(_) => true,
            None => false,
        }
    }

    fn supports_code_action(&self) -> bool {
        match &self.capabilities.code_action_provider {
            Some(CodeActionProviderCapability::Simple(enabled)) => *enabled,
            Some(CodeActionProviderCapability::Options(_)) => true,
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    pub async fn definition(
        &self,
        uri: lsp_types::Uri,
        line: u32,
        character: u32,
        cancel: &CancellationToken,
    ) -> Result<Option<GotoDefinitionResponse>, LspError> {
        if !self.supports_definition() {
            return Err(LspError::UnsupportedCapability("definition".to_string()));
        }
        let params = GotoDefinitionParams {
            text_document_position_params: TextDocumentPositionParams {
                text_document: TextDocumentIdentifier { uri },
                position: Position { line, character },
            },
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };
        Ok(self
            .rpc
            .request("textDocument/definition", Some(params), cancel)
            .await?)
    }

    pub async fn references(
        &self,
        uri: lsp_types::Uri,
        line: u32,
        character: u32,
        include_declaration: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<Location>, LspError> {
        if !self.supports_references() {
            return Err(LspError::UnsupportedCapability("references".to_string()));
        }
        let params = ReferenceParams {
            text_document_position: TextDocumentPositionParams {
                text_document: TextDocumentIdentifier { uri },
                position: Position { line, character },
            },
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
            context: ReferenceContext {
                include_declaration,
            },
        };
        let locations: Option<Vec<Location>> = self
            .rpc
            .request("textDocument/references", Some(params), cancel)
            .await?;
        Ok(locations.unwrap_or_default())
    }

    pub async fn implementation(
        &self,
        uri: lsp_types::Uri,
        line: u32,
        character: u32,
        cancel: &CancellationToken,
    ) -> Result<Option<GotoDefinitionResponse>, LspError> {
        if !self.supports_implementation() {
            return Err(LspError::UnsupportedCapability("implementation".to_string()));
        }
        let params = GotoDefinitionParams {
            text_document_position_params: TextDocumentPositionParams {
                text_document: TextDocumentIdentifier { uri },
                position: Position { line, character },
            },
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };
        Ok(self
            .rpc
            .request("textDocument/implementation", Some(params), cancel)
            .await?)
    }

    /// Request code actions of the given kinds over a document range.
    pub async fn code_action(
        &self,
        uri: lsp_types::Uri,
        range: lsp_types::Range,
        only: Vec<CodeActionKind>,
        cancel: &CancellationToken,
    ) -> Result<CodeActionResponse, LspError> {
        if !self.supports_code_action() {
            return Err(LspError::UnsupportedCapability("codeAction".to_string()));
        }
        let params = CodeActionParams {
            text_document: TextDocumentIdentifier { uri },
            range,
            context: CodeActionContext {
                diagnostics: Vec::new(),
                only: Some(only),
                trigger_kind: None,
            },
            work_done_progress_params: WorkDoneProgressParams::default(),
            partial_result_params: PartialResultParams::default(),
        };
        let response: Option<CodeActionResponse> = self
            .rpc
            .request("textDocument/codeAction", Some(params), cancel)
            .await?;
        Ok(response.unwrap_or_default())
    }

    // ------------------------------------------------------------------
    // Text document lifecycle notifications
    // ------------------------------------------------------------------

    /// Notify the server that a document is open. A no-op when the server
    /// does not track open/close.
    pub async fn did_open(
        &self,
        uri: lsp_types::Uri,
        language_id: &str,
        text: String,
    ) -> Result<(), LspError> {
        if !self.supports_open_close() {
            return Ok(());
        }
        let params = DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri,
                language_id: language_id.to_string(),
                version: 0,
                text,
            },
        };
        Ok(self.rpc.notify("textDocument/didOpen", Some(params)).await?)
    }

    pub async fn did_change(
        &self,
        uri: lsp_types::Uri,
        version: i32,
        text: String,
    ) -> Result<(), LspError> {
        if self.sync_options().is_none() {
            return Ok(());
        }
        let params = DidChangeTextDocumentParams {
            text_document: VersionedTextDocumentIdentifier { uri, version },
            content_changes: vec![TextDocumentContentChangeEvent {
                range: None,
                range_length: None,
                text,
            }],
        };
        Ok(self
            .rpc
            .notify("textDocument/didChange", Some(params))
            .await?)
    }

    pub async fn did_save(&self, uri: lsp_types::Uri) -> Result<(), LspError> {
        if !self.supports_save() {
            return Ok(());
        }
        let params = DidSaveTextDocumentParams {
            text_document: TextDocumentIdentifier { uri },
            text: None,
        };
        Ok(self.rpc.notify("textDocument/didSave", Some(params)).await?)
    }

    pub async fn did_close(&self, uri: lsp_types::Uri) -> Result<(), LspError> {
        if !self.supports_open_close() {
            return Ok(());
        }
        let params = DidCloseTextDocumentParams {
            text_document: TextDocumentIdentifier { uri },
        };
        Ok(self
            .rpc
            .notify("textDocument/didClose", Some(params))
            .await?)
    }

    // ------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------

    /// Graceful shutdown: `shutdown` request, `exit` notification, then
    /// kill the subprocess if it is still around.
    pub async fn shutdown(&self, cancel: &CancellationToken) {
        if self.rpc.is_connected() {
            let _: Result<serde_json::Value, _> =
                self.rpc.request("shutdown", None::<()>, cancel).await;
            let _ = self.rpc.notify("exit", None::<()>).await;
        }
        if let Some(mut child) = self.child.lock().expect("child lock").take() {
            let _ = child.start_kill();
        }
    }
}
