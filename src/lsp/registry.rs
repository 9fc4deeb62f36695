//! Per-(workspace, language) client registry
//!
//! Keeps at most one language server client per key for the lifetime of
//! the process. Initialization is coalesced: a per-key mutex elects one
//! caller to start the server while the rest wait, then re-check the
//! cache.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::client::{LspClient, LspError};
use crate::parser::Language;

/// Registry key: one client per workspace root per language.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientKey {
    pub workspace_root: PathBuf,
    pub language: Language,
}

/// The server command for a language. Only Go is wired.
fn server_command(language: Language) -> Result<(&'static str, &'static [&'static str]), LspError> {
    match language {
        Language::Golang => Ok(("gopls", &[])),
        other => Err(LspError::UnsupportedLanguage(
            other.identifier().to_string(),
        )),
    }
}

/// Process-wide registry of language server clients.
///
/// Once initialized, clients are shared read-only references; the registry
/// is the only process-wide mutable state in the engine. `shutdown_all`
/// exists as a teardown hook for tests and embedding processes.
#[derive(Default)]
pub struct LspRegistry {
    clients: Mutex<HashMap<ClientKey, Arc<LspClient>>>,
    init_locks: Mutex<HashMap<ClientKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl LspRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the client for `(workspace_root, language)`, starting and
    /// initializing one if none exists yet.
    ///
    /// A client that has since died is returned as-is; its operations fail
    /// with a transport error and reinitialization is not attempted.
    pub async fn get_or_init(
        &self,
        workspace_root: &Path,
        language: Language,
        cancel: &CancellationToken,
    ) -> Result<Arc<LspClient>, LspError> {
        let key = ClientKey {
            workspace_root: workspace_root.to_path_buf(),
            language,
        };

        if let Some(client) = self.clients.lock().expect("client map lock").get(&key) {
            return Ok(Arc::clone(client));
        }

        // Load-or-create the per-key locker, then re-check the cache
        // inside the critical section.
        let locker = {
            let mut locks = self.init_locks.lock().expect("init lock map lock");
            Arc::clone(
                locks
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
            )
        };
        let _guard = locker.lock().await;

        if let Some(client) = self.clients.lock().expect("client map lock").get(&key) {
            return Ok(Arc::clone(client));
        }

        let (command, args) = server_command(language)?;
        let client = Arc::new(LspClient::start(command, args, workspace_root, cancel).await?);
        info!(
            "language server ready for {language} in {}",
            workspace_root.display()
        );
        self.clients
            .lock()
            .expect("client map lock")
            .insert(key, Arc::clone(&client));
        Ok(client)
    }

    /// Number of live clients, for tests.
    pub fn client_count(&self) -> usize {
        self.clients.lock().expect("client map lock").len()
    }

    /// Shut down every client and clear the registry.
    pub async fn shutdown_all(&self) {
        let clients: Vec<Arc<LspClient>> = {
            let mut map = self.clients.lock().expect("client map lock");
            map.drain().map(|(_, client)| client).collect()
        };
        let cancel = CancellationToken::new();
        for client in clients {
            client.shutdown(&cancel).await;
        }
        self.init_locks.lock().expect("init lock map lock").clear();
    }
}
