//! Language Server Protocol client stack
//!
//! Layered client implementation with separated concerns:
//!
//! - **Transport**: byte-level message exchange with the server subprocess
//! - **Framing**: LSP message framing (Content-Length headers)
//! - **Protocol**: JSON-RPC 2.0 request/response correlation
//! - **Client**: typed LSP API using lsp-types, gated on server capabilities
//! - **Registry**: one long-lived client per (workspace, language)
//! - **Edits**: workspace-edit application with line-ending preservation

pub mod client;
pub mod edits;
pub mod framing;
pub mod protocol;
pub mod registry;
pub mod transport;

pub use client::{LspClient, LspError};
pub use edits::{EditError, apply_text_edits, apply_workspace_edit};
pub use registry::{ClientKey, LspRegistry};
