//! JSON-RPC 2.0 protocol layer
//!
//! Correlates requests with responses by id over a framed transport. All
//! requests on one client are serialized through a single outbound channel
//! and totally ordered by their ids.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use super::framing::MessageFraming;
use super::transport::Transport;

// ============================================================================
// Errors
// ============================================================================

/// JSON-RPC client errors.
#[derive(Debug, thiserror::Error)]
pub enum JsonRpcError {
    #[error("serialization error: {0}")]
    Serialization(serde_json::Error),

    #[error("deserialization error: {0}")]
    Deserialization(serde_json::Error),

    #[error("server error ({code}): {message}")]
    Server { code: i32, message: String },

    #[error("connection to language server closed")]
    ConnectionClosed,

    #[error("request was cancelled")]
    Cancelled,
}

/// JSON-RPC error object carried in failed responses.
#[derive(Debug, Clone)]
struct ErrorObject {
    code: i32,
    message: String,
}

// ============================================================================
// Inbound Message Classification
// ============================================================================

/// A received message, classified per the JSON-RPC 2.0 specification.
enum InboundMessage {
    /// Server-to-client request (method + non-null id).
    Request { id: Value, method: String },
    /// Notification (method, no id).
    Notification { method: String },
    /// Response to one of our requests (id, no method).
    Response {
        id: Value,
        result: Option<Value>,
        error: Option<ErrorObject>,
    },
    Invalid(String),
}

impl InboundMessage {
    fn classify(message: &str) -> Self {
        let parsed: Value = match serde_json::from_str(message) {
            Ok(value) => value,
            Err(e) => return Self::Invalid(format!("JSON parse error: {e}")),
        };

        let method = parsed
            .get("method")
            .and_then(|m| m.as_str())
            .map(str::to_string);
        let id = parsed.get("id").cloned();

        match (method, id) {
            (Some(method), Some(id)) if !id.is_null() => Self::Request { id, method },
            (Some(method), _) => Self::Notification { method },
            (None, Some(id)) if !id.is_null() => {
                let result = parsed.get("result").cloned();
                let error = parsed.get("error").map(|e| ErrorObject {
                    code: e.get("code").and_then(Value::as_i64).unwrap_or(0) as i32,
                    message: e
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                        .to_string(),
                });
                Self::Response { id, result, error }
            }
            _ => Self::Invalid("missing required fields".to_string()),
        }
    }
}

// ============================================================================
// Client
// ============================================================================

struct ResponsePayload {
    result: Option<Value>,
    error: Option<ErrorObject>,
}

type PendingMap = Arc<Mutex<HashMap<i64, oneshot::Sender<ResponsePayload>>>>;

/// JSON-RPC client with request/response correlation.
///
/// A background task owns the framed transport; requests and notifications
/// go through an outbound channel, inbound responses complete their
/// pending oneshot.
pub struct JsonRpcClient {
    outbound: mpsc::UnboundedSender<String>,
    next_id: AtomicI64,
    pending: PendingMap,
    connected: Arc<AtomicBool>,
}

impl JsonRpcClient {
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        let mut framing = MessageFraming::new(transport);
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let connected = Arc::new(AtomicBool::new(true));

        enum Event {
            Outbound(Option<String>),
            Inbound(Result<String, super::framing::FramingError>),
        }

        let pending_for_task = Arc::clone(&pending);
        let connected_for_task = Arc::clone(&connected);
        let outbound_for_task = outbound.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    message = outbound_rx.recv() => Event::Outbound(message),
                    inbound = framing.receive() => Event::Inbound(inbound),
                };
                match event {
                    Event::Outbound(Some(message)) => {
                        if let Err(e) = framing.send(&message).await {
                            error!("failed to send message to language server: {e}");
                            break;
                        }
                    }
                    Event::Outbound(None) => break,
                    Event::Inbound(Ok(message)) => {
                        Self::process_inbound(&message, &pending_for_task, &outbound_for_task);
                    }
                    Event::Inbound(Err(e)) => {
                        debug!("language server connection ended: {e}");
                        break;
                    }
                }
            }
            connected_for_task.store(false, Ordering::SeqCst);
            // Dropping the senders fails every pending request.
            pending_for_task.lock().expect("pending lock").clear();
            framing.close().await;
            trace!("json-rpc pump task finished");
        });

        Self {
            outbound,
            next_id: AtomicI64::new(1),
            pending,
            connected,
        }
    }

    fn process_inbound(message: &str, pending: &PendingMap, outbound: &mpsc::UnboundedSender<String>) {
        match InboundMessage::classify(message) {
            InboundMessage::Response { id, result, error } => {
                let Some(id) = id.as_i64() else {
                    debug!("response with non-numeric id cannot be matched: {id:?}");
                    return;
                };
                let sender = pending.lock().expect("pending lock").remove(&id);
                match sender {
                    Some(sender) => {
                        let _ = sender.send(ResponsePayload { result, error });
                    }
                    None => debug!("response for unknown request id {id}"),
                }
            }
            InboundMessage::Request { id, method } => {
                // The retrieval engine has no server-to-client features;
                // answer with an empty result so the server can proceed.
                debug!("auto-acknowledging server request '{method}'");
                let response =
                    json!({"jsonrpc": "2.0", "id": id, "result": Value::Null}).to_string();
                let _ = outbound.send(response);
            }
            InboundMessage::Notification { method } => {
                trace!("ignoring server notification '{method}'");
            }
            InboundMessage::Invalid(reason) => {
                warn!("received invalid JSON-RPC message: {reason}");
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && !self.outbound.is_closed()
    }

    /// Send a request and await its response. There is no built-in
    /// timeout; callers bound the wait through the cancellation token.
    pub async fn request<P, R>(
        &self,
        method: &str,
        params: Option<P>,
        cancel: &CancellationToken,
    ) -> Result<R, JsonRpcError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        if !self.is_connected() {
            return Err(JsonRpcError::ConnectionClosed);
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = oneshot::channel();
        self.pending
            .lock()
            .expect("pending lock")
            .insert(id, sender);

        let params = params
            .map(|p| serde_json::to_value(p).map_err(JsonRpcError::Serialization))
            .transpose()?;
        let mut request = json!({"jsonrpc": "2.0", "id": id, "method": method});
        if let Some(params) = params {
            request["params"] = params;
        }
        trace!("sending request #{id}: {method}");

        if self.outbound.send(request.to_string()).is_err() {
            self.pending.lock().expect("pending lock").remove(&id);
            return Err(JsonRpcError::ConnectionClosed);
        }

        let payload = tokio::select! {
            payload = receiver => match payload {
                Ok(payload) => payload,
                Err(_) => return Err(JsonRpcError::ConnectionClosed),
            },
            _ = cancel.cancelled() => {
                self.pending.lock().expect("pending lock").remove(&id);
                return Err(JsonRpcError::Cancelled);
            }
        };

        if let Some(error) = payload.error {
            return Err(JsonRpcError::Server {
                code: error.code,
                message: error.message,
            });
        }
        // Absent and null results deserialize identically; `shutdown`
        // and friends return null.
        let result = payload.result.unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(JsonRpcError::Deserialization)
    }

    /// Send a notification (no response expected).
    pub async fn notify<P>(&self, method: &str, params: Option<P>) -> Result<(), JsonRpcError>
    where
        P: Serialize,
    {
        if !self.is_connected() {
            return Err(JsonRpcError::ConnectionClosed);
        }
        let params = params
            .map(|p| serde_json::to_value(p).map_err(JsonRpcError::Serialization))
            .transpose()?;
        let mut notification = json!({"jsonrpc": "2.0", "method": method});
        if let Some(params) = params {
            notification["params"] = params;
        }
        trace!("sending notification: {method}");
        self.outbound
            .send(notification.to_string())
            .map_err(|_| JsonRpcError::ConnectionClosed)
    }
}
