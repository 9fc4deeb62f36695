//! Transport layer for language server communication
//!
//! Bidirectional byte-chunk exchange with no knowledge of message framing
//! or protocol. Receiving yields raw chunks; the framing layer reassembles
//! messages from them.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, ChildStdout};
use tokio::sync::mpsc;
use tracing::{error, trace};

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("transport is disconnected")]
    Disconnected,
}

/// Core transport trait for bidirectional byte exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a complete outbound payload.
    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Receive the next inbound chunk. Chunks carry no framing guarantees.
    async fn receive(&mut self) -> Result<Vec<u8>, TransportError>;

    /// Close the transport.
    async fn close(&mut self);

    /// Whether the transport is still active.
    fn is_connected(&self) -> bool;
}

// ============================================================================
// Stdio Transport
// ============================================================================

/// Transport over a child process's stdin/stdout streams.
pub struct StdioTransport {
    stdin_sender: Option<mpsc::UnboundedSender<Vec<u8>>>,
    stdout_receiver: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
    connected: bool,
}

impl StdioTransport {
    pub fn new(stdin: ChildStdin, stdout: ChildStdout) -> Self {
        let (stdin_sender, stdin_receiver) = mpsc::unbounded_channel();
        let (stdout_sender, stdout_receiver) = mpsc::unbounded_channel();

        tokio::spawn(Self::writer_task(stdin, stdin_receiver));
        tokio::spawn(Self::reader_task(stdout, stdout_sender));

        Self {
            stdin_sender: Some(stdin_sender),
            stdout_receiver: Some(stdout_receiver),
            connected: true,
        }
    }

    async fn writer_task(mut stdin: ChildStdin, mut receiver: mpsc::UnboundedReceiver<Vec<u8>>) {
        while let Some(payload) = receiver.recv().await {
            trace!("stdio transport: writing {} bytes", payload.len());
            if let Err(e) = stdin.write_all(&payload).await {
                error!("failed to write to language server stdin: {e}");
                break;
            }
            if let Err(e) = stdin.flush().await {
                error!("failed to flush language server stdin: {e}");
                break;
            }
        }
        trace!("stdio transport: writer task finished");
    }

    async fn reader_task(mut stdout: ChildStdout, sender: mpsc::UnboundedSender<Vec<u8>>) {
        let mut buf = vec![0u8; 8192];
        loop {
            match stdout.read(&mut buf).await {
                Ok(0) => {
                    trace!("stdio transport: reader reached EOF");
                    break;
                }
                Ok(n) => {
                    if sender.send(buf[..n].to_vec()).is_err() {
                        trace!("stdio transport: receiver dropped, stopping reader");
                        break;
                    }
                }
                Err(e) => {
                    error!("failed to read from language server stdout: {e}");
                    break;
                }
            }
        }
        trace!("stdio transport: reader task finished");
    }
}

#[async_trait]
impl Transport for StdioTransport {
    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::Disconnected);
        }
        let sender = self
            .stdin_sender
            .as_ref()
            .ok_or(TransportError::Disconnected)?;
        sender
            .send(payload.to_vec())
            .map_err(|_| TransportError::Disconnected)
    }

    async fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        if !self.connected {
            return Err(TransportError::Disconnected);
        }
        let receiver = self
            .stdout_receiver
            .as_mut()
            .ok_or(TransportError::Disconnected)?;
        receiver.recv().await.ok_or(TransportError::Disconnected)
    }

    async fn close(&mut self) {
        self.connected = false;
        self.stdin_sender.take();
        self.stdout_receiver.take();
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

// ============================================================================
// Mock Transport
// ============================================================================

/// Test transport with scripted responses and recorded sends.
pub struct MockTransport {
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    responses: Arc<Mutex<VecDeque<Vec<u8>>>>,
    connected: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            responses: Arc::new(Mutex::new(VecDeque::new())),
            connected: true,
        }
    }

    pub fn with_responses(responses: Vec<Vec<u8>>) -> Self {
        let transport = Self::new();
        transport
            .responses
            .lock()
            .expect("responses lock")
            .extend(responses);
        transport
    }

    /// Handle for pushing responses after construction.
    pub fn response_queue(&self) -> Arc<Mutex<VecDeque<Vec<u8>>>> {
        Arc::clone(&self.responses)
    }

    /// Handle for inspecting sent payloads.
    pub fn sent_payloads(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        Arc::clone(&self.sent)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::Disconnected);
        }
        self.sent.lock().expect("sent lock").push(payload.to_vec());
        Ok(())
    }

    async fn receive(&mut self) -> Result<Vec<u8>, TransportError> {
        if !self.connected {
            return Err(TransportError::Disconnected);
        }
        loop {
            if let Some(chunk) = self.responses.lock().expect("responses lock").pop_front() {
                return Ok(chunk);
            }
            // Wait for a test to enqueue the next scripted response.
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
    }

    async fn close(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}
