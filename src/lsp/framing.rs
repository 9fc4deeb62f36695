//! LSP message framing
//!
//! Reassembles `Content-Length`-framed messages from transport chunks:
//!
//! `Content-Length: <length>\r\n\r\n<content>`

use std::collections::VecDeque;

use tracing::trace;

use super::transport::{Transport, TransportError};

/// Maximum message size to prevent memory exhaustion
const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Framing errors.
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("invalid message format: {0}")]
    InvalidFormat(String),

    #[error("invalid content length: {0}")]
    InvalidContentLength(String),

    #[error("message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("message content is not valid UTF-8")]
    InvalidUtf8,
}

/// Wraps a transport to send and receive whole framed messages.
pub struct MessageFraming<T: Transport> {
    transport: T,
    buffer: Vec<u8>,
    queue: VecDeque<String>,
}

impl<T: Transport> MessageFraming<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            buffer: Vec::new(),
            queue: VecDeque::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub async fn close(&mut self) {
        self.transport.close().await;
    }

    /// Frame and send one message.
    pub async fn send(&mut self, message: &str) -> Result<(), FramingError> {
        let framed = format!("Content-Length: {}\r\n\r\n{}", message.len(), message);
        trace!("framing: sending message ({} bytes content)", message.len());
        self.transport.send(framed.as_bytes()).await?;
        Ok(())
    }

    /// Receive the next complete message, reading transport chunks as
    /// needed.
    pub async fn receive(&mut self) -> Result<String, FramingError> {
        loop {
            if let Some(message) = self.queue.pop_front() {
                return Ok(message);
            }
            let chunk = self.transport.receive().await?;
            self.buffer.extend_from_slice(&chunk);
            while let Some(message) = self.try_parse_message()? {
                self.queue.push_back(message);
            }
        }
    }

    /// Extract one complete message from the buffer, or None if more data
    /// is needed.
    fn try_parse_message(&mut self) -> Result<Option<String>, FramingError> {
        let Some(header_end) = find_subsequence(&self.buffer, b"\r\n\r\n") else {
            return Ok(None);
        };
        let header = std::str::from_utf8(&self.buffer[..header_end])
            .map_err(|_| FramingError::InvalidFormat("non-UTF-8 header".to_string()))?;
        let content_length = parse_content_length(header)?;
        let content_start = header_end + 4;

        if self.buffer.len() - content_start < content_length {
            trace!(
                "framing: incomplete message, need {} more bytes",
                content_length - (self.buffer.len() - content_start)
            );
            return Ok(None);
        }

        let content = self.buffer[content_start..content_start + content_length].to_vec();
        self.buffer.drain(..content_start + content_length);
        let message = String::from_utf8(content).map_err(|_| FramingError::InvalidUtf8)?;
        trace!("framing: parsed complete message ({content_length} bytes)");
        Ok(Some(message))
    }
}

fn parse_content_length(header: &str) -> Result<usize, FramingError> {
    for line in header.lines() {
        if let Some(value) = line.strip_prefix("Content-Length:") {
            let value = value.trim();
            let length = value
                .parse::<usize>()
                .map_err(|_| FramingError::InvalidContentLength(value.to_string()))?;
            if length > MAX_MESSAGE_SIZE {
                return Err(FramingError::MessageTooLarge {
                    size: length,
                    max: MAX_MESSAGE_SIZE,
                });
            }
            return Ok(length);
        }
    }
    Err(FramingError::InvalidFormat(
        "missing Content-Length header".to_string(),
    ))
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lsp::transport::MockTransport;

    fn framed(message: &str) -> Vec<u8> {
        format!("Content-Length: {}\r\n\r\n{}", message.len(), message).into_bytes()
    }

    #[tokio::test]
    async fn send_adds_content_length_header() {
        let transport = MockTransport::new();
        let sent = transport.sent_payloads();
        let mut framing = MessageFraming::new(transport);

        let message = r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#;
        framing.send(message).await.unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], framed(message));
    }

    #[tokio::test]
    async fn receive_parses_complete_message() {
        let message = r#"{"jsonrpc":"2.0","id":1,"result":{}}"#;
        let transport = MockTransport::with_responses(vec![framed(message)]);
        let mut framing = MessageFraming::new(transport);

        assert_eq!(framing.receive().await.unwrap(), message);
    }

    #[tokio::test]
    async fn receive_reassembles_split_message() {
        let message = r#"{"jsonrpc":"2.0","id":1,"result":{}}"#;
        let full = framed(message);
        let (first, second) = full.split_at(20);
        let transport = MockTransport::with_responses(vec![first.to_vec(), second.to_vec()]);
        let mut framing = MessageFraming::new(transport);

        assert_eq!(framing.receive().await.unwrap(), message);
    }

    #[tokio::test]
    async fn receive_splits_coalesced_messages() {
        let message1 = r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#;
        let message2 = r#"{"jsonrpc":"2.0","id":2,"method":"shutdown"}"#;
        let mut combined = framed(message1);
        combined.extend(framed(message2));
        let transport = MockTransport::with_responses(vec![combined]);
        let mut framing = MessageFraming::new(transport);

        assert_eq!(framing.receive().await.unwrap(), message1);
        assert_eq!(framing.receive().await.unwrap(), message2);
    }

    #[tokio::test]
    async fn invalid_content_length_is_an_error() {
        let transport =
            MockTransport::with_responses(vec![b"Content-Length: invalid\r\n\r\n{}".to_vec()]);
        let mut framing = MessageFraming::new(transport);

        match framing.receive().await {
            Err(FramingError::InvalidContentLength(_)) => {}
            other => panic!("expected InvalidContentLength, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_message_is_rejected() {
        let oversized = format!("Content-Length: {}\r\n\r\n", MAX_MESSAGE_SIZE + 1);
        let transport = MockTransport::with_responses(vec![oversized.into_bytes()]);
        let mut framing = MessageFraming::new(transport);

        match framing.receive().await {
            Err(FramingError::MessageTooLarge { size, max }) => {
                assert_eq!(size, MAX_MESSAGE_SIZE + 1);
                assert_eq!(max, MAX_MESSAGE_SIZE);
            }
            other => panic!("expected MessageTooLarge, got {other:?}"),
        }
    }
}
