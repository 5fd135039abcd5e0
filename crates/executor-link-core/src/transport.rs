//! Transport abstraction consumed by the session workers.
//!
//! A transport carries one JSON message per frame plus the control frames
//! the keepalive and close protocols need. The session layer only ever sees
//! these traits; the WebSocket implementation lives in the transport crate.

use async_trait::async_trait;
use thiserror::Error;

/// Close code sent on voluntary shutdown.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close code synthesized when the stream ends without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;
/// Close code reported when the peer's close frame carried no status.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// One unit read from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete JSON-encoded application message.
    Message(String),
    /// Acknowledgment of a previously sent ping.
    Pong,
    /// The peer sent a close frame.
    Close { code: u16, reason: String },
    /// The stream ended without a close frame.
    Eof,
}

/// Low-level transport failure.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection handshake failed: {0}")]
    Handshake(String),
    #[error("transport failure: {0}")]
    Io(String),
}

/// Read half of a message transport.
#[async_trait]
pub trait TransportReader: Send {
    /// Read the next frame, blocking until one is available.
    async fn next_frame(&mut self) -> Result<Frame, TransportError>;
}

/// Write half of a message transport.
#[async_trait]
pub trait TransportWriter: Send {
    /// Write one complete text message.
    async fn send_text(&mut self, text: String) -> Result<(), TransportError>;

    /// Send a keepalive ping.
    async fn send_ping(&mut self) -> Result<(), TransportError>;

    /// Send a close frame.
    async fn send_close(&mut self, code: u16, reason: &str) -> Result<(), TransportError>;
}
