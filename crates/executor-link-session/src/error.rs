//! Session-layer error taxonomy.

use executor_link_core::transport::TransportError;
use thiserror::Error;

/// Everything that can go wrong on a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session is already claimed by another workflow. Non-fatal;
    /// callers may retry after an unlock.
    #[error("session already locked")]
    AlreadyLocked,
    /// No live session exists.
    #[error("not connected")]
    NotConnected,
    /// The session was closed locally.
    #[error("session closed")]
    Closed,
    /// The peer ended the session.
    #[error("peer closed session ({code}): {reason}")]
    PeerClosed { code: u16, reason: String },
    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,
    /// A keepalive or write deadline expired.
    #[error("timed out: {0}")]
    Timeout(&'static str),
    /// The underlying transport failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Message encode/decode failure.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}
