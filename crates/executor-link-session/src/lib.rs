//! Duplex session layer: bounded mailboxes, keepalive, race-free close.
//!
//! A `DuplexSession` wraps one live transport connection and owns two
//! background workers. Callers interact only with the mailboxes and the
//! lock-free lifecycle flags; everything network-facing happens inside the
//! workers.

pub mod duplex;
pub mod error;

pub use duplex::{CloseReason, DuplexSession};
pub use error::SessionError;
