//! WebSocket transport and session client for the executor link.
//!
//! Provides:
//! - Wire protocol envelopes (JSON, payload-agnostic)
//! - WebSocket reader/writer halves implementing the core transport traits
//! - `SessionClient`, the connect/reconnect boundary holding one session

pub mod client;
pub mod protocol;
pub mod ws;

pub use client::SessionClient;
pub use protocol::{ControlMessage, ExecutorMessage};
