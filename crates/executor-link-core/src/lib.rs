//! Core abstractions for the executor control-plane link.
//!
//! This crate provides the fundamental building blocks:
//! - `KeepaliveConfig` / `RetryConfig` - timing and capacity knobs
//! - `Frame` and the transport reader/writer traits the session drives
//! - `retry_with_backoff` - the driver that keeps a connection lifetime alive

pub mod config;
pub mod retry;
pub mod transport;

pub use config::{KeepaliveConfig, RetryConfig};
pub use retry::{RetryError, retry_with_backoff};
pub use transport::{Frame, TransportError, TransportReader, TransportWriter};
