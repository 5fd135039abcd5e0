//! Application dispatch seam.
//!
//! Storage, provider, and policy collaborators plug in behind
//! `MessageHandler`; the link layer treats their payloads as opaque and a
//! handler failure is answered on the wire, never fatal to the channel.

use async_trait::async_trait;
use executor_link_transport::{ControlMessage, ExecutorMessage};
use thiserror::Error;

/// Handler-level failure, reported back as an `ExecutorMessage::Failure`.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("operation failed: {0}")]
    Failed(String),
}

/// Trait for the application layer riding over the session.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handle one inbound message, optionally producing a reply.
    async fn handle(
        &self,
        message: ControlMessage,
    ) -> Result<Option<ExecutorMessage>, DispatchError>;
}

/// Rejects every request; stands in until real collaborators are wired up.
pub struct NullHandler;

#[async_trait]
impl MessageHandler for NullHandler {
    async fn handle(
        &self,
        message: ControlMessage,
    ) -> Result<Option<ExecutorMessage>, DispatchError> {
        match message {
            ControlMessage::Request { operation, .. } => {
                Err(DispatchError::Unsupported(operation))
            }
            ControlMessage::Event { topic, .. } => {
                tracing::debug!(topic, "ignoring event");
                Ok(None)
            }
            ControlMessage::Shutdown { .. } => Ok(None),
        }
    }
}
