//! Client owning the connect/reconnect boundary for one session.

use std::sync::Arc;

use executor_link_auth::Credentials;
use executor_link_core::config::KeepaliveConfig;
use executor_link_session::{CloseReason, DuplexSession, SessionError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::ws;

/// Holds zero or one live `DuplexSession` at a time.
///
/// Each successful `connect` replaces the held session with a fresh one;
/// sessions are never reused across reconnects.
pub struct SessionClient<In, Out> {
    config: KeepaliveConfig,
    session: RwLock<Option<Arc<DuplexSession<In, Out>>>>,
}

impl<In, Out> SessionClient<In, Out>
where
    In: DeserializeOwned + Send + 'static,
    Out: Serialize + Send + 'static,
{
    /// Create a client with no session.
    #[must_use]
    pub fn new(config: KeepaliveConfig) -> Self {
        Self {
            config,
            session: RwLock::new(None),
        }
    }

    /// Dial `url` with the given credentials and start a new session.
    ///
    /// A previously held session is replaced, not closed: callers close
    /// explicitly before reconnecting or accept that the old session becomes
    /// unreachable.
    ///
    /// # Errors
    /// `SessionError::Transport` if the handshake fails.
    pub async fn connect(
        &self,
        cancel: &CancellationToken,
        url: &str,
        credentials: &Credentials,
    ) -> Result<(), SessionError> {
        let (reader, writer) = ws::connect(url, credentials, &self.config).await?;
        let session = DuplexSession::spawn(Box::new(reader), Box::new(writer), &self.config, cancel);
        info!(session_id = %session.id(), url, "session established");
        *self.session.write().await = Some(session);
        Ok(())
    }

    /// The currently held session.
    ///
    /// # Errors
    /// `SessionError::NotConnected` if no session exists.
    pub async fn session(&self) -> Result<Arc<DuplexSession<In, Out>>, SessionError> {
        self.session
            .read()
            .await
            .clone()
            .ok_or(SessionError::NotConnected)
    }

    /// True iff a session exists and has not closed.
    pub async fn is_connected(&self) -> bool {
        self.session
            .read()
            .await
            .as_ref()
            .is_some_and(|s| !s.is_closed())
    }

    /// Enqueue one message on the held session.
    ///
    /// # Errors
    /// `NotConnected` without a session; otherwise whatever `send` returns.
    pub async fn send_message(
        &self,
        cancel: &CancellationToken,
        message: Out,
    ) -> Result<(), SessionError> {
        self.session().await?.send(cancel, message).await
    }

    /// Dequeue the next message from the held session.
    ///
    /// # Errors
    /// `NotConnected` without a session; otherwise whatever `receive`
    /// returns.
    pub async fn receive_message(&self, cancel: &CancellationToken) -> Result<In, SessionError> {
        self.session().await?.receive(cancel).await
    }

    /// Close the held session.
    ///
    /// # Errors
    /// `NotConnected` without a session.
    pub async fn close(&self) -> Result<(), SessionError> {
        self.session().await?.close();
        Ok(())
    }

    /// The peer's close reason, if a session exists and the peer ended it.
    pub async fn close_error(&self) -> Option<CloseReason> {
        match self.session.read().await.as_ref() {
            Some(session) => session.close_error(),
            None => None,
        }
    }

    /// Block until the held session terminates.
    ///
    /// # Errors
    /// `NotConnected` without a session; otherwise whatever `wait` returns.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), SessionError> {
        self.session().await?.wait(cancel).await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn client() -> SessionClient<Value, Value> {
        SessionClient::new(KeepaliveConfig::default())
    }

    #[tokio::test]
    async fn test_operations_without_session_report_not_connected() {
        let client = client();
        let cancel = CancellationToken::new();

        assert!(!client.is_connected().await);
        assert!(matches!(
            client.send_message(&cancel, json!("hi")).await,
            Err(SessionError::NotConnected)
        ));
        assert!(matches!(
            client.receive_message(&cancel).await,
            Err(SessionError::NotConnected)
        ));
        assert!(matches!(client.close().await, Err(SessionError::NotConnected)));
        assert!(client.close_error().await.is_none());
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_url() {
        let client = client();
        let cancel = CancellationToken::new();

        let result = client
            .connect(&cancel, "not a websocket url", &Credentials::default())
            .await;
        assert!(matches!(result, Err(SessionError::Transport(_))));
        assert!(!client.is_connected().await);
    }
}
