//! The agent loop: connect, announce, pump messages, reconnect on failure.

use std::path::PathBuf;
use std::sync::Arc;

use executor_link_auth::{IdentitySigner, SigningError};
use executor_link_core::retry::{RetryError, retry_with_backoff};
use executor_link_session::{DuplexSession, SessionError};
use executor_link_transport::{ControlMessage, ExecutorMessage, SessionClient};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AgentConfig;
use crate::dispatch::MessageHandler;

/// A failed connection attempt. Every variant is retriable; the backoff
/// runner decides when to give up.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("cannot read signing key {path}: {source}")]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Run the executor until the control plane orders a shutdown, `cancel`
/// fires, or reconnection attempts are exhausted.
///
/// Each connection attempt re-reads the signing key, dials the control
/// plane, announces itself with a `Hello`, then relays messages through
/// `handler` until the session dies.
///
/// # Errors
/// `RetryError::Cancelled` if `cancel` fired, `RetryError::Exhausted` with
/// the last connection error once the retry budget is spent.
pub async fn run_agent(
    config: AgentConfig,
    handler: Arc<dyn MessageHandler>,
    cancel: CancellationToken,
) -> Result<(), RetryError<AgentError>> {
    let client = SessionClient::new(config.keepalive.clone());
    retry_with_backoff(&config.retry, &cancel, || {
        run_connection(&config, &client, handler.as_ref(), &cancel)
    })
    .await
}

async fn run_connection(
    config: &AgentConfig,
    client: &SessionClient<ControlMessage, ExecutorMessage>,
    handler: &dyn MessageHandler,
    cancel: &CancellationToken,
) -> Result<(), AgentError> {
    let signer = load_signer(config).await?;
    let mut credentials = signer.credentials(&config.executor_id)?;
    if config.send_executor_id {
        credentials.executor_id = Some(config.executor_id.clone());
    }

    client
        .connect(cancel, &config.control_plane_url, &credentials)
        .await?;
    let session = client.session().await?;

    session
        .send(
            cancel,
            ExecutorMessage::Hello {
                executor_id: config.executor_id.clone(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        )
        .await?;

    tokio::select! {
        outcome = session.wait(cancel) => outcome.map_err(AgentError::Session),
        outcome = pump(&session, handler, cancel) => outcome,
    }
}

/// Read the key file fresh so an out-of-band rotation takes effect on the
/// next attempt without restarting the process.
async fn load_signer(config: &AgentConfig) -> Result<IdentitySigner, AgentError> {
    match &config.private_key_path {
        Some(path) => {
            let pem = tokio::fs::read_to_string(path)
                .await
                .map_err(|source| AgentError::KeyFile {
                    path: path.clone(),
                    source,
                })?;
            Ok(IdentitySigner::from_pkcs8_pem(&pem)?)
        }
        None => Ok(IdentitySigner::disabled()),
    }
}

async fn pump(
    session: &DuplexSession<ControlMessage, ExecutorMessage>,
    handler: &dyn MessageHandler,
    cancel: &CancellationToken,
) -> Result<(), AgentError> {
    loop {
        let message = session.receive(cancel).await?;

        if let ControlMessage::Shutdown { reason } = &message {
            info!(reason = %reason, "control plane requested shutdown");
            session.close();
            return Ok(());
        }

        let request_id = match &message {
            ControlMessage::Request { id, .. } => Some(id.clone()),
            _ => None,
        };
        match handler.handle(message).await {
            Ok(Some(reply)) => session.send(cancel, reply).await?,
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, request_id = request_id.as_deref(), "handler failed");
                if let Some(id) = request_id {
                    session
                        .send(
                            cancel,
                            ExecutorMessage::Failure {
                                id,
                                message: err.to_string(),
                            },
                        )
                        .await?;
                }
            }
        }
    }
}
