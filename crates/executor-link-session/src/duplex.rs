//! Duplex session over one transport connection.
//!
//! One session owns two workers: a reader pumping transport frames into the
//! inbound mailbox and a writer draining the outbound mailbox while running
//! the keepalive exchange. The lifecycle is a pair of lock-free flags; the
//! close transition happens exactly once no matter who initiates it, and
//! only a peer-initiated close records a reason.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use executor_link_core::config::KeepaliveConfig;
use executor_link_core::transport::{
    CLOSE_ABNORMAL, CLOSE_NORMAL, Frame, TransportReader, TransportWriter,
};
use futures::future;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, Notify, mpsc, watch};
use tokio::time::{Instant, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::SessionError;

/// Why a session ended, as reported by the peer (or synthesized on EOF).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    pub code: u16,
    pub reason: String,
}

/// Lifecycle state shared between the session handle and its workers.
struct Lifecycle {
    locked: AtomicBool,
    closed: AtomicBool,
    close_reason: OnceLock<CloseReason>,
    /// Wakes the writer to emit a normal close frame.
    close_requested: Notify,
}

impl Lifecycle {
    fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            close_reason: OnceLock::new(),
            close_requested: Notify::new(),
        }
    }

    /// The winner of the single close transition returns `true`.
    fn begin_close(&self) -> bool {
        self.closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Shared handles each worker needs besides its transport half.
struct WorkerLink {
    lifecycle: Arc<Lifecycle>,
    shutdown: CancellationToken,
    faults_tx: mpsc::Sender<SessionError>,
    session_id: Uuid,
}

/// One live duplex message connection: two bounded mailboxes, two workers,
/// and the lifecycle flags. Sessions are never reused across reconnects; a
/// new one is spawned for every successful handshake.
pub struct DuplexSession<In, Out> {
    id: Uuid,
    outbound_tx: mpsc::Sender<Out>,
    inbound_rx: Mutex<mpsc::Receiver<In>>,
    faults_rx: Mutex<mpsc::Receiver<SessionError>>,
    lifecycle: Arc<Lifecycle>,
}

impl<In, Out> DuplexSession<In, Out>
where
    In: DeserializeOwned + Send + 'static,
    Out: Serialize + Send + 'static,
{
    /// Start a session over freshly split transport halves.
    ///
    /// Both workers run until the session closes, a worker faults, or
    /// `cancel` fires. A canceled worker simply stops relaying; it does not
    /// perform a transport-level close.
    #[must_use]
    pub fn spawn(
        reader: Box<dyn TransportReader>,
        writer: Box<dyn TransportWriter>,
        config: &KeepaliveConfig,
        cancel: &CancellationToken,
    ) -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::channel(config.mailbox_capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(config.mailbox_capacity);
        let (faults_tx, faults_rx) = mpsc::channel(2);
        let (pong_tx, pong_rx) = watch::channel(Instant::now());
        let lifecycle = Arc::new(Lifecycle::new());
        let shutdown = cancel.child_token();
        let id = Uuid::new_v4();

        let session = Arc::new(Self {
            id,
            outbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            faults_rx: Mutex::new(faults_rx),
            lifecycle: Arc::clone(&lifecycle),
        });

        tokio::spawn(run_reader(
            reader,
            inbound_tx,
            pong_tx,
            WorkerLink {
                lifecycle: Arc::clone(&lifecycle),
                shutdown: shutdown.clone(),
                faults_tx: faults_tx.clone(),
                session_id: id,
            },
        ));
        tokio::spawn(run_writer(
            writer,
            outbound_rx,
            pong_rx,
            config.clone(),
            WorkerLink {
                lifecycle,
                shutdown,
                faults_tx,
                session_id: id,
            },
        ));

        session
    }

    /// Opaque session identifier, unique per connection.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Enqueue one outbound message.
    ///
    /// Blocks while the outbound mailbox is full; actual transmission
    /// happens asynchronously in the writer, so caller latency is decoupled
    /// from network latency.
    ///
    /// # Errors
    /// `Cancelled` if `cancel` fired (an already-canceled token wins before
    /// anything is enqueued); `Closed`/`PeerClosed` if the session is dead.
    pub async fn send(&self, cancel: &CancellationToken, message: Out) -> Result<(), SessionError> {
        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        if self.lifecycle.is_closed() {
            return Err(self.closed_error());
        }
        tokio::select! {
            () = cancel.cancelled() => Err(SessionError::Cancelled),
            sent = self.outbound_tx.send(message) => sent.map_err(|_| self.closed_error()),
        }
    }

    /// Dequeue the next inbound message, blocking until one arrives.
    ///
    /// # Errors
    /// `Cancelled` if `cancel` fired; once the reader has exited and the
    /// mailbox drained, `PeerClosed` (when the peer supplied a reason) or
    /// `Closed` marks end of stream.
    pub async fn receive(&self, cancel: &CancellationToken) -> Result<In, SessionError> {
        let mut inbound = self.inbound_rx.lock().await;
        tokio::select! {
            () = cancel.cancelled() => Err(SessionError::Cancelled),
            received = inbound.recv() => received.ok_or_else(|| self.closed_error()),
        }
    }

    /// Claim exclusive use of the session. Fails fast, never queues.
    ///
    /// # Errors
    /// `AlreadyLocked` if another workflow holds the claim.
    pub fn lock(&self) -> Result<(), SessionError> {
        if self
            .lifecycle
            .locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Ok(())
        } else {
            Err(SessionError::AlreadyLocked)
        }
    }

    /// Release a previously claimed session.
    pub fn unlock(&self) {
        self.lifecycle.locked.store(false, Ordering::Release);
    }

    /// Whether the session is currently claimed.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lifecycle.locked.load(Ordering::Acquire)
    }

    /// Voluntary shutdown.
    ///
    /// Idempotent: only the first caller triggers the transport-level close
    /// frame, later calls observe a no-op. A local close never records a
    /// close reason.
    pub fn close(&self) {
        if self.lifecycle.begin_close() {
            debug!(session_id = %self.id, "closing session");
            self.lifecycle.close_requested.notify_one();
        }
    }

    /// Whether the close transition has happened.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lifecycle.is_closed()
    }

    /// The peer's close reason. Only meaningful after a peer-initiated
    /// close; `None` for sessions closed locally or still open.
    #[must_use]
    pub fn close_error(&self) -> Option<CloseReason> {
        self.lifecycle.close_reason.get().cloned()
    }

    /// Block until the session terminates.
    ///
    /// The first worker fault surfaces here exactly once. A peer-initiated
    /// close yields `PeerClosed`; a local close yields `Ok`.
    ///
    /// # Errors
    /// The fatal worker error, `PeerClosed`, or `Cancelled`.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), SessionError> {
        let mut faults = self.faults_rx.lock().await;
        tokio::select! {
            () = cancel.cancelled() => Err(SessionError::Cancelled),
            fault = faults.recv() => match fault {
                Some(err) => Err(err),
                // Both workers exited cleanly.
                None => match self.lifecycle.close_reason.get() {
                    Some(r) => Err(SessionError::PeerClosed {
                        code: r.code,
                        reason: r.reason.clone(),
                    }),
                    None => Ok(()),
                },
            },
        }
    }

    fn closed_error(&self) -> SessionError {
        match self.lifecycle.close_reason.get() {
            Some(r) => SessionError::PeerClosed {
                code: r.code,
                reason: r.reason.clone(),
            },
            None => SessionError::Closed,
        }
    }
}

async fn run_reader<In>(
    mut reader: Box<dyn TransportReader>,
    inbound_tx: mpsc::Sender<In>,
    pong_tx: watch::Sender<Instant>,
    link: WorkerLink,
) where
    In: DeserializeOwned + Send + 'static,
{
    if let Err(err) = read_loop(reader.as_mut(), &inbound_tx, &pong_tx, &link).await {
        warn!(session_id = %link.session_id, error = %err, "reader failed");
        let _ = link.faults_tx.try_send(err);
    }
    // Stop the writer once the read side is done relaying.
    link.shutdown.cancel();
}

async fn read_loop<In>(
    reader: &mut dyn TransportReader,
    inbound_tx: &mpsc::Sender<In>,
    pong_tx: &watch::Sender<Instant>,
    link: &WorkerLink,
) -> Result<(), SessionError>
where
    In: DeserializeOwned + Send + 'static,
{
    loop {
        let frame = tokio::select! {
            () = link.shutdown.cancelled() => return Ok(()),
            frame = reader.next_frame() => frame?,
        };
        match frame {
            Frame::Message(text) => {
                let message: In = serde_json::from_str(&text)?;
                // Blocking put: a full mailbox stalls the read side instead
                // of dropping the message.
                tokio::select! {
                    () = link.shutdown.cancelled() => return Ok(()),
                    sent = inbound_tx.send(message) => {
                        if sent.is_err() {
                            return Ok(());
                        }
                    }
                }
            }
            Frame::Pong => {
                let _ = pong_tx.send(Instant::now());
            }
            Frame::Close { code, reason } => {
                if link.lifecycle.begin_close() {
                    debug!(session_id = %link.session_id, code, reason, "peer closed session");
                    let _ = link.lifecycle.close_reason.set(CloseReason { code, reason });
                }
                return Ok(());
            }
            Frame::Eof => {
                if link.lifecycle.begin_close() {
                    let _ = link.lifecycle.close_reason.set(CloseReason {
                        code: CLOSE_ABNORMAL,
                        reason: "peer terminated without close frame".to_string(),
                    });
                }
                return Ok(());
            }
        }
    }
}

async fn run_writer<Out>(
    mut writer: Box<dyn TransportWriter>,
    mut outbound_rx: mpsc::Receiver<Out>,
    mut pong_rx: watch::Receiver<Instant>,
    config: KeepaliveConfig,
    link: WorkerLink,
) where
    Out: Serialize + Send + 'static,
{
    if let Err(err) = write_loop(
        writer.as_mut(),
        &mut outbound_rx,
        &mut pong_rx,
        &config,
        &link,
    )
    .await
    {
        warn!(session_id = %link.session_id, error = %err, "writer failed");
        let _ = link.faults_tx.try_send(err);
    }
    // Stop the reader; without a working write side the session is dead.
    link.shutdown.cancel();
}

async fn write_loop<Out>(
    writer: &mut dyn TransportWriter,
    outbound_rx: &mut mpsc::Receiver<Out>,
    pong_rx: &mut watch::Receiver<Instant>,
    config: &KeepaliveConfig,
    link: &WorkerLink,
) -> Result<(), SessionError>
where
    Out: Serialize + Send + 'static,
{
    let interval = config.ping_interval();
    let mut ping_timer = tokio::time::interval_at(Instant::now() + interval, interval);
    ping_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // Deadline by which the outstanding ping must be acknowledged.
    let mut ack_deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            () = link.shutdown.cancelled() => return Ok(()),
            () = link.lifecycle.close_requested.notified() => {
                // Local close: best-effort goodbye under the write deadline.
                let _ = timeout(config.write_timeout, writer.send_close(CLOSE_NORMAL, "")).await;
                return Ok(());
            }
            _ = ping_timer.tick() => {
                match timeout(config.write_timeout, writer.send_ping()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => return Err(err.into()),
                    Err(_) => return Err(SessionError::Timeout("ping write deadline exceeded")),
                }
                if ack_deadline.is_none() {
                    ack_deadline = Some(Instant::now() + config.pong_wait);
                }
            }
            () = sleep_until_opt(ack_deadline) => {
                return Err(SessionError::Timeout("ping not acknowledged within pong wait"));
            }
            changed = pong_rx.changed() => {
                if changed.is_err() {
                    // Reader gone; wait for its shutdown signal.
                    link.shutdown.cancelled().await;
                    return Ok(());
                }
                ack_deadline = None;
            }
            queued = outbound_rx.recv() => match queued {
                Some(message) => {
                    let text = serde_json::to_string(&message)?;
                    match timeout(config.write_timeout, writer.send_text(text)).await {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => return Err(err.into()),
                        Err(_) => return Err(SessionError::Timeout("write deadline exceeded")),
                    }
                }
                // Session handle dropped; nothing left to transmit.
                None => return Ok(()),
            },
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => future::pending().await,
    }
}
