//! The per-connection session: state machine, outbound queue, and the
//! read/write pump that drives one transport connection.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use ember_transport::{Connection, ConnectionId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::SessionError;
use crate::queue::{OutboundQueue, OverflowPolicy, PushOutcome};

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum frames waiting to be written to one client.
    pub outbound_capacity: usize,

    /// What happens when `outbound_capacity` is exceeded.
    pub overflow: OverflowPolicy,

    /// How long a new connection has to complete its handshake.
    pub handshake_timeout: Duration,

    /// How long an open session may go without traffic. A frame read
    /// from the client or written to it both count, so a client that only
    /// listens stays connected while it is being sent updates.
    pub idle_timeout: Duration,

    /// Upper bound on writing one frame to the transport.
    pub write_timeout: Duration,

    /// Upper bound on flushing queued frames and closing the transport
    /// once the session is closing.
    pub flush_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            overflow: OverflowPolicy::DropOldest,
            handshake_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(5),
            flush_timeout: Duration::from_secs(1),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The lifecycle state of a session.
///
/// ```text
/// Connecting → Open → Closing → Closed
///      └───────────────↗
/// ```
///
/// - **Connecting**: accepted, waiting for the client's handshake.
/// - **Open**: frames flow in both directions.
/// - **Closing**: a close was requested locally or the transport failed.
///   Queued frames are flushed best-effort; nothing new is accepted.
/// - **Closed**: terminal. Transport resources have been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

impl SessionState {
    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Connecting, Self::Open)
                | (Self::Connecting, Self::Closing)
                | (Self::Open, Self::Closing)
                | (Self::Closing, Self::Closed)
        )
    }

    /// Returns `true` once a close has been requested.
    pub fn is_closing_or_closed(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Open => write!(f, "Open"),
            Self::Closing => write!(f, "Closing"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

struct Lifecycle {
    state: SessionState,
    close_reason: Option<String>,
}

/// The live state of one client's transport connection.
///
/// A `Session` is shared (`Arc<Session>`) between the task running its
/// [`run`](Session::run) pump and anyone who wants to push frames to it or
/// kick it: the live-session set, broadcast, message handlers. All public
/// methods take `&self` and are safe to call from any task.
pub struct Session {
    id: ConnectionId,
    config: SessionConfig,
    lifecycle: Mutex<Lifecycle>,
    outbound: OutboundQueue,
    closing: watch::Sender<bool>,
    started: AtomicBool,
    last_activity: Mutex<Instant>,
}

impl Session {
    /// Creates a session in the `Connecting` state.
    pub fn new(id: ConnectionId, config: SessionConfig) -> Self {
        let outbound = OutboundQueue::new(config.outbound_capacity, config.overflow);
        let (closing, _) = watch::channel(false);
        Self {
            id,
            config,
            lifecycle: Mutex::new(Lifecycle {
                state: SessionState::Connecting,
                close_reason: None,
            }),
            outbound,
            closing,
            started: AtomicBool::new(false),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    /// The session's handle, shared with its connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.lock().state
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Why the session is closing, once it is.
    pub fn close_reason(&self) -> Option<String> {
        self.lifecycle.lock().close_reason.clone()
    }

    /// Number of frames waiting to be written.
    pub fn pending(&self) -> usize {
        self.outbound.len()
    }

    /// Moves `Connecting → Open`. Returns `false` from any other state.
    pub fn open(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if !lifecycle.state.can_transition_to(SessionState::Open) {
            return false;
        }
        lifecycle.state = SessionState::Open;
        drop(lifecycle);
        tracing::info!(session = %self.id, "session open");
        true
    }

    /// Queues one complete frame for delivery.
    ///
    /// Frames are written in the order they were queued. Sending to a
    /// session that is not `Open` is not an error: the frame is dropped,
    /// logged, and `false` is returned.
    pub fn send(&self, frame: Bytes) -> bool {
        let state = self.state();
        if state != SessionState::Open {
            tracing::debug!(
                session = %self.id, %state,
                "dropping outbound frame: session not open"
            );
            return false;
        }
        match self.outbound.push(frame) {
            PushOutcome::Queued => true,
            PushOutcome::DroppedOldest => {
                tracing::warn!(
                    session = %self.id,
                    "outbound queue full, dropped oldest frame"
                );
                true
            }
            PushOutcome::Rejected => {
                self.close("outbound queue overflow");
                false
            }
        }
    }

    /// Requests the session to close.
    ///
    /// Idempotent and callable from any task, including while the pump is
    /// blocked reading. Returns `true` only for the call that actually
    /// initiated the close; `reason` from later calls is ignored.
    pub fn close(&self, reason: impl Into<String>) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state.is_closing_or_closed() {
            return false;
        }
        let reason = reason.into();
        lifecycle.state = SessionState::Closing;
        lifecycle.close_reason = Some(reason.clone());
        drop(lifecycle);

        self.closing.send_replace(true);
        tracing::info!(session = %self.id, %reason, "session closing");
        true
    }

    /// Queues `frame` as the last one this session will send, then closes.
    ///
    /// Unlike [`send`](Self::send) this works before the handshake, so a
    /// client can be told why it is being turned away without the session
    /// ever becoming `Open` (and so without it receiving broadcasts).
    /// Returns `false`, and queues nothing, if the session is already
    /// closing.
    pub fn close_with_frame(&self, frame: Bytes, reason: impl Into<String>) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state.is_closing_or_closed() {
            return false;
        }
        let reason = reason.into();
        self.outbound.push(frame);
        lifecycle.state = SessionState::Closing;
        lifecycle.close_reason = Some(reason.clone());
        drop(lifecycle);

        self.closing.send_replace(true);
        tracing::info!(session = %self.id, %reason, "session closing after final frame");
        true
    }

    /// Resolves once a close has been requested.
    pub async fn closed(&self) {
        let mut rx = self.closing.subscribe();
        // The sender lives in `self`, so this cannot observe a dropped
        // channel while `self` is borrowed.
        let _ = rx.wait_for(|closing| *closing).await;
    }

    fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    fn idle_deadline(&self) -> Instant {
        *self.last_activity.lock() + self.config.idle_timeout
    }

    fn finish(&self) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.state.can_transition_to(SessionState::Closed) {
            lifecycle.state = SessionState::Closed;
        }
    }

    /// Drives `conn` until the session closes.
    ///
    /// Reads and writes run concurrently on the calling task. Every
    /// complete inbound frame is passed to `on_frame` in arrival order;
    /// `on_frame` runs on the read path, so it must not block for longer
    /// than decoding and a registry update take.
    ///
    /// The pump ends when the peer disconnects, the transport fails, a
    /// timeout expires, or [`close`](Session::close) is called. It then
    /// flushes queued frames best-effort, closes the transport exactly
    /// once, and leaves the session `Closed`.
    ///
    /// # Errors
    /// [`SessionError::AlreadyStarted`] if the pump was already run for
    /// this session.
    pub async fn run<C, F>(&self, conn: C, mut on_frame: F) -> Result<(), SessionError>
    where
        C: Connection,
        F: FnMut(&Session, Vec<u8>),
    {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(SessionError::AlreadyStarted(self.id));
        }
        tracing::debug!(session = %self.id, "session pump started");
        self.touch();

        tokio::join!(self.read_loop(&conn, &mut on_frame), self.write_loop(&conn));

        match tokio::time::timeout(self.config.flush_timeout, conn.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(session = %self.id, error = %e, "transport close failed")
            }
            Err(_) => tracing::debug!(session = %self.id, "transport close timed out"),
        }
        self.finish();

        tracing::info!(
            session = %self.id,
            reason = self.close_reason().as_deref().unwrap_or("unknown"),
            "session closed"
        );
        Ok(())
    }

    async fn read_loop<C, F>(&self, conn: &C, on_frame: &mut F)
    where
        C: Connection,
        F: FnMut(&Session, Vec<u8>),
    {
        let handshake_deadline = Instant::now() + self.config.handshake_timeout;
        loop {
            let connecting = self.state() == SessionState::Connecting;
            let recv = conn.recv();
            tokio::pin!(recv);

            // Writes move the idle deadline too, so it is re-read each
            // time the timer fires.
            let received = loop {
                let deadline = if connecting {
                    handshake_deadline
                } else {
                    self.idle_deadline()
                };
                tokio::select! {
                    _ = self.closed() => return,
                    received = &mut recv => break Some(received),
                    _ = tokio::time::sleep_until(deadline) => {
                        if connecting || self.idle_deadline() <= Instant::now() {
                            break None;
                        }
                    }
                }
            };

            match received {
                Some(Ok(Some(data))) => {
                    self.touch();
                    on_frame(self, data);
                }
                Some(Ok(None)) => {
                    self.close("connection closed by peer");
                    break;
                }
                Some(Err(e)) => {
                    self.close(format!("transport error: {e}"));
                    break;
                }
                None if connecting => {
                    self.close("handshake timed out");
                    break;
                }
                None => {
                    self.close("idle timeout");
                    break;
                }
            }
        }
    }

    async fn write_loop<C: Connection>(&self, conn: &C) {
        loop {
            while let Some(frame) = self.outbound.pop() {
                if !self.write_frame(conn, &frame).await {
                    return;
                }
            }
            if self.state().is_closing_or_closed() {
                break;
            }
            tokio::select! {
                _ = self.outbound.notified() => {}
                _ = self.closed() => {}
            }
        }

        // Closing: best-effort flush of whatever is still queued.
        let flush = async {
            while let Some(frame) = self.outbound.pop() {
                if conn.send(&frame).await.is_err() {
                    break;
                }
            }
        };
        if tokio::time::timeout(self.config.flush_timeout, flush).await.is_err() {
            tracing::debug!(
                session = %self.id,
                dropped = self.outbound.len(),
                "flush timed out"
            );
        }
    }

    /// Writes one frame. On failure the session is closed and `false`
    /// returned.
    async fn write_frame<C: Connection>(&self, conn: &C, frame: &[u8]) -> bool {
        match tokio::time::timeout(self.config.write_timeout, conn.send(frame)).await {
            Ok(Ok(())) => {
                self.touch();
                true
            }
            Ok(Err(e)) => {
                self.close(format!("transport error: {e}"));
                false
            }
            Err(_) => {
                self.close("write timed out");
                false
            }
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("pending", &self.pending())
            .finish()
    }
}
