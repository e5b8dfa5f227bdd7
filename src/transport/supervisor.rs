//! Connection supervision and reconnection.
//!
//! The [`Supervisor`] keeps exactly one socket to the coordinator. Any way a
//! session ends (connect failure, close, error) leads to `Disconnected`,
//! followed by a fixed delay and a new attempt. There is no backoff and no
//! retry cap.
//!
//! # Send Path
//!
//! [`FrameSender`] writes to whichever session is open at the time of the
//! call. When none is, the frame is dropped and the failure logged: frames are
//! never queued across a reconnect.

// ============================================================================
// Imports
// ============================================================================

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use url::Url;

use crate::protocol::OutboundFrame;

use super::connection::{Connection, FrameHandler};

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of the coordinator socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No socket; a reconnect is scheduled.
    Disconnected,
    /// Opening handshake in progress.
    Connecting,
    /// Socket open; frames can be sent.
    Open,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
        };
        f.write_str(name)
    }
}

// ============================================================================
// FrameSender
// ============================================================================

/// Best-effort, at-most-once send path to the coordinator.
#[derive(Clone, Default)]
pub struct FrameSender {
    /// Handle to the open session, if any.
    current: Arc<Mutex<Option<Connection>>>,
}

impl fmt::Debug for FrameSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSender")
            .field("open", &self.is_open())
            .finish()
    }
}

impl FrameSender {
    /// Sends a frame on the open session.
    ///
    /// Returns `false`, after logging, when no session is open.
    pub fn send(&self, frame: &OutboundFrame) -> bool {
        let text = match frame.to_json() {
            Ok(text) => text,
            Err(e) => {
                warn!(request_id = %frame.request_id, error = %e, "Failed to serialize frame");
                return false;
            }
        };

        let connection = self.current.lock().clone();
        match connection {
            Some(connection) if connection.send_text(text).is_ok() => true,
            _ => {
                warn!(request_id = %frame.request_id, "Socket not open, frame dropped");
                false
            }
        }
    }

    /// Returns `true` while a session is attached and running.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|connection| !connection.is_closed())
    }

    fn attach(&self, connection: Connection) {
        *self.current.lock() = Some(connection);
    }

    fn detach(&self) {
        self.current.lock().take();
    }
}

// ============================================================================
// Supervisor
// ============================================================================

/// Owner of the coordinator socket.
///
/// # Example
///
/// ```ignore
/// let supervisor = Supervisor::new(url, Duration::from_secs(5));
/// let sender = supervisor.sender();
/// supervisor.run(handler).await;
/// ```
pub struct Supervisor {
    /// Coordinator URL.
    url: Url,
    /// Delay between a disconnect and the next attempt.
    reconnect_delay: Duration,
    /// Shared send path.
    sender: FrameSender,
    /// State publisher.
    state_tx: watch::Sender<ConnectionState>,
}

impl Supervisor {
    /// Creates a supervisor in the `Disconnected` state.
    #[must_use]
    pub fn new(url: Url, reconnect_delay: Duration) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            url,
            reconnect_delay,
            sender: FrameSender::default(),
            state_tx,
        }
    }

    /// Returns the send path shared with request tasks.
    #[inline]
    #[must_use]
    pub fn sender(&self) -> FrameSender {
        self.sender.clone()
    }

    /// Subscribes to state changes.
    #[inline]
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Runs the connect / serve / reconnect cycle forever.
    ///
    /// Never returns; drop the future to stop. The cycle is a loop with one
    /// timer per disconnect, not recursion.
    pub async fn run(&self, handler: FrameHandler) -> Infallible {
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;
            self.set_state(ConnectionState::Connecting);
            debug!(url = %self.url, attempt, "Connecting to coordinator");

            match Connection::connect(&self.url).await {
                Ok(ws_stream) => {
                    let (connection, command_rx) = Connection::channel();
                    self.sender.attach(connection);
                    self.set_state(ConnectionState::Open);
                    info!(url = %self.url, attempt, "Coordinator connection open");

                    Connection::run_event_loop(ws_stream, command_rx, Arc::clone(&handler)).await;
                }
                Err(e) => {
                    warn!(error = %e, "Coordinator connection failed");
                }
            }

            self.sender.detach();
            self.set_state(ConnectionState::Disconnected);
            info!(
                delay_ms = self.reconnect_delay.as_millis() as u64,
                "Coordinator disconnected, reconnect scheduled"
            );

            sleep(self.reconnect_delay).await;
        }
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("url", &self.url.as_str())
            .field("reconnect_delay", &self.reconnect_delay)
            .field("state", &*self.state_tx.borrow())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
