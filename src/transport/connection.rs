//! WebSocket connection and event loop.
//!
//! One [`Connection`] is one socket session with the coordinator. The event
//! loop handles:
//!
//! - Incoming text frames, handed to the [`FrameHandler`]
//! - Outgoing frames queued through the [`Connection`] handle
//! - Close and error, both of which end the session
//!
//! The loop runs inside the supervisor's task, so dropping the supervisor
//! drops the socket.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Types
// ============================================================================

/// Socket stream to the coordinator.
pub type CoordinatorStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Inbound frame handler callback.
///
/// Called with the text of every frame received from the coordinator. The
/// handler must not block; long-running work is spawned.
pub type FrameHandler = Arc<dyn Fn(String) + Send + Sync>;

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
#[derive(Debug)]
pub(crate) enum ConnectionCommand {
    /// Write a text frame.
    Send(String),
}

// ============================================================================
// Connection
// ============================================================================

/// Handle to an open socket session.
///
/// Cloning yields another handle to the same session.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
}

impl Connection {
    /// Creates a handle and the command receiver for its event loop.
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<ConnectionCommand>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        (Self { command_tx }, command_rx)
    }

    /// Performs the opening handshake with the coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the socket cannot be opened.
    pub(crate) async fn connect(url: &Url) -> Result<CoordinatorStream> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| Error::connection(format!("{url}: {e}")))?;
        Ok(ws_stream)
    }

    /// Queues a text frame for writing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the session has ended.
    pub fn send_text(&self, text: String) -> Result<()> {
        self.command_tx
            .send(ConnectionCommand::Send(text))
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Returns `true` once the event loop has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Event loop that handles WebSocket I/O until the session ends.
    pub(crate) async fn run_event_loop(
        ws_stream: CoordinatorStream,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        handler: FrameHandler,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Incoming frames from the coordinator
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            trace!(bytes = text.len(), "Frame received");
                            handler(text.as_str().to_string());
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by coordinator");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "WebSocket error");
                            break;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Frames from request tasks
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send(text)) => {
                            if let Err(e) = ws_write.send(Message::Text(text.into())).await {
                                warn!(error = %e, "Failed to write frame");
                                break;
                            }
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        // Frames queued after the loop stops are dropped with the receiver.
        command_rx.close();
        debug!("Event loop terminated");
    }
}

// ============================================================================
// Tests
// ============================================================================
