//! Core bridge implementation.
//!
//! The [`Bridge`] wires the supervisor, executor and dispatcher together and
//! routes every inbound frame.
//!
//! # Example
//!
//! ```no_run
//! use arena_bridge::{Bridge, BridgeExit};
//!
//! # async fn example() -> arena_bridge::Result<()> {
//! loop {
//!     let bridge = Bridge::builder().build()?;
//!     match bridge.run().await {
//!         BridgeExit::Reload(command) => println!("reloading after {command}"),
//!     }
//! }
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Error;
use crate::page::{CaptureState, Fetch, InterceptedFetch, Reporter};
use crate::protocol::{ControlCommand, InboundFrame};
use crate::transport::{ConnectionState, FrameHandler, FrameSender, Supervisor};

use super::builder::BridgeBuilder;
use super::dispatcher::{CommandDispatcher, Dispatch};
use super::executor::RequestExecutor;

// ============================================================================
// BridgeExit
// ============================================================================

/// Why [`Bridge::run`] returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeExit {
    /// A `refresh` or `reconnect` command asked for a full restart.
    Reload(ControlCommand),
}

// ============================================================================
// Bridge
// ============================================================================

/// The relay between the coordinator and the arena.
///
/// A bridge runs until it is told to reload. Reloading is a restart: build a
/// new bridge to pick up fresh cookies and a clean `Disconnected` state.
pub struct Bridge {
    /// Coordinator socket owner.
    supervisor: Supervisor,
    /// Relay request handling.
    executor: Arc<RequestExecutor>,
    /// Control frame handling.
    dispatcher: Arc<CommandDispatcher>,
    /// Shared capture flags.
    capture: Arc<CaptureState>,
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("supervisor", &self.supervisor)
            .field("capture_armed", &self.capture.is_armed())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Bridge - Public API
// ============================================================================

impl Bridge {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::new()
    }

    /// Subscribes to coordinator connection state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.supervisor.state()
    }

    /// Returns the shared capture flags.
    #[inline]
    #[must_use]
    pub fn capture_state(&self) -> &Arc<CaptureState> {
        &self.capture
    }

    /// Runs until a reload command arrives.
    ///
    /// On return the socket is closed and every in-flight request is aborted
    /// without a terminal frame.
    pub async fn run(self) -> BridgeExit {
        let (inbound_tx, mut inbound_rx) = mpsc::unbounded_channel();
        let handler: FrameHandler = Arc::new(move |text: String| {
            let _ = inbound_tx.send(text);
        });

        let sender = self.supervisor.sender();
        let supervisor = self.supervisor.run(handler);
        tokio::pin!(supervisor);

        let mut tasks = JoinSet::new();

        let exit = loop {
            tokio::select! {
                never = &mut supervisor => match never {},

                Some(text) = inbound_rx.recv() => {
                    if let Some(exit) = self.route(&text, &sender, &mut tasks) {
                        break exit;
                    }
                }

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined && e.is_panic() {
                        warn!(error = %e, "Request task panicked");
                    }
                }
            }
        };

        if !tasks.is_empty() {
            info!(in_flight = tasks.len(), "Aborting in-flight requests");
        }
        tasks.abort_all();
        // Aborted tasks drop their bridge-call guards as they unwind.
        while tasks.join_next().await.is_some() {}
        exit
    }
}

// ============================================================================
// Bridge - Internal
// ============================================================================

impl Bridge {
    /// Creates a bridge from validated parts.
    pub(crate) fn new(
        coordinator_url: Url,
        reconnect_delay: Duration,
        arena_base_url: Url,
        fetch: Arc<dyn Fetch>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        let capture = Arc::new(CaptureState::new());
        let intercepted: Arc<dyn Fetch> = Arc::new(InterceptedFetch::new(
            fetch,
            Arc::clone(&capture),
            Arc::clone(&reporter),
        ));

        let executor = RequestExecutor::new(
            Arc::clone(&intercepted),
            Arc::clone(&capture),
            arena_base_url.clone(),
        );
        let dispatcher = CommandDispatcher::new(
            intercepted,
            Arc::clone(&capture),
            reporter,
            arena_base_url,
        );

        Self {
            supervisor: Supervisor::new(coordinator_url, reconnect_delay),
            executor: Arc::new(executor),
            dispatcher: Arc::new(dispatcher),
            capture,
        }
    }

    /// Routes one inbound frame. Returns an exit on reload.
    fn route(
        &self,
        text: &str,
        sender: &FrameSender,
        tasks: &mut JoinSet<()>,
    ) -> Option<BridgeExit> {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Malformed frame dropped");
                return None;
            }
        };

        match frame {
            InboundFrame::Control(command) => match self.dispatcher.dispatch(command) {
                Dispatch::Continue => None,
                Dispatch::Reload(command) => {
                    info!(command = %command, "Reload requested");
                    Some(BridgeExit::Reload(command))
                }
            },

            InboundFrame::Request(request) => {
                debug!(request_id = %request.request_id, "Relay request routed");
                let executor = Arc::clone(&self.executor);
                let sender = sender.clone();
                tasks.spawn(async move {
                    executor.execute(request, &sender).await;
                });
                None
            }

            InboundFrame::Rejected { request_id, reason } => {
                self.executor.reject(request_id, &Error::validation(reason), sender);
                None
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use futures_util::{SinkExt, Stream, StreamExt, stream};
    use serde_json::{Value, json};
    use tokio::net::TcpListener;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::{Error as WsError, Message};

    use crate::error::Result;
    use crate::identifiers::SessionId;
    use crate::page::{FetchRequest, FetchResponse};

    const WAIT: Duration = Duration::from_secs(5);

    struct StreamFetch;

    #[async_trait]
    impl Fetch for StreamFetch {
        async fn fetch(&self, _request: FetchRequest) -> Result<FetchResponse> {
            Ok(FetchResponse {
                status: 200,
                body: stream::iter(vec![Ok(b"a0:\"x\"\nb0:\"y\"\n".to_vec())]).boxed(),
            })
        }
    }

    struct NullReporter;

    #[async_trait]
    impl Reporter for NullReporter {
        async fn report_session_id(&self, _session_id: &SessionId) -> Result<()> {
            Ok(())
        }

        async fn push_page_source(&self, _html: String) -> Result<()> {
            Ok(())
        }
    }

    /// Answers with one chunk, then never ends the body.
    struct EndlessFetch;

    #[async_trait]
    impl Fetch for EndlessFetch {
        async fn fetch(&self, _request: FetchRequest) -> Result<FetchResponse> {
            let first = stream::iter(vec![Ok(b"b0:\"partial\"\n".to_vec())]);
            Ok(FetchResponse {
                status: 200,
                body: first.chain(stream::pending()).boxed(),
            })
        }
    }

    async fn coordinator() -> (TcpListener, Bridge) {
        coordinator_with(Arc::new(StreamFetch)).await
    }

    async fn coordinator_with(fetch: Arc<dyn Fetch>) -> (TcpListener, Bridge) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        let bridge = Bridge::new(
            Url::parse(&format!("ws://127.0.0.1:{port}/ws")).expect("url"),
            Duration::from_millis(100),
            Url::parse("https://lmarena.ai").expect("url"),
            fetch,
            Arc::new(NullReporter),
        );
        (listener, bridge)
    }

    fn request(request_id: &str) -> Message {
        let frame = json!({
            "request_id": request_id,
            "payload": {
                "session_id": "0199aa-bb",
                "message_templates": [{ "role": "user", "content": "hi" }]
            }
        });
        Message::Text(frame.to_string().into())
    }

    async fn next_json<S>(ws: &mut S) -> Value
    where
        S: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
    {
        let message = timeout(WAIT, ws.next())
            .await
            .expect("frame in time")
            .expect("message")
            .expect("ok");
        serde_json::from_str(message.into_text().expect("text").as_str()).expect("json")
    }

    #[tokio::test]
    async fn test_request_relayed_end_to_end() {
        let (listener, bridge) = coordinator().await;
        let running = tokio::spawn(bridge.run());

        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream).await.expect("upgrade");

        ws.send(request("req-42")).await.expect("send");

        assert_eq!(
            next_json(&mut ws).await,
            json!({ "request_id": "req-42", "data": "b0:\"y\"\n" })
        );
        assert_eq!(
            next_json(&mut ws).await,
            json!({ "request_id": "req-42", "data": "[DONE]" })
        );

        running.abort();
    }

    #[tokio::test]
    async fn test_malformed_frame_ignored_then_reload_exits() {
        let (listener, bridge) = coordinator().await;
        let capture = Arc::clone(bridge.capture_state());
        let running = tokio::spawn(bridge.run());

        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream).await.expect("upgrade");

        for text in [
            r#"{"payload":{}}"#,
            "not json",
            r#"{"command":"activate_id_capture"}"#,
            r#"{"command":"refresh"}"#,
        ] {
            ws.send(Message::Text(text.into())).await.expect("send");
        }

        let exit = timeout(WAIT, running)
            .await
            .expect("exit in time")
            .expect("join");
        assert_eq!(exit, BridgeExit::Reload(ControlCommand::Refresh));
        assert!(capture.is_armed());
    }

    #[tokio::test]
    async fn test_unreadable_payload_answered_with_error_then_done() {
        let (listener, bridge) = coordinator().await;
        let running = tokio::spawn(bridge.run());

        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream).await.expect("upgrade");

        let frame = json!({
            "request_id": "req-bad",
            "payload": { "session_id": "s", "message_templates": [{ "content": "no role" }] }
        });
        ws.send(Message::Text(frame.to_string().into()))
            .await
            .expect("send");

        let error = next_json(&mut ws).await;
        assert_eq!(error["request_id"], "req-bad");
        assert!(
            error["data"]["error"]
                .as_str()
                .expect("error text")
                .starts_with("invalid payload")
        );
        assert_eq!(
            next_json(&mut ws).await,
            json!({ "request_id": "req-bad", "data": "[DONE]" })
        );

        running.abort();
    }

    #[tokio::test]
    async fn test_reload_aborts_streaming_request_silently() {
        let (listener, bridge) = coordinator_with(Arc::new(EndlessFetch)).await;
        let capture = Arc::clone(bridge.capture_state());
        let running = tokio::spawn(bridge.run());

        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream).await.expect("upgrade");

        ws.send(request("req-slow")).await.expect("send");
        assert_eq!(
            next_json(&mut ws).await,
            json!({ "request_id": "req-slow", "data": "b0:\"partial\"\n" })
        );
        assert!(capture.bridge_call_active());

        ws.send(Message::Text(r#"{"command":"reconnect"}"#.into()))
            .await
            .expect("send");
        let exit = timeout(WAIT, running)
            .await
            .expect("exit in time")
            .expect("join");
        assert_eq!(exit, BridgeExit::Reload(ControlCommand::Reconnect));
        assert!(!capture.bridge_call_active());

        // Nothing else arrives for the aborted request before the socket goes away.
        while let Ok(Some(Ok(message))) = timeout(WAIT, ws.next()).await {
            match message {
                Message::Text(text) => panic!("Unexpected frame after reload: {text}"),
                Message::Close(_) => break,
                _ => {}
            }
        }
    }
}
