//! Request executor.
//!
//! Turns one [`RequestFrame`] into one streamed evaluation call and relays
//! the demultiplexed response back as [`OutboundFrame`]s.
//!
//! # Termination
//!
//! | Outcome | Frames emitted |
//! |---------|----------------|
//! | pre-flight validation failure | error, then `[DONE]` |
//! | clean end of stream | chunks, then `[DONE]` |
//! | non-success status | error only |
//! | submission or read failure | chunks so far, then error only |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::StreamExt;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::page::{CaptureState, Fetch, FetchRequest};
use crate::protocol::{EvaluationBody, OutboundFrame, RequestFrame, RequestPayload};
use crate::stream::{Utf8Decoder, demultiplex};
use crate::transport::FrameSender;

// ============================================================================
// Constants
// ============================================================================

/// Evaluation endpoint path, relative to the arena base URL.
const EVALUATION_PATH: &str = "nextjs-api/stream/post-to-evaluation";

// ============================================================================
// FrameSink
// ============================================================================

/// Destination of outbound frames.
pub trait FrameSink: Send + Sync {
    /// Sends a frame; returns `false` if it was dropped.
    fn send(&self, frame: &OutboundFrame) -> bool;
}

impl FrameSink for FrameSender {
    fn send(&self, frame: &OutboundFrame) -> bool {
        FrameSender::send(self, frame)
    }
}

// ============================================================================
// RequestExecutor
// ============================================================================

/// Executes relay requests against the arena.
pub struct RequestExecutor {
    /// Intercepted network primitive.
    fetch: Arc<dyn Fetch>,
    /// Shared capture flags.
    state: Arc<CaptureState>,
    /// Arena origin.
    base_url: Url,
    /// Requests seen so far.
    sequence: AtomicU64,
}

impl RequestExecutor {
    /// Creates an executor.
    pub fn new(fetch: Arc<dyn Fetch>, state: Arc<CaptureState>, base_url: Url) -> Self {
        Self {
            fetch,
            state,
            base_url,
            sequence: AtomicU64::new(0),
        }
    }

    /// Runs one request to completion, emitting its frames on `sink`.
    pub async fn execute(&self, frame: RequestFrame, sink: &dyn FrameSink) {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let RequestFrame {
            request_id,
            payload,
        } = frame;

        info!(
            seq,
            request_id = %request_id,
            session_id = %payload.session_id,
            battle_target = %payload.battle_target,
            messages = payload.message_templates.len(),
            "Request received"
        );

        match self.relay(seq, &request_id, &payload, sink).await {
            Ok(chunks) => {
                sink.send(&OutboundFrame::done(request_id.clone()));
                info!(seq, request_id = %request_id, chunks, "Request completed");
            }
            Err(e) if e.is_validation_error() => self.reject(request_id, &e, sink),
            Err(e) => {
                error!(seq, request_id = %request_id, error = %e, "Request failed");
                sink.send(&OutboundFrame::error(request_id, e.to_string()));
            }
        }
    }

    /// Answers a request that never reaches the network: error, then `[DONE]`.
    pub fn reject(&self, request_id: RequestId, reason: &Error, sink: &dyn FrameSink) {
        warn!(request_id = %request_id, error = %reason, "Request rejected");
        sink.send(&OutboundFrame::error(request_id.clone(), reason.to_string()));
        sink.send(&OutboundFrame::done(request_id));
    }

    /// Issues the call and relays the stream. Returns the number of chunks sent.
    async fn relay(
        &self,
        seq: u64,
        request_id: &RequestId,
        payload: &RequestPayload,
        sink: &dyn FrameSink,
    ) -> Result<usize> {
        validate(payload)?;
        let body = EvaluationBody::build(payload)
            .ok_or_else(|| Error::validation("message_templates must be a non-empty list"))?;
        let request = self.evaluation_request(payload, &body)?;

        // Held until the stream is exhausted or fails.
        let _bridge_call = self.state.begin_bridge_call();

        debug!(seq, url = %request.url, "Submitting evaluation call");
        let response = self.fetch.fetch(request).await?;

        if !response.is_success() {
            let status = response.status;
            let text = response.text().await.unwrap_or_default();
            return Err(Error::http_status(status, &text));
        }

        let target = payload.battle_target;
        let mut decoder = Utf8Decoder::new();
        let mut body = response.body;
        let mut chunks = 0usize;

        let mut relay_text = |text: String| {
            if text.is_empty() {
                return;
            }
            trace!(seq, bytes = text.len(), "Chunk read");
            if let Some(filtered) = demultiplex(&text, target) {
                sink.send(&OutboundFrame::chunk(request_id.clone(), filtered));
                chunks += 1;
            }
        };

        while let Some(read) = body.next().await {
            let bytes = read?;
            relay_text(decoder.decode(&bytes));
        }
        if decoder.has_pending() {
            debug!(seq, "Stream ended inside a UTF-8 sequence");
        }
        relay_text(decoder.finish());

        Ok(chunks)
    }

    /// Builds the streaming evaluation call.
    fn evaluation_request(
        &self,
        payload: &RequestPayload,
        body: &EvaluationBody,
    ) -> Result<FetchRequest> {
        let origin = self.base_url.as_str().trim_end_matches('/');
        let url = Url::parse(&format!(
            "{origin}/{EVALUATION_PATH}/{}",
            payload.session_id
        ))?;
        let json = serde_json::to_string(body)?;

        Ok(FetchRequest::post(url, json)
            .header("Content-Type", "text/plain;charset=UTF-8")
            .header("Accept", "*/*")
            .header("Origin", origin)
            .header("Referer", format!("{origin}/")))
    }
}

/// Pre-flight checks.
fn validate(payload: &RequestPayload) -> Result<()> {
    if payload.session_id.is_empty() {
        return Err(Error::validation("session_id is required"));
    }
    if payload.message_templates.is_empty() {
        return Err(Error::validation("message_templates must be a non-empty list"));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use futures_util::stream;
    use parking_lot::Mutex;
    use serde_json::{Value, json};

    use crate::page::FetchResponse;
    use crate::protocol::FrameData;

    /// Collects every frame.
    #[derive(Default)]
    struct CollectingSink {
        frames: Mutex<Vec<OutboundFrame>>,
    }

    impl FrameSink for CollectingSink {
        fn send(&self, frame: &OutboundFrame) -> bool {
            self.frames.lock().push(frame.clone());
            true
        }
    }

    impl CollectingSink {
        fn data(&self) -> Vec<FrameData> {
            self.frames.lock().iter().map(|f| f.data.clone()).collect()
        }
    }

    /// Replays a scripted response and records requests.
    struct ScriptedFetch {
        status: u16,
        chunks: Mutex<Option<Vec<Result<Vec<u8>>>>>,
        requests: Mutex<Vec<FetchRequest>>,
        state: Arc<CaptureState>,
        flag_seen: Mutex<Option<bool>>,
    }

    impl ScriptedFetch {
        fn new(state: &Arc<CaptureState>, status: u16, chunks: Vec<Result<Vec<u8>>>) -> Arc<Self> {
            Arc::new(Self {
                status,
                chunks: Mutex::new(Some(chunks)),
                requests: Mutex::new(Vec::new()),
                state: Arc::clone(state),
                flag_seen: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl Fetch for ScriptedFetch {
        async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
            *self.flag_seen.lock() = Some(self.state.bridge_call_active());
            self.requests.lock().push(request);
            let chunks = self.chunks.lock().take().unwrap_or_default();
            Ok(FetchResponse {
                status: self.status,
                body: stream::iter(chunks).boxed(),
            })
        }
    }

    fn executor(fetch: Arc<ScriptedFetch>, state: &Arc<CaptureState>) -> RequestExecutor {
        RequestExecutor::new(
            fetch,
            Arc::clone(state),
            Url::parse("https://lmarena.ai").expect("url"),
        )
    }

    fn frame(payload: Value) -> RequestFrame {
        serde_json::from_value(json!({ "request_id": "req-1", "payload": payload }))
            .expect("request frame")
    }

    fn valid_payload() -> Value {
        json!({
            "session_id": "0199aa-bb",
            "message_templates": [
                { "role": "user", "content": "hi" }
            ],
            "battle_target": "b"
        })
    }

    #[tokio::test]
    async fn test_empty_templates_rejected_without_call() {
        let state = Arc::new(CaptureState::new());
        let fetch = ScriptedFetch::new(&state, 200, vec![]);
        let sink = CollectingSink::default();

        executor(Arc::clone(&fetch), &state)
            .execute(frame(json!({ "session_id": "s", "message_templates": [] })), &sink)
            .await;

        assert!(fetch.requests.lock().is_empty());
        let data = sink.data();
        assert_eq!(data.len(), 2);
        assert_eq!(
            data[0],
            FrameData::Error("message_templates must be a non-empty list".into())
        );
        assert!(data[1].is_done());
    }

    #[tokio::test]
    async fn test_missing_session_rejected_without_call() {
        let state = Arc::new(CaptureState::new());
        let fetch = ScriptedFetch::new(&state, 200, vec![]);
        let sink = CollectingSink::default();

        executor(Arc::clone(&fetch), &state)
            .execute(
                frame(json!({ "message_templates": [{ "role": "user", "content": "x" }] })),
                &sink,
            )
            .await;

        assert!(fetch.requests.lock().is_empty());
        let data = sink.data();
        assert_eq!(data[0], FrameData::Error("session_id is required".into()));
        assert!(data[1].is_done());
    }

    #[tokio::test]
    async fn test_null_session_rejected_without_call() {
        let state = Arc::new(CaptureState::new());
        let fetch = ScriptedFetch::new(&state, 200, vec![]);
        let sink = CollectingSink::default();

        executor(Arc::clone(&fetch), &state)
            .execute(
                frame(json!({
                    "session_id": null,
                    "message_templates": [{ "role": "user", "content": "x" }]
                })),
                &sink,
            )
            .await;

        assert!(fetch.requests.lock().is_empty());
        assert_eq!(
            sink.data(),
            vec![
                FrameData::Error("session_id is required".into()),
                FrameData::Done
            ]
        );
    }

    #[test]
    fn test_reject_sends_error_then_done() {
        let state = Arc::new(CaptureState::new());
        let fetch = ScriptedFetch::new(&state, 200, vec![]);
        let sink = CollectingSink::default();

        executor(fetch, &state).reject(
            RequestId::new("req-7"),
            &Error::validation("invalid payload: missing field `role`"),
            &sink,
        );

        let frames = sink.frames.lock();
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.request_id.as_str() == "req-7"));
        assert_eq!(
            frames[0].data,
            FrameData::Error("invalid payload: missing field `role`".into())
        );
        assert!(frames[1].data.is_done());
    }

    #[tokio::test]
    async fn test_stream_relayed_for_target_then_done() {
        let state = Arc::new(CaptureState::new());
        let fetch = ScriptedFetch::new(
            &state,
            200,
            vec![
                Ok(b"a0:\"x\"\nb0:\"y\"\n".to_vec()),
                Ok(b"a0:\"only a\"\n".to_vec()),
                Ok(b"bd:{\"z\":1}\n".to_vec()),
            ],
        );
        let sink = CollectingSink::default();

        executor(Arc::clone(&fetch), &state)
            .execute(frame(valid_payload()), &sink)
            .await;

        assert_eq!(
            sink.data(),
            vec![
                FrameData::Chunk("b0:\"y\"\n".into()),
                FrameData::Chunk("bd:{\"z\":1}\n".into()),
                FrameData::Done,
            ]
        );
        assert!(sink.frames.lock().iter().all(|f| f.request_id.as_str() == "req-1"));
    }

    #[tokio::test]
    async fn test_call_shape() {
        let state = Arc::new(CaptureState::new());
        let fetch = ScriptedFetch::new(&state, 200, vec![]);
        let sink = CollectingSink::default();

        executor(Arc::clone(&fetch), &state)
            .execute(frame(valid_payload()), &sink)
            .await;

        let requests = fetch.requests.lock();
        let request = &requests[0];
        assert_eq!(
            request.url.as_str(),
            "https://lmarena.ai/nextjs-api/stream/post-to-evaluation/0199aa-bb"
        );
        assert!(
            request
                .headers
                .contains(&("Content-Type", "text/plain;charset=UTF-8".to_string()))
        );
        assert!(request.headers.contains(&("Origin", "https://lmarena.ai".to_string())));

        let body: Value =
            serde_json::from_str(request.body.as_deref().expect("body")).expect("json");
        assert_eq!(body["id"], "0199aa-bb");
        assert_eq!(body["mode"], "battle");
        assert_eq!(body["messages"][0]["evaluationSessionId"], "0199aa-bb");
    }

    #[tokio::test]
    async fn test_http_error_has_no_done() {
        let state = Arc::new(CaptureState::new());
        let fetch = ScriptedFetch::new(&state, 429, vec![Ok(b"slow down".to_vec())]);
        let sink = CollectingSink::default();

        executor(Arc::clone(&fetch), &state)
            .execute(frame(valid_payload()), &sink)
            .await;

        assert_eq!(
            sink.data(),
            vec![FrameData::Error("HTTP 429: slow down".into())]
        );
    }

    #[tokio::test]
    async fn test_read_error_mid_stream_has_no_done() {
        let state = Arc::new(CaptureState::new());
        let fetch = ScriptedFetch::new(
            &state,
            200,
            vec![Ok(b"b0:\"y\"\n".to_vec()), Err(Error::ConnectionClosed)],
        );
        let sink = CollectingSink::default();

        executor(Arc::clone(&fetch), &state)
            .execute(frame(valid_payload()), &sink)
            .await;

        let data = sink.data();
        assert_eq!(data.len(), 2);
        assert_eq!(data[0], FrameData::Chunk("b0:\"y\"\n".into()));
        assert!(data[1].is_error());
        assert!(!data.iter().any(FrameData::is_done));
    }

    #[tokio::test]
    async fn test_split_multibyte_character_decoded() {
        let state = Arc::new(CaptureState::new());
        let text = "b0:\"é\"\n".as_bytes();
        let (head, tail) = text.split_at(5);
        let fetch = ScriptedFetch::new(&state, 200, vec![Ok(head.to_vec()), Ok(tail.to_vec())]);
        let sink = CollectingSink::default();

        executor(Arc::clone(&fetch), &state)
            .execute(frame(valid_payload()), &sink)
            .await;

        let relayed: String = sink
            .data()
            .into_iter()
            .filter_map(|d| match d {
                FrameData::Chunk(c) => Some(c),
                _ => None,
            })
            .collect();
        assert!(!relayed.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_bridge_flag_held_during_call_and_released() {
        let state = Arc::new(CaptureState::new());
        let fetch = ScriptedFetch::new(&state, 500, vec![]);
        let sink = CollectingSink::default();

        executor(Arc::clone(&fetch), &state)
            .execute(frame(valid_payload()), &sink)
            .await;

        assert_eq!(*fetch.flag_seen.lock(), Some(true));
        assert!(!state.bridge_call_active());
    }
}
