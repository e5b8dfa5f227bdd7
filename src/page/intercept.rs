//! Session capture interceptor.
//!
//! [`InterceptedFetch`] decorates the page's [`Fetch`] primitive. Every call
//! is forwarded to the wrapped implementation untouched; the decorator only
//! looks at the URL. When capture mode is armed and a page call (not one
//! issued by the bridge) hits the retry-evaluation path, the session
//! identifier is taken from the URL, capture mode is disarmed, and the
//! identifier is reported to the local capture endpoint in the background.
//!
//! # Process-wide State
//!
//! [`CaptureState`] holds the two flags shared by every request task:
//!
//! | Flag | Set by | Cleared by |
//! |------|--------|------------|
//! | capture mode | `activate_id_capture` | first matching page call |
//! | bridge call in flight | executor, per request | [`BridgeCallGuard`] drop |
//!
//! Capture mode is disarmed with a compare-and-swap, so at most one call wins
//! per arming even under real parallelism. The bridge-call flag is a counter:
//! overlapping requests each hold a guard and the flag reads as set until the
//! last one finishes. While any bridge request is in flight, page calls are
//! not capture-eligible either.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Result;
use crate::identifiers::SessionId;

use super::fetch::{Fetch, FetchRequest, FetchResponse};
use super::reporter::Reporter;

// ============================================================================
// Constants
// ============================================================================

/// Retry-evaluation path: session identifier, then message identifier.
static RETRY_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/stream/retry-evaluation-session-message/([a-f0-9-]+)/messages/([a-f0-9-]+)")
        .unwrap_or_else(|e| unreachable!("retry path pattern is valid: {e}"))
});

// ============================================================================
// CaptureState
// ============================================================================

/// Capture mode and the bridge-origination flag.
#[derive(Debug, Default)]
pub struct CaptureState {
    /// Capture mode.
    armed: AtomicBool,
    /// Number of bridge requests currently issuing or streaming.
    bridge_calls: AtomicUsize,
}

impl CaptureState {
    /// Creates disarmed state with no bridge call in flight.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms capture mode.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Returns `true` if capture mode is armed.
    #[inline]
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Disarms capture mode.
    ///
    /// Returns `true` only for the caller that observed it armed.
    pub fn disarm(&self) -> bool {
        self.armed
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Marks a bridge request as in flight until the guard is dropped.
    #[must_use = "the flag is cleared when the guard drops"]
    pub fn begin_bridge_call(self: &Arc<Self>) -> BridgeCallGuard {
        self.bridge_calls.fetch_add(1, Ordering::SeqCst);
        BridgeCallGuard {
            state: Arc::clone(self),
        }
    }

    /// Returns `true` while any bridge request is in flight.
    #[inline]
    #[must_use]
    pub fn bridge_call_active(&self) -> bool {
        self.bridge_calls.load(Ordering::SeqCst) > 0
    }
}

// ============================================================================
// BridgeCallGuard
// ============================================================================

/// Holds the bridge-origination flag for one request.
#[derive(Debug)]
pub struct BridgeCallGuard {
    state: Arc<CaptureState>,
}

impl Drop for BridgeCallGuard {
    fn drop(&mut self) {
        self.state.bridge_calls.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// RetryUrlMatcher
// ============================================================================

/// Recognises retry-evaluation URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RetryUrlMatcher;

impl RetryUrlMatcher {
    /// Extracts the session identifier from a retry-evaluation URL.
    #[must_use]
    pub fn session_id(&self, url: &Url) -> Option<SessionId> {
        RETRY_PATH
            .captures(url.path())
            .and_then(|captures| captures.get(1))
            .map(|m| SessionId::new(m.as_str()))
    }
}

// ============================================================================
// InterceptedFetch
// ============================================================================

/// [`Fetch`] decorator that observes page calls for session capture.
pub struct InterceptedFetch<F> {
    /// Wrapped primitive.
    inner: F,
    /// Shared flags.
    state: Arc<CaptureState>,
    /// URL matcher.
    matcher: RetryUrlMatcher,
    /// Capture endpoint client.
    reporter: Arc<dyn Reporter>,
}

impl<F: Fetch> InterceptedFetch<F> {
    /// Wraps a primitive.
    pub fn new(inner: F, state: Arc<CaptureState>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            inner,
            state,
            matcher: RetryUrlMatcher,
            reporter,
        }
    }

    /// Returns the shared flags.
    #[inline]
    #[must_use]
    pub fn state(&self) -> &Arc<CaptureState> {
        &self.state
    }

    /// Inspects a call URL, capturing the session identifier when eligible.
    ///
    /// Returns the captured identifier, if this call won the capture.
    pub fn observe(&self, url: &Url) -> Option<SessionId> {
        if !self.state.is_armed() {
            return None;
        }
        if self.state.bridge_call_active() {
            debug!(url = %url, "Skipping bridge-initiated call");
            return None;
        }

        let session_id = self.matcher.session_id(url)?;
        if !self.state.disarm() {
            return None;
        }

        info!(session_id = %session_id, "Captured session identifier, capture disarmed");

        let reporter = Arc::clone(&self.reporter);
        let reported = session_id.clone();
        tokio::spawn(async move {
            match reporter.report_session_id(&reported).await {
                Ok(()) => info!(session_id = %reported, "Session identifier delivered"),
                Err(e) => {
                    warn!(session_id = %reported, error = %e, "Session identifier delivery failed");
                }
            }
        });

        Some(session_id)
    }
}

#[async_trait]
impl<F: Fetch> Fetch for InterceptedFetch<F> {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        self.observe(&request.url);
        self.inner.fetch(request).await
    }
}

// ============================================================================
// Tests
// ============================================================================
