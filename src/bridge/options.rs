//! Bridge configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use arena_bridge::BridgeOptions;
//!
//! let options = BridgeOptions::new()
//!     .with_coordinator_url("ws://127.0.0.1:5102/ws")
//!     .with_reconnect_delay(Duration::from_secs(5))
//!     .with_cookie_file("cookies.txt");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;
use crate::page::Cookie;

// ============================================================================
// Constants
// ============================================================================

/// Default coordinator socket.
pub const DEFAULT_COORDINATOR_URL: &str = "ws://127.0.0.1:5102/ws";

/// Default delay between a disconnect and the next attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5000);

/// Default arena origin.
pub const DEFAULT_ARENA_BASE_URL: &str = "https://lmarena.ai";

/// Default capture endpoint.
pub const DEFAULT_CAPTURE_ENDPOINT: &str = "http://127.0.0.1:5103/update";

/// Default model-discovery endpoint.
pub const DEFAULT_MODEL_DISCOVERY_ENDPOINT: &str =
    "http://127.0.0.1:5102/internal/update_available_models";

/// Default connect and read timeout for evaluation calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(360);

/// Default user agent.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

// ============================================================================
// BridgeOptions
// ============================================================================

/// Every tunable of the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeOptions {
    /// Coordinator socket URL (`ws` or `wss`).
    pub coordinator_url: String,

    /// Fixed delay before each reconnect attempt.
    pub reconnect_delay: Duration,

    /// Arena origin used for evaluation calls and the page source.
    pub arena_base_url: String,

    /// Endpoint receiving captured session identifiers.
    pub capture_endpoint: String,

    /// Endpoint receiving page markup.
    pub model_discovery_endpoint: String,

    /// Connect timeout, and limit on each wait for body bytes.
    pub request_timeout: Duration,

    /// User agent of the browsing context.
    pub user_agent: String,

    /// Session cookies.
    pub cookies: Vec<Cookie>,

    /// Optional cookie header file, re-read before every call.
    pub cookie_file: Option<PathBuf>,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl BridgeOptions {
    /// Creates options with the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            coordinator_url: DEFAULT_COORDINATOR_URL.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            arena_base_url: DEFAULT_ARENA_BASE_URL.to_string(),
            capture_endpoint: DEFAULT_CAPTURE_ENDPOINT.to_string(),
            model_discovery_endpoint: DEFAULT_MODEL_DISCOVERY_ENDPOINT.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cookies: Vec::new(),
            cookie_file: None,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl BridgeOptions {
    /// Sets the coordinator socket URL.
    #[inline]
    #[must_use]
    pub fn with_coordinator_url(mut self, url: impl Into<String>) -> Self {
        self.coordinator_url = url.into();
        self
    }

    /// Sets the reconnect delay.
    #[inline]
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the arena origin.
    #[inline]
    #[must_use]
    pub fn with_arena_base_url(mut self, url: impl Into<String>) -> Self {
        self.arena_base_url = url.into();
        self
    }

    /// Sets the capture endpoint.
    #[inline]
    #[must_use]
    pub fn with_capture_endpoint(mut self, url: impl Into<String>) -> Self {
        self.capture_endpoint = url.into();
        self
    }

    /// Sets the model-discovery endpoint.
    #[inline]
    #[must_use]
    pub fn with_model_discovery_endpoint(mut self, url: impl Into<String>) -> Self {
        self.model_discovery_endpoint = url.into();
        self
    }

    /// Sets the evaluation call timeout.
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the user agent.
    #[inline]
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Adds a session cookie.
    #[inline]
    #[must_use]
    pub fn with_cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    /// Adds multiple session cookies.
    #[inline]
    #[must_use]
    pub fn with_cookies(mut self, cookies: impl IntoIterator<Item = Cookie>) -> Self {
        self.cookies.extend(cookies);
        self
    }

    /// Sets the cookie file.
    #[inline]
    #[must_use]
    pub fn with_cookie_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.cookie_file = Some(path.into());
        self
    }
}

// ============================================================================
// Cookie Loading
// ============================================================================

impl BridgeOptions {
    /// Returns the explicit cookies followed by those in the cookie file.
    ///
    /// A cookie in the file overrides an explicit one of the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the cookie file cannot be read or parsed.
    pub fn load_cookies(&self) -> Result<Vec<Cookie>> {
        let mut cookies = self.cookies.clone();

        if let Some(path) = &self.cookie_file {
            for cookie in Cookie::load_file(path)? {
                cookies.retain(|c| c.name != cookie.name);
                cookies.push(cookie);
            }
        }

        Ok(cookies)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use tempfile::NamedTempFile;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_defaults() {
        let options = BridgeOptions::default();
        assert_eq!(options.coordinator_url, "ws://127.0.0.1:5102/ws");
        assert_eq!(options.reconnect_delay, Duration::from_millis(5000));
        assert_eq!(options.arena_base_url, "https://lmarena.ai");
        assert_eq!(options.capture_endpoint, "http://127.0.0.1:5103/update");
        assert_eq!(options.request_timeout, Duration::from_secs(360));
        assert!(options.cookies.is_empty());
        assert!(options.cookie_file.is_none());
    }

    #[test]
    fn test_builder_chain() {
        let options = BridgeOptions::new()
            .with_coordinator_url("ws://localhost:9000/ws")
            .with_reconnect_delay(Duration::from_millis(100))
            .with_cookie(Cookie::new("a", "1"))
            .with_cookies([Cookie::new("b", "2")]);

        assert_eq!(options.coordinator_url, "ws://localhost:9000/ws");
        assert_eq!(options.reconnect_delay, Duration::from_millis(100));
        assert_eq!(options.cookies.len(), 2);
    }

    #[test]
    fn test_load_cookies_merges_file() {
        let mut file = NamedTempFile::new().expect("temp file");
        write!(file, "a=from-file; c=3").expect("write");

        let options = BridgeOptions::new()
            .with_cookies([Cookie::new("a", "1"), Cookie::new("b", "2")])
            .with_cookie_file(file.path());

        let cookies = assert_ok!(options.load_cookies());
        assert_eq!(
            cookies,
            vec![
                Cookie::new("b", "2"),
                Cookie::new("a", "from-file"),
                Cookie::new("c", "3"),
            ]
        );
    }

    #[test]
    fn test_load_cookies_missing_file_fails() {
        let options = BridgeOptions::new().with_cookie_file("/nonexistent/cookies.txt");
        assert_err!(options.load_cookies());
    }
}
