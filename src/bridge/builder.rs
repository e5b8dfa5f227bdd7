//! Builder pattern for bridge configuration.
//!
//! Provides a fluent API for validating [`BridgeOptions`] and creating
//! [`Bridge`] instances.
//!
//! # Example
//!
//! ```no_run
//! use arena_bridge::{Bridge, BridgeOptions};
//!
//! # fn example() -> arena_bridge::Result<()> {
//! let bridge = Bridge::builder()
//!     .options(BridgeOptions::new().with_cookie_file("cookies.txt"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::page::{Fetch, HttpFetch, HttpReporter, Reporter};

use super::core::Bridge;
use super::options::BridgeOptions;

// ============================================================================
// BridgeBuilder
// ============================================================================

/// Builder for configuring a [`Bridge`] instance.
///
/// Use [`Bridge::builder()`] to create a new builder.
#[derive(Default, Clone)]
pub struct BridgeBuilder {
    /// Options to validate.
    options: BridgeOptions,
    /// Network primitive override.
    fetch: Option<Arc<dyn Fetch>>,
    /// Collaborator endpoint override.
    reporter: Option<Arc<dyn Reporter>>,
}

impl fmt::Debug for BridgeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeBuilder")
            .field("options", &self.options)
            .field("custom_fetch", &self.fetch.is_some())
            .field("custom_reporter", &self.reporter.is_some())
            .finish()
    }
}

// ============================================================================
// BridgeBuilder Implementation
// ============================================================================

impl BridgeBuilder {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets all options at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: BridgeOptions) -> Self {
        self.options = options;
        self
    }

    /// Replaces the cookie-carrying HTTP client with a custom primitive.
    ///
    /// Cookies in the options are not loaded when a custom primitive is set.
    #[inline]
    #[must_use]
    pub fn fetch(mut self, fetch: impl Fetch + 'static) -> Self {
        self.fetch = Some(Arc::new(fetch));
        self
    }

    /// Replaces the HTTP collaborator endpoints.
    #[inline]
    #[must_use]
    pub fn reporter(mut self, reporter: impl Reporter + 'static) -> Self {
        self.reporter = Some(Arc::new(reporter));
        self
    }

    /// Builds the bridge with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if a URL is invalid or has the wrong scheme
    /// - [`Error::Config`] if the reconnect delay is zero
    /// - [`Error::Io`] / [`Error::Config`] if the cookie file cannot be used
    /// - [`Error::Http`] if the HTTP client cannot be built
    pub fn build(self) -> Result<Bridge> {
        let options = &self.options;

        let coordinator_url =
            validate_url("coordinator_url", &options.coordinator_url, &["ws", "wss"])?;
        let arena_base_url =
            validate_url("arena_base_url", &options.arena_base_url, &["http", "https"])?;
        let capture_endpoint =
            validate_url("capture_endpoint", &options.capture_endpoint, &["http", "https"])?;
        let model_discovery_endpoint = validate_url(
            "model_discovery_endpoint",
            &options.model_discovery_endpoint,
            &["http", "https"],
        )?;

        if options.reconnect_delay.is_zero() {
            return Err(Error::config("reconnect_delay must be greater than zero"));
        }

        let fetch = match self.fetch {
            Some(fetch) => fetch,
            None => {
                let cookies = options.load_cookies()?;
                if cookies.is_empty() {
                    warn!("No session cookies configured, evaluation calls will be anonymous");
                } else {
                    info!(count = cookies.len(), "Session cookies loaded");
                }
                let mut fetch = HttpFetch::new(
                    &arena_base_url,
                    &cookies,
                    &options.user_agent,
                    options.request_timeout,
                )?;
                if let Some(path) = &options.cookie_file {
                    fetch = fetch.watch_cookie_file(path.clone());
                }
                Arc::new(fetch) as Arc<dyn Fetch>
            }
        };

        let reporter = self.reporter.unwrap_or_else(|| {
            Arc::new(HttpReporter::new(capture_endpoint, model_discovery_endpoint))
        });

        Ok(Bridge::new(
            coordinator_url,
            options.reconnect_delay,
            arena_base_url,
            fetch,
            reporter,
        ))
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Parses `raw` and checks its scheme.
fn validate_url(field: &str, raw: &str, schemes: &[&str]) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| Error::config(format!("{field} is not a valid URL ({raw}): {e}")))?;

    if !schemes.contains(&url.scheme()) {
        return Err(Error::config(format!(
            "{field} must use one of [{}], got: {raw}",
            schemes.join(", ")
        )));
    }

    Ok(url)
}

// ============================================================================
// Tests
// ============================================================================
