//! Local collaborator endpoints.
//!
//! Two local HTTP endpoints sit outside the bridge:
//!
//! | Endpoint | Receives |
//! |----------|----------|
//! | capture | `POST {"sessionId": "..."}` after a capture |
//! | model discovery | `POST` of raw page markup |
//!
//! Both are fire-and-forget: one attempt, failures are the caller's to log.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::Result;
use crate::identifiers::SessionId;

// ============================================================================
// Reporter
// ============================================================================

/// Out-of-band delivery to the local collaborator endpoints.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Delivers a captured session identifier.
    async fn report_session_id(&self, session_id: &SessionId) -> Result<()>;

    /// Pushes page markup for model discovery.
    async fn push_page_source(&self, html: String) -> Result<()>;
}

// ============================================================================
// HttpReporter
// ============================================================================

/// [`Reporter`] that posts to local HTTP endpoints.
#[derive(Debug, Clone)]
pub struct HttpReporter {
    client: Client,
    capture_endpoint: Url,
    model_discovery_endpoint: Url,
}

impl HttpReporter {
    /// Creates a reporter for the given endpoints.
    #[must_use]
    pub fn new(capture_endpoint: Url, model_discovery_endpoint: Url) -> Self {
        Self {
            client: Client::new(),
            capture_endpoint,
            model_discovery_endpoint,
        }
    }
}

#[async_trait]
impl Reporter for HttpReporter {
    async fn report_session_id(&self, session_id: &SessionId) -> Result<()> {
        debug!(endpoint = %self.capture_endpoint, "Posting captured session identifier");

        self.client
            .post(self.capture_endpoint.clone())
            .json(&json!({ "sessionId": session_id }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn push_page_source(&self, html: String) -> Result<()> {
        debug!(
            endpoint = %self.model_discovery_endpoint,
            bytes = html.len(),
            "Pushing page source"
        );

        self.client
            .post(self.model_discovery_endpoint.clone())
            .header(CONTENT_TYPE, "text/html; charset=utf-8")
            .body(html)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
