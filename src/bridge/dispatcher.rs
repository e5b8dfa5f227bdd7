//! Command dispatcher.
//!
//! Maps each [`ControlCommand`] to its effect. Commands are fire-and-forget:
//! nothing is ever sent back to the coordinator.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::page::{CaptureState, Fetch, FetchRequest, Reporter};
use crate::protocol::ControlCommand;

// ============================================================================
// Dispatch
// ============================================================================

/// What the bridge does after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Keep running.
    Continue,
    /// Tear down and restart from `Disconnected`.
    Reload(ControlCommand),
}

// ============================================================================
// CommandDispatcher
// ============================================================================

/// Handles control frames.
pub struct CommandDispatcher {
    /// Intercepted network primitive, for page-originated calls.
    fetch: Arc<dyn Fetch>,
    /// Shared capture flags.
    state: Arc<CaptureState>,
    /// Local collaborator endpoints.
    reporter: Arc<dyn Reporter>,
    /// Page whose markup is pushed on `send_page_source`.
    page_url: Url,
}

impl CommandDispatcher {
    /// Creates a dispatcher.
    pub fn new(
        fetch: Arc<dyn Fetch>,
        state: Arc<CaptureState>,
        reporter: Arc<dyn Reporter>,
        page_url: Url,
    ) -> Self {
        Self {
            fetch,
            state,
            reporter,
            page_url,
        }
    }

    /// Applies a command.
    ///
    /// `send_page_source` runs in the background; its outcome is only logged.
    pub fn dispatch(self: &Arc<Self>, command: ControlCommand) -> Dispatch {
        info!(command = %command, "Command received");

        match command {
            ControlCommand::Refresh | ControlCommand::Reconnect => Dispatch::Reload(command),

            ControlCommand::ActivateIdCapture => {
                self.state.arm();
                info!("Session capture armed");
                Dispatch::Continue
            }

            ControlCommand::SendPageSource => {
                let dispatcher = Arc::clone(self);
                tokio::spawn(async move {
                    match dispatcher.send_page_source().await {
                        Ok(bytes) => info!(bytes, "Page source pushed"),
                        Err(e) => warn!(error = %e, "Page source push failed"),
                    }
                });
                Dispatch::Continue
            }

            ControlCommand::Unknown(name) => {
                warn!(command = %name, "Unknown command ignored");
                Dispatch::Continue
            }
        }
    }

    /// Fetches the page markup and pushes it for model discovery.
    ///
    /// Returns the number of bytes pushed.
    pub async fn send_page_source(&self) -> Result<usize> {
        debug!(url = %self.page_url, "Fetching page source");

        let response = self.fetch.fetch(FetchRequest::get(self.page_url.clone())).await?;
        if !response.is_success() {
            let status = response.status;
            let text = response.text().await.unwrap_or_default();
            return Err(Error::http_status(status, &text));
        }

        let html = response.text().await?;
        let bytes = html.len();
        self.reporter.push_page_source(html).await?;
        Ok(bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
