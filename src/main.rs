//! Command-line entry point.
//!
//! Parses options, installs logging, then runs the bridge in a loop: every
//! `refresh` / `reconnect` command rebuilds it from scratch. Ctrl+C exits.

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use arena_bridge::bridge::options::{
    DEFAULT_ARENA_BASE_URL, DEFAULT_CAPTURE_ENDPOINT, DEFAULT_COORDINATOR_URL,
    DEFAULT_MODEL_DISCOVERY_ENDPOINT, DEFAULT_USER_AGENT,
};
use arena_bridge::{Bridge, BridgeExit, BridgeOptions, Cookie, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Types
// ============================================================================

/// Relay between a local coordinator and the arena.
#[derive(Debug, Parser)]
#[command(name = "arena-bridge", version, about)]
struct Args {
    /// Coordinator WebSocket URL.
    #[arg(long, env = "ARENA_BRIDGE_COORDINATOR_URL", default_value = DEFAULT_COORDINATOR_URL)]
    coordinator_url: String,

    /// Delay before each reconnect attempt, in milliseconds.
    #[arg(long, env = "ARENA_BRIDGE_RECONNECT_DELAY_MS", default_value_t = 5000)]
    reconnect_delay_ms: u64,

    /// Arena origin.
    #[arg(long, env = "ARENA_BRIDGE_ARENA_BASE_URL", default_value = DEFAULT_ARENA_BASE_URL)]
    arena_base_url: String,

    /// Endpoint receiving captured session identifiers.
    #[arg(long, env = "ARENA_BRIDGE_CAPTURE_ENDPOINT", default_value = DEFAULT_CAPTURE_ENDPOINT)]
    capture_endpoint: String,

    /// Endpoint receiving page markup.
    #[arg(
        long,
        env = "ARENA_BRIDGE_MODEL_DISCOVERY_ENDPOINT",
        default_value = DEFAULT_MODEL_DISCOVERY_ENDPOINT
    )]
    model_discovery_endpoint: String,

    /// Connect and read timeout for evaluation calls, in seconds.
    #[arg(long, env = "ARENA_BRIDGE_REQUEST_TIMEOUT_SECS", default_value_t = 360)]
    request_timeout_secs: u64,

    /// User agent.
    #[arg(long, env = "ARENA_BRIDGE_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// Session cookies as a `name=value; name2=value2` header.
    #[arg(long, env = "ARENA_BRIDGE_COOKIES")]
    cookies: Option<String>,

    /// File holding a cookie header, re-read before every call.
    #[arg(long, env = "ARENA_BRIDGE_COOKIE_FILE")]
    cookie_file: Option<PathBuf>,

    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(long)]
    debug: bool,
}

impl Args {
    fn into_options(self) -> Result<BridgeOptions> {
        let cookies = match self.cookies.as_deref() {
            Some(header) => Cookie::parse_header(header)?,
            None => Vec::new(),
        };

        let mut options = BridgeOptions::new()
            .with_coordinator_url(self.coordinator_url)
            .with_reconnect_delay(Duration::from_millis(self.reconnect_delay_ms))
            .with_arena_base_url(self.arena_base_url)
            .with_capture_endpoint(self.capture_endpoint)
            .with_model_discovery_endpoint(self.model_discovery_endpoint)
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_user_agent(self.user_agent)
            .with_cookies(cookies);

        if let Some(path) = self.cookie_file {
            options = options.with_cookie_file(path);
        }

        Ok(options)
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
fn init_logging(debug: bool) {
    let default = if debug {
        "arena_bridge=debug,info"
    } else {
        "arena_bridge=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Runs bridges until Ctrl+C.
async fn run(options: BridgeOptions) -> Result<()> {
    let mut generation: u64 = 0;

    loop {
        generation += 1;
        let bridge = Bridge::builder().options(options.clone()).build()?;
        info!(generation, coordinator = %options.coordinator_url, "Bridge started");

        tokio::select! {
            exit = bridge.run() => {
                let BridgeExit::Reload(command) = exit;
                info!(generation, command = %command, "Bridge reloading");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down");
                return Ok(());
            }
        }
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug);

    let options = args.into_options()?;
    run(options).await
}
