//! Arena Bridge - In-context relay between a local coordinator and the arena.
//!
//! This library keeps one persistent WebSocket to a local coordinator,
//! executes the streamed evaluation calls it asks for with the session's
//! cookies, and relays one participant's side of each response back.
//!
//! # Architecture
//!
//! The bridge follows a relay model:
//!
//! - **Coordinator (local)**: Sends relay requests and control commands,
//!   receives `{request_id, data}` frames
//! - **Bridge (Rust)**: Owns the socket, the cookie jar and the capture flags
//! - **Arena (remote)**: Streams newline-delimited records from two participants
//!
//! Key design principles:
//!
//! - One socket, reconnected forever with a fixed delay
//! - Every request echoes the caller's `request_id` on every frame
//! - `[DONE]` terminates clean streams and pre-flight failures, never
//!   mid-stream failures
//! - Network traffic is observed for session capture, never altered
//!
//! # Quick Start
//!
//! ```no_run
//! use arena_bridge::{Bridge, BridgeExit, BridgeOptions, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let options = BridgeOptions::new().with_cookie_file("cookies.txt");
//!
//!     loop {
//!         let bridge = Bridge::builder().options(options.clone()).build()?;
//!         let BridgeExit::Reload(command) = bridge.run().await;
//!         println!("Reloading after {command}");
//!     }
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | [`Bridge`], builder, options, executor, dispatcher |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers and message ID generation |
//! | [`page`] | Network primitive, cookies, session capture |
//! | [`protocol`] | Coordinator frames and the evaluation body |
//! | [`stream`] | UTF-8 decoding and participant demultiplexing |
//! | [`transport`] | WebSocket connection and supervision |

// ============================================================================
// Modules
// ============================================================================

/// Bridge lifecycle, configuration and request handling.
///
/// Use [`Bridge::builder()`] to create a configured bridge.
pub mod bridge;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing request, session and message IDs.
pub mod identifiers;

/// The in-context browsing surface.
///
/// Network primitive, session cookies and the capture interceptor.
pub mod page;

/// Coordinator frame types and the evaluation request body.
pub mod protocol;

/// Response stream processing.
pub mod stream;

/// WebSocket transport layer.
///
/// Internal module handling the coordinator connection and reconnection.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::{Bridge, BridgeBuilder, BridgeExit, BridgeOptions};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{MessageId, RequestId, SessionId};

// Page types
pub use page::{CaptureState, Cookie, Fetch, FetchRequest, FetchResponse, Reporter};

// Protocol types
pub use protocol::{ControlCommand, OutboundFrame, Participant};

// Transport types
pub use transport::ConnectionState;
