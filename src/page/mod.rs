//! The in-context browsing surface.
//!
//! Everything the bridge does on the network goes through one primitive,
//! [`Fetch`], which carries the session cookies of the arena. The capture
//! interceptor wraps that primitive to watch page traffic without altering it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐      ┌──────────────────┐      ┌────────────┐
//! │ Executor /   │─────►│ InterceptedFetch │─────►│ HttpFetch  │──► arena
//! │ Dispatcher   │      │ (observe URL)    │      │ (cookies)  │
//! └──────────────┘      └────────┬─────────┘      └────────────┘
//!                                │ session id (once per arming)
//!                                ▼
//!                         Reporter ──► local capture endpoint
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `cookies` | Session cookies and cookie jar |
//! | `fetch` | Network primitive trait and HTTP implementation |
//! | `intercept` | Session capture interceptor |
//! | `reporter` | Local collaborator endpoints |

// ============================================================================
// Submodules
// ============================================================================

/// Session cookies.
pub mod cookies;

/// Network primitive.
pub mod fetch;

/// Session capture interceptor.
pub mod intercept;

/// Local collaborator endpoints.
pub mod reporter;

// ============================================================================
// Re-exports
// ============================================================================

pub use cookies::Cookie;
pub use fetch::{BodyStream, Fetch, FetchRequest, FetchResponse, HttpFetch};
pub use intercept::{BridgeCallGuard, CaptureState, InterceptedFetch, RetryUrlMatcher};
pub use reporter::{HttpReporter, Reporter};
