//! Bridge module.
//!
//! This module is the main entry point: it turns coordinator frames into
//! arena calls and relays the results back.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Bridge`] | Frame routing and lifecycle |
//! | [`BridgeBuilder`] | Validating builder |
//! | [`BridgeOptions`] | Every tunable |
//! | [`RequestExecutor`] | One relay request, start to terminal frame |
//! | [`CommandDispatcher`] | Control frame effects |

// ============================================================================
// Submodules
// ============================================================================

/// Validating builder.
pub mod builder;

/// Frame routing and lifecycle.
pub mod core;

/// Control frame effects.
pub mod dispatcher;

/// Relay request execution.
pub mod executor;

/// Bridge configuration.
pub mod options;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::BridgeBuilder;
pub use core::{Bridge, BridgeExit};
pub use dispatcher::{CommandDispatcher, Dispatch};
pub use executor::{FrameSink, RequestExecutor};
pub use options::BridgeOptions;
