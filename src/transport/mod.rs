//! WebSocket transport layer.
//!
//! This module owns the single persistent socket to the local coordinator.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Bridge (Rust)  │                              │  Coordinator    │
//! │                 │         WebSocket            │  (local)        │
//! │  Supervisor     │─────────────────────────────►│                 │
//! │  → Connection   │      127.0.0.1:5102/ws       │  WebSocket      │
//! │                 │                              │  Server         │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! ```text
//! Disconnected ──► Connecting ──► Open
//!      ▲               │            │
//!      └───────────────┴────────────┘  (failure, close or error)
//!      └── fixed delay, then Connecting again, forever
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | One socket session and its event loop |
//! | `supervisor` | Lifecycle, reconnection and the send path |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket connection and event loop.
pub mod connection;

/// Connection supervision and reconnection.
pub mod supervisor;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connection, FrameHandler};
pub use supervisor::{ConnectionState, FrameSender, Supervisor};
