//! Coordinator socket protocol message types.
//!
//! This module defines the frames exchanged with the local coordinator
//! over the persistent WebSocket.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `ControlFrame` | Coordinator → Bridge | Fire-and-forget command |
//! | `RequestFrame` | Coordinator → Bridge | Chat request to relay |
//! | `OutboundFrame` | Bridge → Coordinator | Chunk, `[DONE]` or error |
//!
//! Inbound frames are discriminated by the presence of a `command` key.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Control commands |
//! | `frame` | Inbound and outbound frame envelopes |
//! | `payload` | Request payload and evaluation body |

// ============================================================================
// Submodules
// ============================================================================

/// Control commands.
pub mod command;

/// Inbound and outbound frame envelopes.
pub mod frame;

/// Request payload and evaluation body construction.
pub mod payload;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::ControlCommand;
pub use frame::{DONE_SENTINEL, FrameData, InboundFrame, OutboundFrame, RequestFrame};
pub use payload::{EvaluationBody, EvaluationMessage, MessageTemplate, Participant, RequestPayload};
