//! Inbound and outbound frame envelopes.
//!
//! # Inbound
//!
//! Control:
//! ```json
//! { "command": "activate_id_capture" }
//! ```
//!
//! Request:
//! ```json
//! {
//!   "request_id": "opaque",
//!   "payload": { "session_id": "...", "message_templates": [ ... ] }
//! }
//! ```
//!
//! # Outbound
//!
//! ```json
//! { "request_id": "opaque", "data": "b0:\"hi\"\n" }
//! { "request_id": "opaque", "data": "[DONE]" }
//! { "request_id": "opaque", "data": { "error": "message" } }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::RequestId;

use super::command::ControlCommand;
use super::payload::RequestPayload;

// ============================================================================
// Constants
// ============================================================================

/// Literal terminal sentinel for a request.
pub const DONE_SENTINEL: &str = "[DONE]";

// ============================================================================
// InboundFrame
// ============================================================================

/// A frame received from the coordinator.
#[derive(Debug, Clone)]
pub enum InboundFrame {
    /// Control frame (has a `command` key).
    Control(ControlCommand),
    /// Request frame.
    Request(RequestFrame),
    /// Request frame whose payload could not be read.
    ///
    /// The request is still answered, with an error then `[DONE]`.
    Rejected {
        /// Correlation identifier of the rejected request.
        request_id: RequestId,
        /// Why the payload was refused.
        reason: String,
    },
}

impl InboundFrame {
    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the text is not JSON
    /// - [`Error::Protocol`] if the frame is not an object, or a request frame
    ///   lacks a string `request_id` or an object `payload`
    ///
    /// Once `request_id` and `payload` are present, a payload that does not
    /// deserialize yields [`InboundFrame::Rejected`] instead of an error.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut object) = value else {
            return Err(Error::protocol("frame is not a JSON object"));
        };

        if let Some(command) = object.get("command") {
            let name = command
                .as_str()
                .ok_or_else(|| Error::protocol("command must be a string"))?;
            return Ok(Self::Control(ControlCommand::parse(name)));
        }

        let request_id = match object.remove("request_id") {
            Some(Value::String(id)) => RequestId::new(id),
            _ => return Err(Error::protocol("missing request_id")),
        };

        let payload = match object.remove("payload") {
            Some(payload @ Value::Object(_)) => payload,
            _ => return Err(Error::protocol("missing payload")),
        };

        match serde_json::from_value(payload) {
            Ok(payload) => Ok(Self::Request(RequestFrame {
                request_id,
                payload,
            })),
            Err(e) => Ok(Self::Rejected {
                request_id,
                reason: format!("invalid payload: {e}"),
            }),
        }
    }
}

// ============================================================================
// RequestFrame
// ============================================================================

/// A chat request to relay.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestFrame {
    /// Caller-supplied correlation identifier.
    pub request_id: RequestId,

    /// Request payload.
    pub payload: RequestPayload,
}

// ============================================================================
// OutboundFrame
// ============================================================================

/// A frame sent to the coordinator, always correlated by request ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundFrame {
    /// Echoed correlation identifier.
    pub request_id: RequestId,

    /// Frame content.
    pub data: FrameData,
}

impl OutboundFrame {
    /// Creates a chunk frame.
    #[inline]
    #[must_use]
    pub fn chunk(request_id: RequestId, text: impl Into<String>) -> Self {
        Self {
            request_id,
            data: FrameData::Chunk(text.into()),
        }
    }

    /// Creates a `[DONE]` frame.
    #[inline]
    #[must_use]
    pub fn done(request_id: RequestId) -> Self {
        Self {
            request_id,
            data: FrameData::Done,
        }
    }

    /// Creates an error frame.
    #[inline]
    #[must_use]
    pub fn error(request_id: RequestId, message: impl Into<String>) -> Self {
        Self {
            request_id,
            data: FrameData::Error(message.into()),
        }
    }

    /// Serializes the frame to JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// FrameData
// ============================================================================

/// Content of an outbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameData {
    /// Filtered raw text.
    Chunk(String),
    /// Terminal sentinel.
    Done,
    /// Error, serialized as `{"error": message}`.
    Error(String),
}

impl FrameData {
    /// Returns `true` for the terminal sentinel.
    #[inline]
    #[must_use]
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Returns `true` for an error.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl Serialize for FrameData {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Chunk(text) => serializer.serialize_str(text),
            Self::Done => serializer.serialize_str(DONE_SENTINEL),
            Self::Error(message) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("error", message)?;
                map.end()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
