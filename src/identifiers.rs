//! Type-safe identifiers for protocol entities.
//!
//! | Type | Origin | Format |
//! |------|--------|--------|
//! | [`RequestId`] | Coordinator (echoed, never generated) | opaque string |
//! | [`SessionId`] | Coordinator / capture interceptor | opaque string |
//! | [`MessageId`] | Bridge, per request | time-ordered UUIDv7 |
//!
//! [`MessageId::generate`] is the identifier generator: 128-bit, ordered by
//! creation instant across the process, random low-order bits. The random
//! source is the operating system; if it is unavailable the process aborts,
//! since no request can be built without identifiers.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// RequestId
// ============================================================================

/// Correlation identifier supplied by the coordinator.
///
/// Echoed verbatim on every outbound frame of the request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Wraps a caller-supplied identifier.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SessionId
// ============================================================================

/// Evaluation session identifier.
///
/// Parameterizes the evaluation endpoint path and is the value the capture
/// interceptor extracts from retry URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps a session identifier.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns `true` if the identifier is empty or whitespace.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Returns the identifier as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// MessageId
// ============================================================================

/// Bridge-generated identifier for messages and participant slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Generates a new time-ordered identifier.
    ///
    /// Identifiers produced by one process sort in creation order.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
