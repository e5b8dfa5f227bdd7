//! Control commands sent by the coordinator.
//!
//! | Command | Effect |
//! |---------|--------|
//! | `refresh` | Reload the bridge from a clean state |
//! | `reconnect` | Same as `refresh` |
//! | `activate_id_capture` | Arm session-identifier capture |
//! | `send_page_source` | Push page markup to model discovery |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// ControlCommand
// ============================================================================

/// A command carried by a control frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Reload the hosting page.
    Refresh,
    /// Reload the hosting page (alias kept by the coordinator).
    Reconnect,
    /// Arm capture mode.
    ActivateIdCapture,
    /// Push the current page markup.
    SendPageSource,
    /// Unrecognized command name.
    Unknown(String),
}

impl ControlCommand {
    /// Parses a command name.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name {
            "refresh" => Self::Refresh,
            "reconnect" => Self::Reconnect,
            "activate_id_capture" => Self::ActivateIdCapture,
            "send_page_source" => Self::SendPageSource,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Refresh => "refresh",
            Self::Reconnect => "reconnect",
            Self::ActivateIdCapture => "activate_id_capture",
            Self::SendPageSource => "send_page_source",
            Self::Unknown(name) => name,
        };
        f.write_str(name)
    }
}

// ============================================================================
// Tests
// ============================================================================
