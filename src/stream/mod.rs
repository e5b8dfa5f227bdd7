//! Response stream processing.
//!
//! The evaluation endpoint streams newline-delimited records from two
//! participants interleaved in one body. This module turns raw body bytes
//! into text and keeps only the records of one participant.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `decoder` | Incremental UTF-8 decoding of body reads |
//! | `demux` | Per-chunk participant filtering |

// ============================================================================
// Submodules
// ============================================================================

/// Incremental UTF-8 decoder.
pub mod decoder;

/// Participant demultiplexer.
pub mod demux;

// ============================================================================
// Re-exports
// ============================================================================

pub use decoder::Utf8Decoder;
pub use demux::{RecordKind, demultiplex};
