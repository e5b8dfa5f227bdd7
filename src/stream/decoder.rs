//! Incremental UTF-8 decoder.
//!
//! Body reads can end in the middle of a multi-byte character. The decoder
//! holds such a tail back until the next read so no character is mangled;
//! genuinely invalid bytes become U+FFFD.

// ============================================================================
// Utf8Decoder
// ============================================================================

/// Stateful byte-to-text decoder for one response body.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    /// Bytes of an incomplete trailing sequence.
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Creates an empty decoder.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes the next read, returning every complete character.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut output = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    output.push_str(valid);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    output.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            output.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        self.pending = rest.to_vec();
        output
    }

    /// Flushes a held incomplete sequence at end of stream.
    pub fn finish(&mut self) -> String {
        let tail = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        tail
    }

    /// Returns `true` if bytes are held back.
    #[inline]
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
