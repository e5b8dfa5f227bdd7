//! Participant demultiplexer.
//!
//! Each record of the upstream stream is one line:
//!
//! ```text
//! <tag><kind>:<payload>
//! ```
//!
//! where `tag` is the participant (`a` or `b`) and `kind` is `0` for
//! incremental text or `d` for a structured event. Payloads are opaque.
//!
//! Filtering is stateless and chunk-local. A record split across two body
//! reads is not recognised in either half.

// ============================================================================
// Imports
// ============================================================================

use crate::protocol::Participant;

// ============================================================================
// RecordKind
// ============================================================================

/// Record-type marker, the second character of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// Incremental text (`0`).
    Text,
    /// Structured event (`d`).
    Event,
}

impl RecordKind {
    /// Classifies a line for the given participant.
    ///
    /// Returns `None` when the line is not a record of that participant.
    #[must_use]
    pub fn classify(line: &str, target: Participant) -> Option<Self> {
        let mut chars = line.chars();
        if chars.next()? != target.tag() {
            return None;
        }
        match chars.next()? {
            '0' => Some(Self::Text),
            'd' => Some(Self::Event),
            _ => None,
        }
    }
}

// ============================================================================
// demultiplex
// ============================================================================

/// Extracts the records of `target` from a chunk.
///
/// Matching lines are kept in order and re-joined with `\n`, with a trailing
/// newline. Returns `None` when nothing matches.
///
/// Each chunk is handled on its own. A record split across two chunks is not
/// reassembled: a head of two or more characters is emitted as if complete,
/// newline added, and the tail is dropped because it has no tag.
///
/// # Example
///
/// ```
/// use arena_bridge::protocol::Participant;
/// use arena_bridge::stream::demultiplex;
///
/// let chunk = "a0:\"x\"\nb0:\"y\"\nbd:{\"z\":1}\n";
/// assert_eq!(
///     demultiplex(chunk, Participant::B).as_deref(),
///     Some("b0:\"y\"\nbd:{\"z\":1}\n")
/// );
/// ```
#[must_use]
pub fn demultiplex(chunk: &str, target: Participant) -> Option<String> {
    let mut output = String::new();

    for line in chunk
        .split('\n')
        .filter(|line| RecordKind::classify(line, target).is_some())
    {
        output.push_str(line);
        output.push('\n');
    }

    (!output.is_empty()).then_some(output)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    const MIXED: &str = "a0:\"x\"\nb0:\"y\"\nbd:{\"z\":1}\n";

    #[test]
    fn test_filters_target_b() {
        assert_eq!(
            demultiplex(MIXED, Participant::B).as_deref(),
            Some("b0:\"y\"\nbd:{\"z\":1}\n")
        );
    }

    #[test]
    fn test_filters_target_a() {
        assert_eq!(demultiplex(MIXED, Participant::A).as_deref(), Some("a0:\"x\"\n"));
    }

    #[test]
    fn test_only_other_participant_yields_none() {
        let chunk = "b0:\"y\"\nbd:{}\n";
        assert!(demultiplex(chunk, Participant::A).is_none());
        assert!(demultiplex(chunk, Participant::B).is_some());
    }

    #[test]
    fn test_ignores_other_record_kinds() {
        let chunk = "b2:[1]\nbe:{}\nb0:\"ok\"\n";
        assert_eq!(demultiplex(chunk, Participant::B).as_deref(), Some("b0:\"ok\"\n"));
    }

    #[test]
    fn test_missing_trailing_newline_still_terminates() {
        assert_eq!(demultiplex("b0:\"y\"", Participant::B).as_deref(), Some("b0:\"y\"\n"));
    }

    #[test]
    fn test_split_record_is_not_recovered() {
        assert!(demultiplex("b", Participant::B).is_none());
        assert!(demultiplex("0:\"tail\"\n", Participant::B).is_none());
    }

    #[test]
    fn test_split_record_head_emitted_as_complete_line() {
        assert_eq!(
            demultiplex("a0:\"x\"\nb0:\"hel", Participant::B).as_deref(),
            Some("b0:\"hel\n")
        );
        assert!(demultiplex("lo\"\n", Participant::B).is_none());
        assert_eq!(demultiplex("bd", Participant::B).as_deref(), Some("bd\n"));
    }

    #[test]
    fn test_empty_chunk() {
        assert!(demultiplex("", Participant::B).is_none());
        assert!(demultiplex("\n\n", Participant::B).is_none());
    }

    #[test]
    fn test_classify() {
        assert_eq!(RecordKind::classify("a0:1", Participant::A), Some(RecordKind::Text));
        assert_eq!(RecordKind::classify("ad:1", Participant::A), Some(RecordKind::Event));
        assert_eq!(RecordKind::classify("ad:1", Participant::B), None);
        assert_eq!(RecordKind::classify("a", Participant::A), None);
    }

    fn record() -> impl Strategy<Value = String> {
        (
            prop::sample::select(vec!['a', 'b', 'c']),
            prop::sample::select(vec!['0', 'd', '2', 'e']),
            "[^\n]{0,12}",
        )
            .prop_map(|(tag, kind, payload)| format!("{tag}{kind}:{payload}"))
    }

    proptest! {
        #[test]
        fn prop_idempotent(records in prop::collection::vec(record(), 0..20)) {
            let chunk = records.join("\n");
            for target in [Participant::A, Participant::B] {
                let once = demultiplex(&chunk, target);
                prop_assert_eq!(&once, &demultiplex(&chunk, target));
                if let Some(filtered) = &once {
                    prop_assert_eq!(Some(filtered.clone()), demultiplex(filtered, target));
                }
            }
        }

        #[test]
        fn prop_order_preserving(records in prop::collection::vec(record(), 0..20)) {
            let chunk = records.join("\n");
            let expected: Vec<&str> = records
                .iter()
                .map(String::as_str)
                .filter(|r| RecordKind::classify(r, Participant::B).is_some())
                .collect();
            let output = demultiplex(&chunk, Participant::B).unwrap_or_default();
            let actual: Vec<&str> = output.split_terminator('\n').collect();
            prop_assert_eq!(actual, expected);
        }

        #[test]
        fn prop_targets_disjoint(records in prop::collection::vec(record(), 0..20)) {
            let chunk = records.join("\n");
            let a = demultiplex(&chunk, Participant::A).unwrap_or_default();
            let b = demultiplex(&chunk, Participant::B).unwrap_or_default();
            prop_assert!(a.split_terminator('\n').all(|line| line.starts_with('a')));
            prop_assert!(b.split_terminator('\n').all(|line| line.starts_with('b')));
        }
    }
}
