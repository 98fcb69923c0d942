//! Inbound frame parsing
//!
//! A frame is a text payload that should hold a JSON array of event records.
//! Anything else is noise (keepalives, partial writes, foreign messages) and
//! is reported as a typed [`FrameOutcome::Ignored`] instead of an error.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// Why a frame was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IgnoreReason {
    /// Not valid JSON, or an element did not match the record shape
    Malformed,
    /// Valid JSON but not an array
    NotSequence,
    /// An empty array
    Empty,
}

impl IgnoreReason {
    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            IgnoreReason::Malformed => "malformed",
            IgnoreReason::NotSequence => "not_sequence",
            IgnoreReason::Empty => "empty",
        }
    }
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of parsing one frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome<T> {
    /// A non-empty batch of records, in payload order
    Batch(Vec<T>),
    /// The frame carries nothing to ingest
    Ignored(IgnoreReason),
}

impl<T> FrameOutcome<T> {
    /// Whether the frame produced a batch
    pub fn is_batch(&self) -> bool {
        matches!(self, FrameOutcome::Batch(_))
    }
}

/// Parse a text frame into a batch of records
pub fn parse_frame<T: DeserializeOwned>(payload: &str) -> FrameOutcome<T> {
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(_) => return FrameOutcome::Ignored(IgnoreReason::Malformed),
    };

    match value {
        Value::Array(items) if items.is_empty() => FrameOutcome::Ignored(IgnoreReason::Empty),
        Value::Array(items) => match serde_json::from_value(Value::Array(items)) {
            Ok(batch) => FrameOutcome::Batch(batch),
            Err(_) => FrameOutcome::Ignored(IgnoreReason::Malformed),
        },
        _ => FrameOutcome::Ignored(IgnoreReason::NotSequence),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::GeoThreat;

    #[test]
    fn test_parses_batch_in_order() {
        let outcome: FrameOutcome<GeoThreat> =
            parse_frame(r#"[{"id": 3, "severity": "high"}, {"id": 1}]"#);
        match outcome {
            FrameOutcome::Batch(batch) => {
                assert_eq!(batch.iter().map(|t| t.id).collect::<Vec<_>>(), vec![3, 1]);
            }
            other => panic!("expected batch, got {:?}", other),
        }
    }

    #[test]
    fn test_malformed_json_is_ignored() {
        let outcome: FrameOutcome<GeoThreat> = parse_frame("{not json");
        assert_eq!(outcome, FrameOutcome::Ignored(IgnoreReason::Malformed));
    }

    #[test]
    fn test_record_without_id_is_malformed() {
        let outcome: FrameOutcome<GeoThreat> = parse_frame(r#"[{"severity": "low"}]"#);
        assert_eq!(outcome, FrameOutcome::Ignored(IgnoreReason::Malformed));
    }

    #[test]
    fn test_non_array_is_ignored() {
        let outcome: FrameOutcome<GeoThreat> = parse_frame(r#"{"id": 1}"#);
        assert_eq!(outcome, FrameOutcome::Ignored(IgnoreReason::NotSequence));

        let outcome: FrameOutcome<GeoThreat> = parse_frame("\"ping\"");
        assert_eq!(outcome, FrameOutcome::Ignored(IgnoreReason::NotSequence));
    }

    #[test]
    fn test_empty_array_is_ignored() {
        let outcome: FrameOutcome<GeoThreat> = parse_frame("[]");
        assert_eq!(outcome, FrameOutcome::Ignored(IgnoreReason::Empty));
        assert!(!outcome.is_batch());
    }
}
