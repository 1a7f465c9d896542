//! Lag math for a single (consumer group, partition) pair.
//!
//! Sequence numbers are signed 64-bit and only ever grow until `i64::MAX`, where
//! the broker starts over. A head below the checkpoint therefore means the
//! partition wrapped since the checkpoint was written.

use std::collections::HashMap;

use crate::error::{LagError, Result};
use crate::lag::types::{CheckpointRecord, PartitionHeadSnapshot};

pub const SEQUENCE_NUMBER_KEY: &str = "sequencenumber";
pub const OFFSET_KEY: &str = "offset";

/// Lag for one pair. Never fails: anything malformed resolves to 0.
pub fn compute_lag(head: &PartitionHeadSnapshot, checkpoint: &CheckpointRecord) -> i64 {
    calculate(head, checkpoint).unwrap_or(0)
}

/// Same as [`compute_lag`] but keeps the reason a pair could not be evaluated,
/// so the caller can flag it.
pub fn calculate(head: &PartitionHeadSnapshot, checkpoint: &CheckpointRecord) -> Result<i64> {
    if head.is_empty() {
        return Ok(0);
    }

    let head_seq = head.last_enqueued_sequence_number;

    // Sequence numbers start at 0, so a never-consumed partition holds head + 1 events.
    if !checkpoint.has_offset() {
        return Ok(head_seq.saturating_add(1).max(0));
    }

    let checkpoint_seq = checkpoint.sequence_number.ok_or_else(|| LagError::Parse {
        field: SEQUENCE_NUMBER_KEY,
        value: String::new(),
    })?;

    if head_seq >= checkpoint_seq {
        return Ok(head_seq.saturating_sub(checkpoint_seq));
    }

    // Wrapped: the tail of the old cycle plus everything since the restart.
    Ok(i64::MAX
        .checked_sub(checkpoint_seq)
        .and_then(|tail| tail.checked_add(head_seq))
        .filter(|lag| *lag >= 0)
        .unwrap_or(0))
}

/// Builds a checkpoint from blob metadata (`sequencenumber`, `offset`).
/// Keys are matched case-insensitively; missing keys are not an error.
pub fn parse_checkpoint_metadata(metadata: &HashMap<String, String>) -> Result<CheckpointRecord> {
    let lookup = |wanted: &str| {
        metadata
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(wanted))
            .map(|(_, value)| value.clone())
    };

    let sequence_number = match lookup(SEQUENCE_NUMBER_KEY) {
        Some(raw) => Some(raw.trim().parse::<i64>().map_err(|_| LagError::Parse {
            field: SEQUENCE_NUMBER_KEY,
            value: raw.clone(),
        })?),
        None => None,
    };

    Ok(CheckpointRecord {
        sequence_number,
        offset: lookup(OFFSET_KEY),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn head(seq: i64, offset: &str) -> PartitionHeadSnapshot {
        PartitionHeadSnapshot::new(seq, offset)
    }

    #[test]
    fn normal_case_is_plain_difference() {
        assert_eq!(compute_lag(&head(100, "99"), &CheckpointRecord::new(40, "39")), 60);
        assert_eq!(compute_lag(&head(40, "39"), &CheckpointRecord::new(40, "39")), 0);
    }

    #[test]
    fn wrapped_head_counts_tail_and_restart() {
        let checkpoint = CheckpointRecord::new(i64::MAX - 3, "x");
        assert_eq!(compute_lag(&head(5, "4"), &checkpoint), 8);
    }

    #[test]
    fn wrapped_with_negative_checkpoint_clamps_to_zero() {
        let checkpoint = CheckpointRecord::new(-1, "x");
        assert_eq!(compute_lag(&head(-10, "4"), &checkpoint), 0);
    }

    #[test]
    fn empty_partition_ignores_checkpoint() {
        assert_eq!(compute_lag(&head(0, "-1"), &CheckpointRecord::new(10_000, "9999")), 0);
        assert_eq!(compute_lag(&head(77, "-1"), &CheckpointRecord::never_checkpointed()), 0);
    }

    #[test]
    fn never_checkpointed_counts_every_event() {
        assert_eq!(compute_lag(&head(0, "0"), &CheckpointRecord::never_checkpointed()), 1);
        assert_eq!(compute_lag(&head(41, "41"), &CheckpointRecord::never_checkpointed()), 42);
        let blank_offset = CheckpointRecord { sequence_number: Some(3), offset: Some("  ".into()) };
        assert_eq!(compute_lag(&head(41, "41"), &blank_offset), 42);
        assert_eq!(compute_lag(&head(i64::MAX, "1"), &CheckpointRecord::never_checkpointed()), i64::MAX);
    }

    #[test]
    fn offset_without_sequence_number_is_a_parse_failure() {
        let checkpoint = CheckpointRecord { sequence_number: None, offset: Some("12".into()) };
        assert!(matches!(calculate(&head(50, "50"), &checkpoint), Err(LagError::Parse { .. })));
        assert_eq!(compute_lag(&head(50, "50"), &checkpoint), 0);
    }

    #[test]
    fn metadata_parsing() {
        let mut metadata = HashMap::new();
        metadata.insert("SequenceNumber".to_string(), "123".to_string());
        metadata.insert("offset".to_string(), "4567".to_string());
        assert_eq!(parse_checkpoint_metadata(&metadata).unwrap(), CheckpointRecord::new(123, "4567"));

        metadata.insert("SequenceNumber".to_string(), "12x".to_string());
        assert!(matches!(
            parse_checkpoint_metadata(&metadata),
            Err(LagError::Parse { field: SEQUENCE_NUMBER_KEY, .. })
        ));

        let empty = parse_checkpoint_metadata(&HashMap::new()).unwrap();
        assert_eq!(empty, CheckpointRecord::never_checkpointed());
    }
}
