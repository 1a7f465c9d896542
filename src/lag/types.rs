use serde::Serialize;

/// Sentinel offset the broker reports for a partition that never received an event.
pub const EMPTY_PARTITION_OFFSET: &str = "-1";

/// Broker-side head of a partition, fetched fresh every cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionHeadSnapshot {
    pub last_enqueued_sequence_number: i64,
    pub last_enqueued_offset: String,
}

impl PartitionHeadSnapshot {
    pub fn new(last_enqueued_sequence_number: i64, last_enqueued_offset: impl Into<String>) -> Self {
        Self {
            last_enqueued_sequence_number,
            last_enqueued_offset: last_enqueued_offset.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.last_enqueued_offset == EMPTY_PARTITION_OFFSET
    }
}

/// Last durably recorded position of a consumer group on a partition.
/// Both fields absent (the default) means "never checkpointed".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckpointRecord {
    pub sequence_number: Option<i64>,
    pub offset: Option<String>,
}

impl CheckpointRecord {
    pub fn new(sequence_number: i64, offset: impl Into<String>) -> Self {
        Self {
            sequence_number: Some(sequence_number),
            offset: Some(offset.into()),
        }
    }

    pub fn never_checkpointed() -> Self {
        Self::default()
    }

    /// No offset, or a blank one, means nothing has been processed yet.
    pub fn has_offset(&self) -> bool {
        self.offset.as_deref().is_some_and(|o| !o.trim().is_empty())
    }
}

/// One unit of fan-out work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerPartition {
    pub consumer_group: String,
    pub partition_id: String,
}

impl ConsumerPartition {
    pub fn new(consumer_group: impl Into<String>, partition_id: impl Into<String>) -> Self {
        Self {
            consumer_group: consumer_group.into(),
            partition_id: partition_id.into(),
        }
    }
}

/// Outcome for a single (consumer group, partition) pair in one cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionLag {
    pub consumer_group: String,
    pub partition_id: String,
    pub lag: i64,
    pub failed: bool,
}

impl PartitionLag {
    pub fn ok(pair: ConsumerPartition, lag: i64) -> Self {
        Self {
            consumer_group: pair.consumer_group,
            partition_id: pair.partition_id,
            lag,
            failed: false,
        }
    }

    pub fn failed(pair: ConsumerPartition) -> Self {
        Self {
            consumer_group: pair.consumer_group,
            partition_id: pair.partition_id,
            lag: 0,
            failed: true,
        }
    }
}
