//! Upstream collaborators the lag engine reads from.

pub mod atom;
pub mod eventhub;
pub mod checkpoint_store;

use async_trait::async_trait;

use crate::error::Result;
use crate::lag::types::{CheckpointRecord, PartitionHeadSnapshot};

pub use checkpoint_store::BlobCheckpointReader;
pub use eventhub::EventHubRestClient;

/// Broker view of a partition's head.
#[async_trait]
pub trait PartitionHeadReader: Send + Sync {
    async fn read_head(&self, partition_id: &str) -> Result<PartitionHeadSnapshot>;
}

/// Durable checkpoint store. `Ok(None)` means the group never checkpointed this partition.
#[async_trait]
pub trait CheckpointReader: Send + Sync {
    async fn read_checkpoint(&self, consumer_group: &str, partition_id: &str) -> Result<Option<CheckpointRecord>>;
}

#[async_trait]
pub trait ConsumerGroupSource: Send + Sync {
    async fn list_consumer_groups(&self) -> Result<Vec<String>>;
}

#[async_trait]
pub trait PartitionSource: Send + Sync {
    async fn list_partitions(&self) -> Result<Vec<String>>;
}
