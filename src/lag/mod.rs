pub mod types;
pub mod calculator;
pub mod engine;

pub use calculator::{calculate, compute_lag};
pub use engine::FanOutEngine;
pub use types::{CheckpointRecord, ConsumerPartition, PartitionHeadSnapshot, PartitionLag};
