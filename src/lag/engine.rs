//! Fan-Out Engine: one measurement cycle across every (consumer group, partition) pair.
//!
//! Structure:
//! - One task per pair in a JoinSet, throttled by a Semaphore.
//! - Each task owns its head/checkpoint/result and yields a PartitionLag:
//!   fetch errors, parse errors and panics become a flagged zero-lag result.
//!   An auth failure is the exception: it aborts the batch and fails the cycle.
//! - The whole batch shares one deadline. Missing it aborts every outstanding
//!   task and fails the cycle; partial results are discarded, never returned.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn, Instrument};

use crate::config::EmitterConfig;
use crate::error::{LagError, Result};
use crate::lag::calculator::calculate;
use crate::lag::types::{ConsumerPartition, PartitionLag};
use crate::sources::{CheckpointReader, PartitionHeadReader};

pub const DEFAULT_CYCLE_DEADLINE: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_CONCURRENCY: usize = 64;

#[derive(Clone)]
pub struct FanOutEngine {
    heads: Arc<dyn PartitionHeadReader>,
    checkpoints: Arc<dyn CheckpointReader>,
    deadline: Duration,
    max_concurrency: usize,
}

impl FanOutEngine {
    pub fn new(heads: Arc<dyn PartitionHeadReader>, checkpoints: Arc<dyn CheckpointReader>) -> Self {
        Self {
            heads,
            checkpoints,
            deadline: DEFAULT_CYCLE_DEADLINE,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn from_config(
        heads: Arc<dyn PartitionHeadReader>,
        checkpoints: Arc<dyn CheckpointReader>,
        config: &EmitterConfig,
    ) -> Self {
        Self::new(heads, checkpoints)
            .with_deadline(config.cycle_timeout())
            .with_max_concurrency(config.max_concurrency)
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Measures every pair and returns one result per pair, ordered by partition id.
    /// Pairs sharing a partition id keep their input order.
    pub async fn run_cycle(&self, pairs: &[ConsumerPartition]) -> Result<Vec<PartitionLag>> {
        let started = Instant::now();
        let total = pairs.len();
        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut units = JoinSet::new();

        for (index, pair) in pairs.iter().cloned().enumerate() {
            let heads = Arc::clone(&self.heads);
            let checkpoints = Arc::clone(&self.checkpoints);
            let permits = Arc::clone(&permits);
            let span = tracing::info_span!(
                "pair",
                consumer_group = %pair.consumer_group,
                partition = %pair.partition_id
            );

            units.spawn(
                async move {
                    let _permit = permits.acquire_owned().await;
                    let fallback = pair.clone();
                    let outcome = match AssertUnwindSafe(measure_pair(&*heads, &*checkpoints, pair))
                        .catch_unwind()
                        .await
                    {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            error!("[FanOut] Lag unit panicked, reporting zero lag");
                            Ok(PartitionLag::failed(fallback))
                        }
                    };
                    (index, outcome)
                }
                .instrument(span),
            );
        }

        let mut slots: Vec<Option<PartitionLag>> = vec![None; total];
        let mut completed = 0usize;

        let gather = async {
            while let Some(joined) = units.join_next().await {
                match joined {
                    Ok((index, Ok(lag))) => {
                        slots[index] = Some(lag);
                        completed += 1;
                    }
                    Ok((_, Err(fatal))) => return Err(fatal),
                    Err(e) => warn!("[FanOut] Lag unit did not complete: {}", e),
                }
            }
            Ok(())
        };

        match tokio::time::timeout(self.deadline, gather).await {
            Ok(Ok(())) => {}
            Ok(Err(fatal)) => {
                units.abort_all();
                error!("[FanOut] Cycle aborted, {}/{} pairs finished: {}", completed, total, fatal);
                return Err(fatal);
            }
            Err(_) => {
                units.abort_all();
                let elapsed = started.elapsed();
                error!(
                    "[FanOut] Cycle deadline of {:?} exceeded after {:?}: {}/{} pairs finished, discarding results",
                    self.deadline, elapsed, completed, total
                );
                return Err(LagError::CycleTimeout {
                    elapsed_ms: elapsed.as_millis(),
                    completed,
                    total,
                });
            }
        }

        let mut results: Vec<PartitionLag> = slots.into_iter().flatten().collect();
        if results.len() != total {
            // Only reachable if a unit was cancelled from outside; never publish a short batch.
            return Err(LagError::CycleTimeout {
                elapsed_ms: started.elapsed().as_millis(),
                completed: results.len(),
                total,
            });
        }
        results.sort_by(|a, b| a.partition_id.cmp(&b.partition_id));

        let failed = results.iter().filter(|r| r.failed).count();
        info!(
            "[FanOut] Cycle finished in {:?}: {} pairs, {} failed",
            started.elapsed(),
            total,
            failed
        );
        Ok(results)
    }
}

async fn measure_pair(
    heads: &dyn PartitionHeadReader,
    checkpoints: &dyn CheckpointReader,
    pair: ConsumerPartition,
) -> Result<PartitionLag> {
    match evaluate(heads, checkpoints, &pair).await {
        Ok(lag) => {
            info!(
                "[FanOut] Calculated lag for ConsumerGroup='{}' Partition='{}': {} events",
                pair.consumer_group, pair.partition_id, lag
            );
            Ok(PartitionLag::ok(pair, lag))
        }
        // No token means no pair behind that scope can be measured.
        Err(e @ LagError::Auth { .. }) => Err(e),
        Err(e) => {
            error!(
                "[FanOut] Error calculating lag for ConsumerGroup='{}' Partition='{}': {}",
                pair.consumer_group, pair.partition_id, e
            );
            Ok(PartitionLag::failed(pair))
        }
    }
}

async fn evaluate(
    heads: &dyn PartitionHeadReader,
    checkpoints: &dyn CheckpointReader,
    pair: &ConsumerPartition,
) -> Result<i64> {
    let head = heads
        .read_head(&pair.partition_id)
        .await
        .map_err(|e| upstream(pair, e))?;

    // The checkpoint cannot change the answer for an empty partition.
    if head.is_empty() {
        debug!("[FanOut] Empty partition {}", pair.partition_id);
        return Ok(0);
    }

    let checkpoint = checkpoints
        .read_checkpoint(&pair.consumer_group, &pair.partition_id)
        .await
        .map_err(|e| upstream(pair, e))?
        .unwrap_or_default();

    debug!(
        "[FanOut] head seq={} offset={} checkpoint seq={:?} offset={:?}",
        head.last_enqueued_sequence_number,
        head.last_enqueued_offset,
        checkpoint.sequence_number,
        checkpoint.offset
    );
    calculate(&head, &checkpoint)
}

fn upstream(pair: &ConsumerPartition, e: LagError) -> LagError {
    if e.is_per_pair() || matches!(e, LagError::Auth { .. }) {
        return e;
    }
    LagError::upstream(&pair.consumer_group, &pair.partition_id, e)
}
