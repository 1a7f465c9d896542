//! Worker: drives the emitter at a fixed delay until shutdown.
//!
//! The next cycle is scheduled `interval` after the previous one finished, so
//! cycles never overlap. A failed cycle is logged and the loop carries on.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::emitter::LagEmitter;

pub struct Worker {
    emitter: Arc<LagEmitter>,
    interval: Duration,
}

impl Worker {
    pub fn new(emitter: Arc<LagEmitter>, interval: Duration) -> Self {
        Self { emitter, interval }
    }

    /// Runs cycles until `shutdown` resolves. Returns how many cycles were started.
    pub async fn run<F>(&self, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut cycles = 0u64;

        loop {
            cycles += 1;
            info!("[Worker] executeMetricsCollection - START (cycle #{})", cycles);

            tokio::select! {
                _ = &mut shutdown => {
                    info!("[Worker] Shutdown requested during cycle #{}, abandoning it", cycles);
                    return cycles;
                }
                outcome = self.emitter.run_once() => match outcome {
                    Ok(report) => info!(
                        "[Worker] Cycle {} published {} series ({} failed pairs, total lag {}) in {}ms",
                        report.cycle_id, report.pairs, report.failed_pairs, report.total_lag, report.duration_ms
                    ),
                    Err(e) => error!("[Worker] Error in metrics collection cycle: {}", e),
                },
            }
            info!("[Worker] executeMetricsCollection - END");

            tokio::select! {
                _ = &mut shutdown => {
                    info!("[Worker] Shutdown requested, stopping after {} cycles", cycles);
                    return cycles;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
