//! Lag Emitter: one measure-and-publish pass over a fixed set of pairs.
//!
//! Pairs are resolved once at startup (consumer groups x partitions). Every
//! `run_once` then fans out, logs a summary and publishes exactly one sample.
//! A failed cycle publishes nothing and leaves the next cycle unaffected.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::auth::CredentialCache;
use crate::config::EventHubConfig;
use crate::error::Result;
use crate::lag::engine::FanOutEngine;
use crate::lag::types::ConsumerPartition;
use crate::metrics::reporter::MetricReporter;
use crate::sources::{ConsumerGroupSource, PartitionSource};
use crate::status::snapshot::{CycleReport, StatusBoard};

pub struct LagEmitter {
    engine: FanOutEngine,
    reporter: MetricReporter,
    pairs: Vec<ConsumerPartition>,
    status: Arc<StatusBoard>,
    preflight: Option<(Arc<CredentialCache>, Vec<&'static str>)>,
}

impl LagEmitter {
    pub fn new(
        engine: FanOutEngine,
        reporter: MetricReporter,
        pairs: Vec<ConsumerPartition>,
        status: Arc<StatusBoard>,
    ) -> Self {
        Self {
            engine,
            reporter,
            pairs,
            status,
            preflight: None,
        }
    }

    /// Scopes whose tokens the fan-out needs. Checked before any unit starts so an
    /// identity outage fails the cycle once instead of once per pair.
    pub fn with_preflight(mut self, credentials: Arc<CredentialCache>, scopes: Vec<&'static str>) -> Self {
        self.preflight = Some((credentials, scopes));
        self
    }

    pub fn pairs(&self) -> &[ConsumerPartition] {
        &self.pairs
    }

    pub fn status(&self) -> Arc<StatusBoard> {
        Arc::clone(&self.status)
    }

    /// Consumer groups come from config when listed there, otherwise from discovery.
    pub async fn resolve_pairs(
        config: &EventHubConfig,
        groups: &dyn ConsumerGroupSource,
        partitions: &dyn PartitionSource,
    ) -> Result<Vec<ConsumerPartition>> {
        let mut consumer_groups = config.consumer_group_list();
        if consumer_groups.is_empty() {
            consumer_groups = groups.list_consumer_groups().await?;
        }
        let partition_ids = partitions.list_partitions().await?;

        let pairs: Vec<ConsumerPartition> = consumer_groups
            .iter()
            .flat_map(|group| {
                partition_ids
                    .iter()
                    .map(move |partition| ConsumerPartition::new(group.clone(), partition.clone()))
            })
            .collect();

        info!(
            "[Emitter] Monitoring {} consumer groups x {} partitions ({} pairs)",
            consumer_groups.len(),
            partition_ids.len(),
            pairs.len()
        );
        Ok(pairs)
    }

    pub async fn run_once(&self) -> Result<CycleReport> {
        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!("cycle", %cycle_id);

        let outcome = self.run_cycle(cycle_id).instrument(span).await;
        if let Err(e) = &outcome {
            self.status.record_failure(cycle_id, e);
        }
        outcome
    }

    async fn run_cycle(&self, cycle_id: Uuid) -> Result<CycleReport> {
        let started_at = Utc::now();
        let started = Instant::now();

        if let Some((credentials, scopes)) = &self.preflight {
            credentials.warm_up(scopes).await?;
        }

        let results = self.engine.run_cycle(&self.pairs).await?;

        let total_lag = results.iter().fold(0i64, |acc, r| acc.saturating_add(r.lag));
        let failed_pairs = results.iter().filter(|r| r.failed).count();
        info!("[Emitter] === Lag Summary: Total lag across all partitions: {} events ===", total_lag);
        if failed_pairs > 0 {
            error!("[Emitter] {} of {} pairs could not be measured and report zero lag", failed_pairs, results.len());
        }

        self.reporter.publish(&results).await?;

        let report = CycleReport {
            cycle_id,
            started_at,
            pairs: results.len(),
            failed_pairs,
            total_lag,
            duration_ms: started.elapsed().as_millis(),
        };
        self.status.record_cycle(report.clone(), results);
        Ok(report)
    }
}
