pub mod config;
pub mod error;
pub mod auth;
pub mod sources;
pub mod lag;
pub mod metrics;
pub mod emitter;
pub mod worker;
pub mod status;

use std::sync::Arc;
use std::time::Instant;

use crate::auth::{CredentialCache, DefaultCredentialChain, EVENTHUBS_SCOPE, MONITOR_SCOPE, STORAGE_SCOPE};
use crate::config::Config;
use crate::emitter::LagEmitter;
use crate::error::Result;
use crate::lag::FanOutEngine;
use crate::metrics::{AzureMonitorSink, MetricReporter};
use crate::sources::{BlobCheckpointReader, EventHubRestClient};
use crate::status::StatusBoard;

// ========================================
// ENGINE (The Singleton)
// ========================================

/// Everything a running emitter needs, wired together.
/// Cheap to clone (all fields are Arcs).
#[derive(Clone)]
pub struct LagmonEngine {
    pub credentials: Arc<CredentialCache>,
    pub emitter: Arc<LagEmitter>,
    pub status: Arc<StatusBoard>,
    pub start_time: Instant,
}

impl LagmonEngine {
    pub async fn bootstrap(config: &Config) -> Result<Self> {
        config.eventhub.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.emitter.request_timeout())
            .connect_timeout(config.emitter.request_timeout())
            .pool_max_idle_per_host(10)
            .build()?;

        let provider = Arc::new(DefaultCredentialChain::from_config(&config.eventhub, http.clone()));
        let credentials = Arc::new(CredentialCache::new(provider));
        credentials.warm_up(&[MONITOR_SCOPE, EVENTHUBS_SCOPE]).await?;

        let eventhub = Arc::new(EventHubRestClient::new(http.clone(), Arc::clone(&credentials), &config.eventhub));
        let checkpoints = Arc::new(BlobCheckpointReader::new(http.clone(), Arc::clone(&credentials), &config.eventhub));
        let pairs = LagEmitter::resolve_pairs(&config.eventhub, eventhub.as_ref(), eventhub.as_ref()).await?;

        let engine = FanOutEngine::from_config(eventhub, checkpoints, &config.emitter);
        let sink = Arc::new(AzureMonitorSink::new(http, Arc::clone(&credentials), &config.eventhub));
        tracing::info!("[Engine] Metrics will be sent to {}", sink.endpoint());
        let reporter = MetricReporter::new(sink, config.eventhub.event_hub_name.clone());

        let status = Arc::new(StatusBoard::new());
        let emitter = LagEmitter::new(engine, reporter, pairs, Arc::clone(&status))
            .with_preflight(Arc::clone(&credentials), vec![EVENTHUBS_SCOPE, STORAGE_SCOPE]);

        Ok(Self {
            credentials,
            emitter: Arc::new(emitter),
            status,
            start_time: Instant::now(),
        })
    }
}
