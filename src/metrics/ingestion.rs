//! Azure Monitor custom-metric ingestion over HTTPS.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, info};

use crate::auth::{CredentialCache, MONITOR_SCOPE};
use crate::config::EventHubConfig;
use crate::error::{LagError, Result};
use crate::metrics::reporter::MetricSink;
use crate::metrics::schema::MetricSample;

pub struct AzureMonitorSink {
    client: Client,
    credentials: Arc<CredentialCache>,
    endpoint: String,
}

impl AzureMonitorSink {
    pub fn new(client: Client, credentials: Arc<CredentialCache>, config: &EventHubConfig) -> Self {
        Self {
            client,
            credentials,
            endpoint: ingestion_endpoint(&config.region, &config.resource_id()),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Regional endpoint for the monitored resource.
pub fn ingestion_endpoint(region: &str, resource_id: &str) -> String {
    format!("https://{}.monitoring.azure.com{}/metrics", region, resource_id)
}

#[async_trait]
impl MetricSink for AzureMonitorSink {
    async fn submit(&self, sample: &MetricSample) -> Result<()> {
        let token = self.credentials.get_token(MONITOR_SCOPE).await?;
        let started = Instant::now();

        debug!(
            "[Ingestion] POST {} payload: {}",
            self.endpoint,
            serde_json::to_string(sample).unwrap_or_default()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .json(sample)
            .send()
            .await
            .map_err(|e| {
                error!("[Ingestion] POST {} failed after {:?}: {}", self.endpoint, started.elapsed(), e);
                LagError::Http(e)
            })?;

        let status = response.status();
        if status.is_success() {
            info!("[Ingestion] POST completed in {:?} with status {}", started.elapsed(), status.as_u16());
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        error!("[Ingestion] Sink rejected sample with status {}: {}", status.as_u16(), body);
        Err(LagError::Ingestion {
            status: status.as_u16(),
            body,
        })
    }
}
