//! Turns one cycle's sorted lag results into a single metric sample and submits it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::error::Result;
use crate::lag::types::PartitionLag;
use crate::metrics::schema::{MetricSample, SeriesItem};

/// Destination for metric samples. Exactly one `submit` per cycle, no retries.
#[async_trait]
pub trait MetricSink: Send + Sync {
    async fn submit(&self, sample: &MetricSample) -> Result<()>;
}

#[derive(Clone)]
pub struct MetricReporter {
    sink: Arc<dyn MetricSink>,
    event_hub_name: String,
}

impl MetricReporter {
    pub fn new(sink: Arc<dyn MetricSink>, event_hub_name: impl Into<String>) -> Self {
        Self {
            sink,
            event_hub_name: event_hub_name.into(),
        }
    }

    /// `count` is the 1-based position in `results`. The schema requires the
    /// field; it is not a count of anything.
    pub fn build_sample(&self, results: &[PartitionLag], time: DateTime<Utc>) -> MetricSample {
        let series = results
            .iter()
            .enumerate()
            .map(|(i, result)| SeriesItem {
                dim_values: vec![
                    self.event_hub_name.clone(),
                    result.consumer_group.clone(),
                    result.partition_id.clone(),
                ],
                sum: result.lag,
                count: i as i64 + 1,
            })
            .collect();
        MetricSample::lag(time, series)
    }

    pub async fn publish(&self, results: &[PartitionLag]) -> Result<()> {
        let sample = self.build_sample(results, Utc::now());
        match self.sink.submit(&sample).await {
            Ok(()) => {
                info!("[MetricReporter] Published {} series for {}", sample.series().len(), self.event_hub_name);
                Ok(())
            }
            Err(e) => {
                error!("[MetricReporter] Publishing {} series failed: {}", sample.series().len(), e);
                Err(e)
            }
        }
    }
}
