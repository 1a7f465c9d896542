//! Wire schema for the custom-metric ingestion endpoint.
//!
//! `SeriesItem` has no `min`/`max`; the sink must not receive them, not even as null.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const LAG_METRIC_NAME: &str = "Lag";
pub const LAG_METRIC_NAMESPACE: &str = "Event Hub custom metrics";
pub const DIMENSION_NAMES: [&str; 3] = ["EventHubName", "ConsumerGroup", "PartitionId"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub time: DateTime<Utc>,
    pub data: CustomMetricData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomMetricData {
    #[serde(rename = "baseData")]
    pub base_data: CustomMetricBaseData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomMetricBaseData {
    pub metric: String,
    pub namespace: String,
    #[serde(rename = "dimNames")]
    pub dim_names: Vec<String>,
    pub series: Vec<SeriesItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesItem {
    #[serde(rename = "dimValues")]
    pub dim_values: Vec<String>,
    pub sum: i64,
    pub count: i64,
}

impl MetricSample {
    pub fn lag(time: DateTime<Utc>, series: Vec<SeriesItem>) -> Self {
        Self {
            time,
            data: CustomMetricData {
                base_data: CustomMetricBaseData {
                    metric: LAG_METRIC_NAME.to_string(),
                    namespace: LAG_METRIC_NAMESPACE.to_string(),
                    dim_names: DIMENSION_NAMES.iter().map(|d| d.to_string()).collect(),
                    series,
                },
            },
        }
    }

    pub fn series(&self) -> &[SeriesItem] {
        &self.data.base_data.series
    }
}
