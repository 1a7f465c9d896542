pub mod schema;
pub mod reporter;
pub mod ingestion;

pub use ingestion::AzureMonitorSink;
pub use reporter::{MetricReporter, MetricSink};
pub use schema::{CustomMetricBaseData, CustomMetricData, MetricSample, SeriesItem};
