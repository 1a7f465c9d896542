//! Error taxonomy for a measurement cycle.
//!
//! Per-pair failures (`UpstreamFetch`, `Parse`) are recovered inside the fan-out
//! and never reach the caller of a cycle. Everything else, `Auth` included, is
//! cycle-fatal.

use crate::config::ConfigError;

pub type Result<T> = std::result::Result<T, LagError>;

#[derive(Debug, thiserror::Error)]
pub enum LagError {
    #[error("token issuance failed for scope {scope}: {reason}")]
    Auth { scope: String, reason: String },

    #[error("fetch failed for consumer group '{consumer_group}' partition '{partition_id}': {reason}")]
    UpstreamFetch {
        consumer_group: String,
        partition_id: String,
        reason: String,
    },

    #[error("malformed {field}: '{value}'")]
    Parse { field: &'static str, value: String },

    #[error("cycle exceeded its deadline after {elapsed_ms}ms ({completed}/{total} pairs finished)")]
    CycleTimeout {
        elapsed_ms: u128,
        completed: usize,
        total: usize,
    },

    #[error("metric ingestion rejected with status {status}: {body}")]
    Ingestion { status: u16, body: String },

    #[error("{endpoint} returned status {status}: {body}")]
    Remote {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("consumer group discovery failed: {0}")]
    Discovery(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl LagError {
    pub fn auth(scope: &str, reason: impl Into<String>) -> Self {
        LagError::Auth { scope: scope.to_string(), reason: reason.into() }
    }

    pub fn upstream(consumer_group: &str, partition_id: &str, reason: impl std::fmt::Display) -> Self {
        LagError::UpstreamFetch {
            consumer_group: consumer_group.to_string(),
            partition_id: partition_id.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that only poison a single (group, partition) pair.
    pub fn is_per_pair(&self) -> bool {
        matches!(self, LagError::UpstreamFetch { .. } | LagError::Parse { .. })
    }
}
