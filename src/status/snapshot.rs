use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::lag::types::PartitionLag;

/// Summary of one finished cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub pairs: usize,
    pub failed_pairs: usize,
    pub total_lag: i64,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleFailure {
    pub cycle_id: Uuid,
    pub at: DateTime<Utc>,
    pub error: String,
}

/// What `/api/lag` serves.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LagSnapshot {
    pub last_cycle: Option<CycleReport>,
    pub results: Vec<PartitionLag>,
    pub last_error: Option<CycleFailure>,
    pub cycles_ok: u64,
    pub cycles_failed: u64,
}

/// Last-known state, written by the worker once per cycle and read by the status server.
#[derive(Default)]
pub struct StatusBoard {
    inner: RwLock<LagSnapshot>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&self, report: CycleReport, results: Vec<PartitionLag>) {
        let mut snapshot = self.inner.write();
        snapshot.last_cycle = Some(report);
        snapshot.results = results;
        snapshot.cycles_ok += 1;
    }

    /// Results from an earlier cycle are kept; only the error is replaced.
    pub fn record_failure(&self, cycle_id: Uuid, error: &dyn std::fmt::Display) {
        let mut snapshot = self.inner.write();
        snapshot.last_error = Some(CycleFailure {
            cycle_id,
            at: Utc::now(),
            error: error.to_string(),
        });
        snapshot.cycles_failed += 1;
    }

    pub fn snapshot(&self) -> LagSnapshot {
        self.inner.read().clone()
    }
}
