#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use lagmon::auth::{AccessToken, TokenProvider, EVENTHUBS_SCOPE, STORAGE_SCOPE};
use lagmon::error::{LagError, Result};
use lagmon::lag::{CheckpointRecord, ConsumerPartition, PartitionHeadSnapshot};
use lagmon::metrics::{MetricSample, MetricSink};
use lagmon::sources::{CheckpointReader, ConsumerGroupSource, PartitionHeadReader, PartitionSource};
use parking_lot::Mutex;

// ========================================
// HEADS
// ========================================

#[derive(Clone)]
pub enum Head {
    Ok(PartitionHeadSnapshot),
    Delayed(Duration, PartitionHeadSnapshot),
    Fail,
    Unauthorized,
    Panic,
}

#[derive(Default)]
pub struct FakeHeads {
    heads: HashMap<String, Head>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub calls: AtomicUsize,
    /// Reads that ran to the end, delays included.
    pub finished: AtomicUsize,
}

impl FakeHeads {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, partition_id: &str, head: Head) -> Self {
        self.heads.insert(partition_id.to_string(), head);
        self
    }

    pub fn ok(self, partition_id: &str, seq: i64, offset: &str) -> Self {
        self.with(partition_id, Head::Ok(PartitionHeadSnapshot::new(seq, offset)))
    }
}

#[async_trait]
impl PartitionHeadReader for FakeHeads {
    async fn read_head(&self, partition_id: &str) -> Result<PartitionHeadSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let outcome = match self.heads.get(partition_id).cloned() {
            Some(Head::Ok(head)) => {
                tokio::task::yield_now().await;
                Ok(head)
            }
            Some(Head::Delayed(delay, head)) => {
                tokio::time::sleep(delay).await;
                Ok(head)
            }
            Some(Head::Unauthorized) => Err(LagError::auth(EVENTHUBS_SCOPE, "token endpoint returned 401")),
            Some(Head::Panic) => panic!("head reader blew up for partition {}", partition_id),
            Some(Head::Fail) | None => Err(LagError::Remote {
                endpoint: format!("fake://{}", partition_id),
                status: 503,
                body: "unavailable".into(),
            }),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.finished.fetch_add(1, Ordering::SeqCst);
        outcome
    }
}

// ========================================
// CHECKPOINTS
// ========================================

#[derive(Clone)]
pub enum Checkpoint {
    Found(CheckpointRecord),
    Missing,
    Fail,
    Unauthorized,
    Malformed,
}

#[derive(Default)]
pub struct FakeCheckpoints {
    records: HashMap<(String, String), Checkpoint>,
    pub calls: AtomicUsize,
}

impl FakeCheckpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, group: &str, partition_id: &str, checkpoint: Checkpoint) -> Self {
        self.records.insert((group.to_string(), partition_id.to_string()), checkpoint);
        self
    }

    pub fn at(self, group: &str, partition_id: &str, seq: i64, offset: &str) -> Self {
        self.with(group, partition_id, Checkpoint::Found(CheckpointRecord::new(seq, offset)))
    }
}

#[async_trait]
impl CheckpointReader for FakeCheckpoints {
    async fn read_checkpoint(&self, group: &str, partition_id: &str) -> Result<Option<CheckpointRecord>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.records.get(&(group.to_string(), partition_id.to_string())).cloned() {
            Some(Checkpoint::Found(record)) => Ok(Some(record)),
            Some(Checkpoint::Missing) | None => Ok(None),
            Some(Checkpoint::Fail) => Err(LagError::Remote {
                endpoint: "fake://blob".into(),
                status: 500,
                body: "InternalError".into(),
            }),
            Some(Checkpoint::Unauthorized) => Err(LagError::auth(STORAGE_SCOPE, "token endpoint returned 401")),
            Some(Checkpoint::Malformed) => Err(LagError::Parse {
                field: "sequencenumber",
                value: "not-a-number".into(),
            }),
        }
    }
}

// ========================================
// DISCOVERY
// ========================================

pub struct FakeTopology {
    pub groups: Vec<String>,
    pub partitions: Vec<String>,
    pub group_calls: AtomicUsize,
}

impl FakeTopology {
    pub fn new(groups: &[&str], partitions: &[&str]) -> Self {
        Self {
            groups: groups.iter().map(|g| g.to_string()).collect(),
            partitions: partitions.iter().map(|p| p.to_string()).collect(),
            group_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ConsumerGroupSource for FakeTopology {
    async fn list_consumer_groups(&self) -> Result<Vec<String>> {
        self.group_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.groups.clone())
    }
}

#[async_trait]
impl PartitionSource for FakeTopology {
    async fn list_partitions(&self) -> Result<Vec<String>> {
        Ok(self.partitions.clone())
    }
}

// ========================================
// IDENTITY
// ========================================

pub struct CountingProvider {
    pub calls: AtomicUsize,
    lifetime: chrono::Duration,
    delay: Duration,
    failing: Mutex<bool>,
}

impl CountingProvider {
    pub fn new(lifetime: chrono::Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            lifetime,
            delay: Duration::ZERO,
            failing: Mutex::new(false),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for CountingProvider {
    async fn fetch_token(&self, scope: &str) -> Result<AccessToken> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if *self.failing.lock() {
            return Err(LagError::auth(scope, "identity provider unavailable"));
        }
        Ok(AccessToken {
            token: format!("{}#{}", scope, n),
            expires_at: Utc::now() + self.lifetime,
        })
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

// ========================================
// SINK
// ========================================

#[derive(Default)]
pub struct RecordingSink {
    pub samples: Mutex<Vec<MetricSample>>,
    reject_with: Option<(u16, String)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(status: u16, body: &str) -> Self {
        Self {
            samples: Mutex::new(Vec::new()),
            reject_with: Some((status, body.to_string())),
        }
    }

    pub fn count(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn last(&self) -> Option<MetricSample> {
        self.samples.lock().last().cloned()
    }
}

#[async_trait]
impl MetricSink for RecordingSink {
    async fn submit(&self, sample: &MetricSample) -> Result<()> {
        self.samples.lock().push(sample.clone());
        match &self.reject_with {
            Some((status, body)) => Err(LagError::Ingestion { status: *status, body: body.clone() }),
            None => Ok(()),
        }
    }
}

// ========================================
// HTTP STUB
// ========================================

pub struct Recorded {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: String,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

type Responder = Box<dyn Fn(&Recorded) -> Response + Send + Sync>;

pub struct Stub {
    pub requests: Mutex<Vec<Recorded>>,
    respond: Responder,
}

impl Stub {
    pub fn count(&self) -> usize {
        self.requests.lock().len()
    }
}

/// Serves every request with `respond` on an ephemeral local port and records it.
pub async fn spawn_stub<F>(respond: F) -> (String, Arc<Stub>)
where
    F: Fn(&Recorded) -> Response + Send + Sync + 'static,
{
    let stub = Arc::new(Stub {
        requests: Mutex::new(Vec::new()),
        respond: Box::new(respond),
    });
    let app = Router::new().fallback(stub_handler).with_state(Arc::clone(&stub));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), stub)
}

async fn stub_handler(
    State(stub): State<Arc<Stub>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let recorded = Recorded {
        method,
        uri: uri.to_string(),
        headers,
        body,
    };
    let response = (stub.respond)(&recorded);
    stub.requests.lock().push(recorded);
    response
}

pub fn pairs(groups: &[&str], partitions: &[&str]) -> Vec<ConsumerPartition> {
    groups
        .iter()
        .flat_map(|g| partitions.iter().map(move |p| ConsumerPartition::new(*g, *p)))
        .collect()
}
