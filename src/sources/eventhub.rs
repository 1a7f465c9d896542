//! Event Hubs REST client: partition heads, partition ids, consumer groups.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, info};

use crate::auth::{CredentialCache, EVENTHUBS_SCOPE};
use crate::config::EventHubConfig;
use crate::error::{LagError, Result};
use crate::lag::types::{PartitionHeadSnapshot, EMPTY_PARTITION_OFFSET};
use crate::sources::atom;
use crate::sources::{ConsumerGroupSource, PartitionHeadReader, PartitionSource};

const API_VERSION: &str = "2014-01";
const DEFAULT_CONSUMER_GROUP: &str = "$Default";

pub struct EventHubRestClient {
    client: Client,
    credentials: Arc<CredentialCache>,
    base_url: String,
    event_hub_name: String,
    runtime_consumer_group: String,
}

impl EventHubRestClient {
    pub fn new(client: Client, credentials: Arc<CredentialCache>, config: &EventHubConfig) -> Self {
        Self {
            client,
            credentials,
            base_url: format!("https://{}", config.namespace_host()),
            event_hub_name: config.event_hub_name.clone(),
            runtime_consumer_group: DEFAULT_CONSUMER_GROUP.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn partition_url(&self, partition_id: &str) -> String {
        format!(
            "{}/{}/consumergroups/{}/partitions/{}?api-version={}",
            self.base_url, self.event_hub_name, self.runtime_consumer_group, partition_id, API_VERSION
        )
    }

    fn event_hub_url(&self) -> String {
        format!("{}/{}?api-version={}", self.base_url, self.event_hub_name, API_VERSION)
    }

    fn consumer_groups_url(&self) -> String {
        format!(
            "{}/{}/consumergroups?timeout=60&api-version={}",
            self.base_url, self.event_hub_name, API_VERSION
        )
    }

    async fn get_xml(&self, url: &str) -> Result<String> {
        let token = self.credentials.get_token(EVENTHUBS_SCOPE).await?;
        let started = Instant::now();

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!("[EventHub] GET {} -> {} in {:?}", url, status.as_u16(), started.elapsed());

        if !status.is_success() {
            return Err(LagError::Remote {
                endpoint: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

/// Reads a `PartitionDescription` document.
pub fn parse_partition_description(xml: &str) -> Result<PartitionHeadSnapshot> {
    let raw_seq = atom::first_element_text(xml, "EndSequenceNumber").ok_or_else(|| LagError::Parse {
        field: "EndSequenceNumber",
        value: String::new(),
    })?;
    let last_enqueued_sequence_number = raw_seq.parse::<i64>().map_err(|_| LagError::Parse {
        field: "EndSequenceNumber",
        value: raw_seq.clone(),
    })?;

    let last_enqueued_offset = match atom::first_element_text(xml, "LastEnqueuedOffset") {
        Some(offset) if !offset.is_empty() => offset,
        // Older namespaces omit the offset until the first event arrives.
        _ if last_enqueued_sequence_number < 0 => EMPTY_PARTITION_OFFSET.to_string(),
        _ => {
            return Err(LagError::Parse {
                field: "LastEnqueuedOffset",
                value: String::new(),
            })
        }
    };

    Ok(PartitionHeadSnapshot {
        last_enqueued_sequence_number,
        last_enqueued_offset,
    })
}

/// Reads an `EventHubDescription` document: explicit `PartitionIds` when
/// present, otherwise `0..PartitionCount`.
pub fn parse_partition_ids(xml: &str) -> Result<Vec<String>> {
    if let Some(body) = atom::element_bodies(xml, "PartitionIds").into_iter().next() {
        let ids = atom::leaf_texts(body);
        if !ids.is_empty() {
            return Ok(ids);
        }
    }

    let raw = atom::first_element_text(xml, "PartitionCount").ok_or_else(|| LagError::Parse {
        field: "PartitionCount",
        value: String::new(),
    })?;
    let count = raw.parse::<u32>().map_err(|_| LagError::Parse {
        field: "PartitionCount",
        value: raw.clone(),
    })?;
    Ok((0..count).map(|i| i.to_string()).collect())
}

/// Reads the consumer group feed: one `entry/title` per group, blanks dropped.
pub fn parse_consumer_groups(xml: &str) -> Vec<String> {
    atom::element_bodies(xml, "entry")
        .into_iter()
        .filter_map(|entry| atom::first_element_text(entry, "title"))
        .filter(|name| !name.is_empty())
        .collect()
}

#[async_trait]
impl PartitionHeadReader for EventHubRestClient {
    async fn read_head(&self, partition_id: &str) -> Result<PartitionHeadSnapshot> {
        let body = self.get_xml(&self.partition_url(partition_id)).await?;
        parse_partition_description(&body)
    }
}

#[async_trait]
impl PartitionSource for EventHubRestClient {
    async fn list_partitions(&self) -> Result<Vec<String>> {
        let body = self.get_xml(&self.event_hub_url()).await?;
        let ids = parse_partition_ids(&body)?;
        info!("[EventHub] {} has {} partitions", self.event_hub_name, ids.len());
        Ok(ids)
    }
}

#[async_trait]
impl ConsumerGroupSource for EventHubRestClient {
    async fn list_consumer_groups(&self) -> Result<Vec<String>> {
        let url = self.consumer_groups_url();
        info!("[EventHub] GetAllConsumerGroup: {}", url);
        let body = self.get_xml(&url).await.map_err(|e| {
            error!("[EventHub] Consumer group listing failed: {}", e);
            LagError::Discovery(e.to_string())
        })?;
        let groups = parse_consumer_groups(&body);
        info!("[EventHub] Successfully parsed {} consumer groups", groups.len());
        Ok(groups)
    }
}
