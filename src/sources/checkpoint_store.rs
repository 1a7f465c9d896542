//! Checkpoint store backed by blob metadata.
//!
//! Each (consumer group, partition) checkpoint is an empty blob at
//! `{namespaceHost}/{eventHubName}/{consumerGroup lowercased}/checkpoint/{partitionId}`
//! whose metadata carries `sequencenumber` and `offset`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::auth::{CredentialCache, STORAGE_SCOPE};
use crate::config::EventHubConfig;
use crate::error::{LagError, Result};
use crate::lag::calculator::{parse_checkpoint_metadata, OFFSET_KEY, SEQUENCE_NUMBER_KEY};
use crate::lag::types::CheckpointRecord;
use crate::sources::CheckpointReader;

const STORAGE_HOST_SUFFIX: &str = ".blob.core.windows.net";
const STORAGE_API_VERSION: &str = "2021-08-06";
const METADATA_HEADER_PREFIX: &str = "x-ms-meta-";

pub struct BlobCheckpointReader {
    client: Client,
    credentials: Arc<CredentialCache>,
    container_url: String,
    prefix: String,
}

impl BlobCheckpointReader {
    pub fn new(client: Client, credentials: Arc<CredentialCache>, config: &EventHubConfig) -> Self {
        Self {
            client,
            credentials,
            container_url: format!(
                "https://{}{}/{}",
                config.checkpoint_account_name, STORAGE_HOST_SUFFIX, config.checkpoint_container_name
            ),
            prefix: config.checkpoint_prefix(),
        }
    }

    pub fn with_container_url(mut self, container_url: impl Into<String>) -> Self {
        self.container_url = container_url.into();
        self
    }

    pub fn blob_path(&self, consumer_group: &str, partition_id: &str) -> String {
        checkpoint_blob_path(&self.prefix, consumer_group, partition_id)
    }
}

pub fn checkpoint_blob_path(prefix: &str, consumer_group: &str, partition_id: &str) -> String {
    format!("{}/{}/checkpoint/{}", prefix, consumer_group.to_lowercase(), partition_id)
}

/// Collects `x-ms-meta-*` headers into a lowercase-keyed map. A checkpoint
/// field whose value is not visible ASCII is malformed; other metadata is skipped.
fn metadata_from_headers(headers: &reqwest::header::HeaderMap) -> Result<HashMap<String, String>> {
    let mut metadata = HashMap::new();
    for (name, value) in headers {
        let Some(key) = name.as_str().strip_prefix(METADATA_HEADER_PREFIX) else {
            continue;
        };
        let key = key.to_lowercase();
        match value.to_str() {
            Ok(text) => {
                metadata.insert(key, text.to_string());
            }
            Err(_) => {
                if let Some(field) = [SEQUENCE_NUMBER_KEY, OFFSET_KEY].into_iter().find(|f| *f == key) {
                    return Err(LagError::Parse {
                        field,
                        value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    });
                }
            }
        }
    }
    Ok(metadata)
}

#[async_trait]
impl CheckpointReader for BlobCheckpointReader {
    async fn read_checkpoint(&self, consumer_group: &str, partition_id: &str) -> Result<Option<CheckpointRecord>> {
        let blob = self.blob_path(consumer_group, partition_id);
        let url = format!("{}/{}", self.container_url, blob);
        let token = self.credentials.get_token(STORAGE_SCOPE).await?;

        debug!("[Checkpoint] GetProperties: {}", blob);
        let response = self
            .client
            .head(&url)
            .bearer_auth(token)
            .header("x-ms-version", STORAGE_API_VERSION)
            .header("x-ms-date", Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string())
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!("[Checkpoint] No checkpoint at {}", blob);
            return Ok(None);
        }
        if !status.is_success() {
            // HEAD responses carry no body; the error code travels in a header.
            let code = response
                .headers()
                .get("x-ms-error-code")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string();
            return Err(LagError::Remote {
                endpoint: url,
                status: status.as_u16(),
                body: code,
            });
        }

        let metadata = metadata_from_headers(response.headers())?;
        parse_checkpoint_metadata(&metadata).map(Some)
    }
}
