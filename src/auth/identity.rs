//! Identity providers: where bearer tokens actually come from.
//!
//! - `ManagedIdentityProvider`: the instance metadata endpoint (IMDS), optionally
//!   pinned to a user-assigned identity (explicit-identity mode).
//! - `ClientSecretProvider`: service principal via the client-credentials grant.
//! - `DefaultCredentialChain`: tries each configured provider in order.

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::auth::token::AccessToken;
use crate::config::EventHubConfig;
use crate::error::{LagError, Result};

const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self, scope: &str) -> Result<AccessToken>;

    fn name(&self) -> &'static str;
}

/// `https://monitor.azure.com/.default` -> `https://monitor.azure.com/`
fn scope_to_resource(scope: &str) -> String {
    match scope.strip_suffix(".default") {
        Some(resource) => resource.to_string(),
        None => scope.to_string(),
    }
}

// ========================================
// MANAGED IDENTITY
// ========================================

#[derive(Deserialize)]
struct ImdsTokenResponse {
    access_token: String,
    // IMDS sends epoch seconds as a string; some hosts send a number.
    expires_on: serde_json::Value,
}

pub struct ManagedIdentityProvider {
    client: Client,
    endpoint: String,
    client_id: Option<String>,
}

impl ManagedIdentityProvider {
    pub fn new(client: Client, client_id: Option<String>) -> Self {
        Self { client, endpoint: IMDS_ENDPOINT.to_string(), client_id }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl TokenProvider for ManagedIdentityProvider {
    async fn fetch_token(&self, scope: &str) -> Result<AccessToken> {
        let resource = scope_to_resource(scope);
        let mut query = vec![
            ("api-version", IMDS_API_VERSION.to_string()),
            ("resource", resource),
        ];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.clone()));
        }

        let response = self
            .client
            .get(&self.endpoint)
            .header("Metadata", "true")
            .query(&query)
            .send()
            .await
            .map_err(|e| LagError::auth(scope, format!("managed identity request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LagError::auth(scope, format!("managed identity returned {}: {}", status.as_u16(), body)));
        }

        let parsed: ImdsTokenResponse = response
            .json()
            .await
            .map_err(|e| LagError::auth(scope, format!("malformed managed identity response: {}", e)))?;

        let expires_on = match &parsed.expires_on {
            serde_json::Value::String(s) => s.parse::<i64>().ok(),
            serde_json::Value::Number(n) => n.as_i64(),
            _ => None,
        }
        .ok_or_else(|| LagError::auth(scope, "managed identity response has no usable expires_on"))?;

        let expires_at = Utc
            .timestamp_opt(expires_on, 0)
            .single()
            .ok_or_else(|| LagError::auth(scope, format!("expires_on out of range: {}", expires_on)))?;

        Ok(AccessToken { token: parsed.access_token, expires_at })
    }

    fn name(&self) -> &'static str {
        "managed-identity"
    }
}

// ========================================
// CLIENT SECRET (service principal)
// ========================================

#[derive(Deserialize)]
struct AadTokenResponse {
    access_token: String,
    expires_in: i64,
}

pub struct ClientSecretProvider {
    client: Client,
    authority: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl ClientSecretProvider {
    pub fn new(client: Client, tenant_id: String, client_id: String, client_secret: String) -> Self {
        Self {
            client,
            authority: AUTHORITY_HOST.to_string(),
            tenant_id,
            client_id,
            client_secret,
        }
    }

    /// Reads `AZURE_CLIENT_ID` / `AZURE_CLIENT_SECRET` (and optionally
    /// `AZURE_TENANT_ID`, falling back to `default_tenant`).
    pub fn from_env(client: Client, default_tenant: &str) -> Option<Self> {
        let client_id = std::env::var("AZURE_CLIENT_ID").ok().filter(|v| !v.is_empty())?;
        let client_secret = std::env::var("AZURE_CLIENT_SECRET").ok().filter(|v| !v.is_empty())?;
        let tenant_id = std::env::var("AZURE_TENANT_ID")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default_tenant.to_string());
        Some(Self::new(client, tenant_id, client_id, client_secret))
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = authority.into();
        self
    }
}

#[async_trait]
impl TokenProvider for ClientSecretProvider {
    async fn fetch_token(&self, scope: &str) -> Result<AccessToken> {
        let url = format!("{}/{}/oauth2/v2.0/token", self.authority, self.tenant_id);
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| LagError::auth(scope, format!("token endpoint request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LagError::auth(scope, format!("token endpoint returned {}: {}", status.as_u16(), body)));
        }

        let parsed: AadTokenResponse = response
            .json()
            .await
            .map_err(|e| LagError::auth(scope, format!("malformed token response: {}", e)))?;

        Ok(AccessToken {
            token: parsed.access_token,
            expires_at: Utc::now() + Duration::seconds(parsed.expires_in),
        })
    }

    fn name(&self) -> &'static str {
        "client-secret"
    }
}

impl std::fmt::Debug for ClientSecretProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSecretProvider")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

// ========================================
// DEFAULT CHAIN
// ========================================

pub struct DefaultCredentialChain {
    providers: Vec<Box<dyn TokenProvider>>,
}

impl DefaultCredentialChain {
    pub fn new(providers: Vec<Box<dyn TokenProvider>>) -> Self {
        Self { providers }
    }

    /// Explicit-identity mode when a managed identity client id is configured,
    /// otherwise service principal from env (if present) then system-assigned identity.
    pub fn from_config(config: &EventHubConfig, client: Client) -> Self {
        let mut providers: Vec<Box<dyn TokenProvider>> = Vec::new();

        if let Some(client_id) = &config.managed_identity_client_id {
            info!("[Identity] Using managed identity with client ID: {}", client_id);
            providers.push(Box::new(ManagedIdentityProvider::new(client, Some(client_id.clone()))));
            return Self::new(providers);
        }

        if let Some(secret) = ClientSecretProvider::from_env(client.clone(), &config.tenant_id) {
            info!("[Identity] Service principal credentials found for tenant: {}", secret.tenant_id);
            providers.push(Box::new(secret));
        }
        info!("[Identity] Falling back to system-assigned managed identity");
        providers.push(Box::new(ManagedIdentityProvider::new(client, None)));
        Self::new(providers)
    }
}

#[async_trait]
impl TokenProvider for DefaultCredentialChain {
    async fn fetch_token(&self, scope: &str) -> Result<AccessToken> {
        let mut failures = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            match provider.fetch_token(scope).await {
                Ok(token) => {
                    debug!("[Identity] {} issued token for scope {}", provider.name(), scope);
                    return Ok(token);
                }
                Err(e) => {
                    warn!("[Identity] {} failed for scope {}: {}", provider.name(), scope, e);
                    failures.push(format!("{}: {}", provider.name(), e));
                }
            }
        }
        if failures.is_empty() {
            return Err(LagError::auth(scope, "no identity providers configured"));
        }
        Err(LagError::auth(scope, failures.join("; ")))
    }

    fn name(&self) -> &'static str {
        "default-chain"
    }
}
