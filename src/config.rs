use std::env;
use std::sync::OnceLock;
use std::time::Duration;

static CONFIG: OnceLock<Config> = OnceLock::new();

const SERVICE_BUS_HOST_SUFFIX: &str = ".servicebus.windows.net";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration error, missing key: {key}")]
    Missing { key: &'static str },
    #[error("Configuration error, {key} must be valid (got '{value}')")]
    Invalid { key: &'static str, value: String },
}

/// Source of raw configuration values. The process environment in production,
/// a plain map in tests.
pub type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

// --- CONFIG AGGREGATOR ---

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub eventhub: EventHubConfig,
    pub emitter: EmitterConfig,
}

impl Config {
    /// Loads (once) from the environment and `.env`, then hands out the shared copy.
    pub fn global() -> Result<&'static Config, ConfigError> {
        if let Some(config) = CONFIG.get() {
            return Ok(config);
        }
        let loaded = Self::try_load()?;
        Ok(CONFIG.get_or_init(|| loaded))
    }

    pub fn try_load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    pub fn from_lookup(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::load(lookup)?,
            eventhub: EventHubConfig::load(lookup),
            emitter: EmitterConfig::load(lookup)?,
        })
    }
}

// --- MODULES ---

// SERVER
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub status_port: u16,
    pub log_level: String,
}

impl ServerConfig {
    fn load(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            host:        get_env(lookup, "LAGMON_HOST", "0.0.0.0")?,
            status_port: get_env(lookup, "LAGMON_STATUS_PORT", "9090")?,
            log_level:   get_env(lookup, "LAGMON_LOG", "info")?,
        })
    }
}

// EVENT HUB
#[derive(Debug, Clone, Default)]
pub struct EventHubConfig {
    pub region: String,
    pub subscription_id: String,
    pub resource_group: String,
    pub tenant_id: String,
    pub namespace: String,
    pub event_hub_name: String,
    pub consumer_groups: String,
    pub checkpoint_account_name: String,
    pub checkpoint_container_name: String,
    pub managed_identity_client_id: Option<String>,
}

impl EventHubConfig {
    fn load(lookup: Lookup<'_>) -> Self {
        let get = |key: &str| lookup(key).unwrap_or_default();
        Self {
            region:                    get("LAGMON_EVENTHUB_REGION"),
            subscription_id:           get("LAGMON_EVENTHUB_SUBSCRIPTION_ID"),
            resource_group:            get("LAGMON_EVENTHUB_RESOURCE_GROUP"),
            tenant_id:                 get("LAGMON_EVENTHUB_TENANT_ID"),
            namespace:                 get("LAGMON_EVENTHUB_NAMESPACE"),
            event_hub_name:            get("LAGMON_EVENTHUB_NAME"),
            consumer_groups:           get("LAGMON_EVENTHUB_CONSUMER_GROUP"),
            checkpoint_account_name:   get("LAGMON_CHECKPOINT_ACCOUNT_NAME"),
            checkpoint_container_name: get("LAGMON_CHECKPOINT_CONTAINER_NAME"),
            managed_identity_client_id: lookup("LAGMON_MANAGED_IDENTITY_CLIENT_ID")
                .filter(|v| !v.trim().is_empty()),
        }
    }

    /// Reports the first required key that is missing or blank.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required: [(&'static str, &str); 8] = [
            ("region", &self.region),
            ("subscriptionId", &self.subscription_id),
            ("resourceGroup", &self.resource_group),
            ("tenantId", &self.tenant_id),
            ("eventHubNamespace", &self.namespace),
            ("eventHubName", &self.event_hub_name),
            ("checkpointAccountName", &self.checkpoint_account_name),
            ("checkpointContainerName", &self.checkpoint_container_name),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing { key });
            }
        }
        Ok(())
    }

    pub fn resource_id(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.EventHub/namespaces/{}",
            self.subscription_id, self.resource_group, self.namespace
        )
    }

    pub fn namespace_host(&self) -> String {
        format!("{}{}", self.namespace.to_lowercase(), SERVICE_BUS_HOST_SUFFIX)
    }

    /// `{namespaceHost}/{eventHubName}`, the root every checkpoint blob lives under.
    pub fn checkpoint_prefix(&self) -> String {
        format!("{}/{}", self.namespace_host(), self.event_hub_name.to_lowercase())
    }

    /// Explicit consumer groups; empty means "discover them".
    pub fn consumer_group_list(&self) -> Vec<String> {
        self.consumer_groups
            .split(';')
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect()
    }
}

// EMITTER
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    pub interval_ms: u64,
    pub cycle_timeout_secs: u64,
    pub max_concurrency: usize,
    pub request_timeout_secs: u64,
}

impl EmitterConfig {
    fn load(lookup: Lookup<'_>) -> Result<Self, ConfigError> {
        Ok(Self {
            interval_ms:          get_env(lookup, "LAGMON_INTERVAL_MS", "10000")?,
            cycle_timeout_secs:   get_env(lookup, "LAGMON_CYCLE_TIMEOUT_SECS", "30")?,
            max_concurrency:      get_env(lookup, "LAGMON_MAX_CONCURRENCY", "64")?,
            request_timeout_secs: get_env(lookup, "LAGMON_REQUEST_TIMEOUT_SECS", "10")?,
        })
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            cycle_timeout_secs: 30,
            max_concurrency: 64,
            request_timeout_secs: 10,
        }
    }
}

// --- PRIVATE HELPER ---

fn get_env<T: std::str::FromStr>(lookup: Lookup<'_>, key: &'static str, default: &str) -> Result<T, ConfigError> {
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value: raw.clone() })
}
