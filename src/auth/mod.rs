pub mod token;
pub mod identity;
pub mod cache;

pub use cache::CredentialCache;
pub use identity::{ClientSecretProvider, DefaultCredentialChain, ManagedIdentityProvider, TokenProvider};
pub use token::{AccessToken, ScopeToken};

/// Azure Monitor metric ingestion.
pub const MONITOR_SCOPE: &str = "https://monitor.azure.com/.default";
/// Event Hubs management/runtime REST API.
pub const EVENTHUBS_SCOPE: &str = "https://eventhubs.azure.net/.default";
/// Checkpoint blobs.
pub const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";
