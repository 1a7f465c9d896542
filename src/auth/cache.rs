//! Credential Cache: one live bearer token per scope, refreshed on demand.
//!
//! Structure:
//! - DashMap<scope, Arc<ScopeSlot>>: slots are created lazily and never removed.
//! - ScopeSlot.current: the published token. Readers clone the Arc under a short
//!   read lock, writers swap in a whole new ScopeToken.
//! - ScopeSlot.refresh_gate: single-flight. The first caller to see a stale token
//!   refreshes; concurrent callers wait on the gate and reuse its result.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{error, info};

use crate::auth::identity::TokenProvider;
use crate::auth::token::ScopeToken;
use crate::error::Result;

pub const DEFAULT_SAFETY_MARGIN_SECS: i64 = 5 * 60;

#[derive(Default)]
struct ScopeSlot {
    current: RwLock<Option<Arc<ScopeToken>>>,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl ScopeSlot {
    fn snapshot(&self) -> Option<Arc<ScopeToken>> {
        self.current.read().clone()
    }
}

pub struct CredentialCache {
    provider: Arc<dyn TokenProvider>,
    slots: DashMap<String, Arc<ScopeSlot>>,
    safety_margin: chrono::Duration,
}

impl CredentialCache {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self::with_safety_margin(provider, chrono::Duration::seconds(DEFAULT_SAFETY_MARGIN_SECS))
    }

    pub fn with_safety_margin(provider: Arc<dyn TokenProvider>, safety_margin: chrono::Duration) -> Self {
        Self {
            provider,
            slots: DashMap::new(),
            safety_margin,
        }
    }

    /// Returns a bearer token for `scope`, refreshing it first if it is missing
    /// or has no more than the safety margin left.
    pub async fn get_token(&self, scope: &str) -> Result<String> {
        let slot = self.slot(scope);

        if let Some(token) = self.fresh(&slot) {
            return Ok(token.token.clone());
        }

        let _gate = slot.refresh_gate.lock().await;

        // Whoever held the gate before us may already have refreshed.
        if let Some(token) = self.fresh(&slot) {
            return Ok(token.token.clone());
        }

        let started = Instant::now();
        match self.provider.fetch_token(scope).await {
            Ok(access) => {
                let token = Arc::new(ScopeToken::new(scope, access));
                *slot.current.write() = Some(token.clone());
                info!(
                    "[CredentialCache] Refreshed token for scope {} via {} in {:?} (expires {})",
                    scope,
                    self.provider.name(),
                    started.elapsed(),
                    token.expires_at.to_rfc3339()
                );
                Ok(token.token.clone())
            }
            Err(e) => {
                error!("[CredentialCache] Refresh failed for scope {}: {}", scope, e);
                Err(e)
            }
        }
    }

    /// Primes every scope up front so the first cycle does not pay for issuance.
    pub async fn warm_up(&self, scopes: &[&str]) -> Result<()> {
        for scope in scopes {
            self.get_token(scope).await?;
        }
        Ok(())
    }

    /// The currently published token for `scope`, fresh or not.
    pub fn snapshot(&self, scope: &str) -> Option<Arc<ScopeToken>> {
        self.slots.get(scope).and_then(|slot| slot.snapshot())
    }

    fn slot(&self, scope: &str) -> Arc<ScopeSlot> {
        if let Some(slot) = self.slots.get(scope) {
            return Arc::clone(slot.value());
        }
        Arc::clone(self.slots.entry(scope.to_string()).or_default().value())
    }

    fn fresh(&self, slot: &ScopeSlot) -> Option<Arc<ScopeToken>> {
        slot.snapshot()
            .filter(|token| token.is_fresh(Utc::now(), self.safety_margin))
    }
}
