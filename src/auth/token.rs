use chrono::{DateTime, Utc};

/// A bearer token as issued by an identity provider.
#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// A cached token bound to the scope it was issued for.
/// Never mutated: a refresh swaps in a new `ScopeToken`.
#[derive(Clone)]
pub struct ScopeToken {
    pub scope: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl ScopeToken {
    pub fn new(scope: &str, access: AccessToken) -> Self {
        Self {
            scope: scope.to_string(),
            token: access.token,
            expires_at: access.expires_at,
        }
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> chrono::Duration {
        self.expires_at - now
    }

    /// Fresh means strictly more than `margin` of lifetime left.
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        self.remaining(now) > margin
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl std::fmt::Debug for ScopeToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeToken")
            .field("scope", &self.scope)
            .field("token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
