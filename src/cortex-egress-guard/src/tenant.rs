//! Caller-scoped tenant identifiers.

/// Team and client identifiers sent as `x-team-id` / `x-client-id`.
///
/// Values are opaque to the guard: the caller validates them. They are never
/// logged, so `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct TenantContext {
    team_id: String,
    client_key: String,
}

impl TenantContext {
    pub fn new(team_id: impl Into<String>, client_key: impl Into<String>) -> Self {
        Self {
            team_id: team_id.into(),
            client_key: client_key.into(),
        }
    }

    pub fn team_id(&self) -> &str {
        &self.team_id
    }

    /// Client (publishable) key.
    pub fn client_key(&self) -> &str {
        &self.client_key
    }
}

impl std::fmt::Debug for TenantContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantContext")
            .field("team_id", &"[REDACTED]")
            .field("client_key", &"[REDACTED]")
            .finish()
    }
}
