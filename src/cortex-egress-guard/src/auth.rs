//! Bearer token sources.
//!
//! Token acquisition and refresh belong to the caller; the guard only asks
//! for the current token once per call, before any network I/O.

use async_trait::async_trait;
use secrecy::SecretString;

/// Supplies the bearer token attached to outbound requests.
#[async_trait]
pub trait BearerTokenProvider: Send + Sync {
    /// Current token, or `None` when the caller is not authenticated.
    async fn bearer_token(&self) -> Option<SecretString>;
}

/// A fixed token.
#[derive(Clone)]
pub struct StaticToken(Option<SecretString>);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        let token: String = token.into();
        if token.trim().is_empty() {
            return Self(None);
        }
        Self(Some(SecretString::new(token.into())))
    }

    /// A provider that never has a token.
    pub fn none() -> Self {
        Self(None)
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StaticToken")
            .field(&self.0.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[async_trait]
impl BearerTokenProvider for StaticToken {
    async fn bearer_token(&self) -> Option<SecretString> {
        self.0.clone()
    }
}

/// Reads the token from an environment variable on every call.
#[derive(Debug, Clone)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl BearerTokenProvider for EnvToken {
    async fn bearer_token(&self) -> Option<SecretString> {
        std::env::var(&self.var)
            .ok()
            .filter(|token| !token.trim().is_empty())
            .map(|token| SecretString::new(token.into()))
    }
}
