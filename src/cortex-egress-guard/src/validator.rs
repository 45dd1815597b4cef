//! Endpoint normalization and validation.
//!
//! Every outbound URL passes through [`normalize`] immediately before the
//! call. Two disjoint paths are tried in order:
//!
//! 1. The endpoint parses as an absolute URL. It must use `https`, must not
//!    target a loopback/private host, and its host must be allow-listed.
//! 2. Otherwise it is a root-relative path. It must start with `/` and must
//!    not contain `..`. The trusted origin is re-verified, the path is
//!    resolved against it, and the resolved host goes through the same
//!    private-network and allow-list checks as path 1.

use tracing::warn;
use url::Url;

use super::{
    EgressError, GuardConfig, Result,
    allowlist::AllowedHostnames,
    host::Host,
    ip_validation::classify_host,
    origin::REQUIRED_SCHEME,
};

/// A URL that passed validation.
///
/// At construction it used `https`, had an allow-listed host, and did not
/// target a loopback or private address. It can only be produced by
/// [`normalize`] and is not meant to be cached across calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUrl {
    url: Url,
    host: Host,
}

impl ValidatedUrl {
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.url
    }

    /// Normalized host the URL targets.
    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Port the URL targets, including the scheme default.
    pub fn port(&self) -> u16 {
        self.url.port_or_known_default().unwrap_or(443)
    }

    pub fn into_url(self) -> Url {
        self.url
    }

    /// Bypass validation; lets transport tests target a local mock server.
    #[cfg(test)]
    pub(crate) fn new_unchecked(url: &str) -> Self {
        let url = Url::parse(url).unwrap();
        let host = Host::from_url_host(url.host().unwrap());
        Self { url, host }
    }
}

impl std::fmt::Display for ValidatedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.url.as_str())
    }
}

impl AsRef<str> for ValidatedUrl {
    fn as_ref(&self) -> &str {
        self.url.as_str()
    }
}

/// Normalize `endpoint` into a [`ValidatedUrl`], failing closed.
pub fn normalize(endpoint: &str, config: &GuardConfig) -> Result<ValidatedUrl> {
    let result = match Url::parse(endpoint) {
        Ok(url) => validate_absolute(url, config),
        Err(_) => resolve_relative(endpoint, config),
    };

    if let Err(err) = &result {
        warn!(kind = %err.kind(), reason = %err, "Rejected outbound endpoint");
    }
    result
}

fn validate_absolute(url: Url, config: &GuardConfig) -> Result<ValidatedUrl> {
    if url.scheme() != REQUIRED_SCHEME {
        return Err(EgressError::SchemeNotAllowed(url.scheme().to_string()));
    }
    check_destination(url, config)
}

fn resolve_relative(endpoint: &str, config: &GuardConfig) -> Result<ValidatedUrl> {
    if !endpoint.starts_with('/') {
        return Err(EgressError::InvalidPath(endpoint.to_string()));
    }
    // Coarse on purpose: any `..` is rejected, even inside a segment name.
    if endpoint.contains("..") {
        return Err(EgressError::PathTraversal(endpoint.to_string()));
    }

    let origin = config.trusted_origin();
    origin.verify()?;

    let url = origin.join(endpoint)?;
    // `//host/x` and `/\host/x` resolve to a different authority, so the
    // resolved URL is checked rather than assumed to stay on the origin.
    if url.scheme() != REQUIRED_SCHEME {
        return Err(EgressError::SchemeNotAllowed(url.scheme().to_string()));
    }
    check_destination(url, config)
}

/// Private-network and allow-list checks shared by both paths.
fn check_destination(url: Url, config: &GuardConfig) -> Result<ValidatedUrl> {
    let host = url
        .host()
        .map(Host::from_url_host)
        .ok_or_else(|| EgressError::HostnameNotAllowed(format!("{url} has no host")))?;

    let class = classify_host(&host);
    if !class.is_public() {
        return Err(EgressError::PrivateNetworkBlocked(format!("{host} ({class})")));
    }

    // Derived per call so configuration is never captured at startup.
    let allowed = AllowedHostnames::from_config(config)?;
    if !allowed.contains(&host) {
        return Err(EgressError::HostnameNotAllowed(host.to_string()));
    }

    Ok(ValidatedUrl { url, host })
}
