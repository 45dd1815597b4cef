//! Egress guard configuration.
//!
//! The configuration is built once at startup and shared read-only by every
//! call. It can come from the environment, from a TOML document, or from the
//! builder.

use serde::{Deserialize, Serialize};

use super::{
    EgressError, Result,
    host::Host,
    ip_validation::classify_host,
    origin::TrustedOrigin,
    timeout::{DEFAULT_TIMEOUT_MS, MAX_TIMEOUT_MS, TimeoutPolicy},
};

/// Environment variable holding the trusted API base URL.
pub const API_BASE_URL_ENV: &str = "API_BASE_URL";

/// Base URL used when [`API_BASE_URL_ENV`] is unset.
pub const DEFAULT_API_BASE_URL: &str = "https://api.example.com";

/// Validated, immutable guard configuration.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    trusted_origin: TrustedOrigin,
    extra_hostnames: Vec<String>,
    timeouts: TimeoutPolicy,
    resolve_dns: bool,
}

impl GuardConfig {
    /// Create a config that trusts only `origin`, with default timeouts.
    pub fn new(origin: TrustedOrigin) -> Self {
        Self {
            trusted_origin: origin,
            extra_hostnames: Vec::new(),
            timeouts: TimeoutPolicy::default(),
            resolve_dns: false,
        }
    }

    /// Create a builder for configuration.
    pub fn builder() -> GuardConfigBuilder {
        GuardConfigBuilder::new()
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable lookup.
    ///
    /// Only [`API_BASE_URL_ENV`] is read; an unset or blank value falls back to
    /// [`DEFAULT_API_BASE_URL`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = lookup(API_BASE_URL_ENV)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        Ok(Self::new(TrustedOrigin::parse(&base_url)?))
    }

    /// Parse a TOML document.
    ///
    /// ```toml
    /// api_base_url = "https://api.example.com"
    /// allowed_hostnames = ["uploads.example.com"]
    /// default_timeout_ms = 30000
    /// max_timeout_ms = 120000
    /// resolve_dns = false
    /// ```
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let file: GuardConfigFile = toml::from_str(input)
            .map_err(|e| EgressError::InvalidConfig(format!("invalid TOML: {e}")))?;
        Self::try_from(file)
    }

    pub fn trusted_origin(&self) -> &TrustedOrigin {
        &self.trusted_origin
    }

    /// Hostnames allowed in addition to the trusted origin's.
    pub fn extra_hostnames(&self) -> &[String] {
        &self.extra_hostnames
    }

    pub fn timeouts(&self) -> TimeoutPolicy {
        self.timeouts
    }

    /// Whether validated hosts are also checked after DNS resolution.
    pub fn resolve_dns(&self) -> bool {
        self.resolve_dns
    }

    #[cfg(test)]
    pub(crate) fn set_trusted_origin_for_test(&mut self, origin: TrustedOrigin) {
        self.trusted_origin = origin;
    }
}

/// On-disk shape of [`GuardConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfigFile {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default)]
    pub allowed_hostnames: Vec<String>,

    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,

    #[serde(default = "max_timeout_ms")]
    pub max_timeout_ms: u64,

    #[serde(default)]
    pub resolve_dns: bool,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn max_timeout_ms() -> u64 {
    MAX_TIMEOUT_MS
}

impl TryFrom<GuardConfigFile> for GuardConfig {
    type Error = EgressError;

    fn try_from(file: GuardConfigFile) -> Result<Self> {
        let mut builder = GuardConfigBuilder::new()
            .trusted_origin(file.api_base_url)
            .timeouts(file.default_timeout_ms, file.max_timeout_ms)
            .resolve_dns(file.resolve_dns);
        for hostname in file.allowed_hostnames {
            builder = builder.allow_hostname(hostname);
        }
        builder.build()
    }
}

/// Builder for GuardConfig.
#[derive(Debug)]
pub struct GuardConfigBuilder {
    trusted_origin: String,
    extra_hostnames: Vec<String>,
    default_timeout_ms: u64,
    max_timeout_ms: u64,
    resolve_dns: bool,
}

impl Default for GuardConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GuardConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            trusted_origin: DEFAULT_API_BASE_URL.to_string(),
            extra_hostnames: Vec::new(),
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            max_timeout_ms: MAX_TIMEOUT_MS,
            resolve_dns: false,
        }
    }

    /// Set the trusted base origin.
    pub fn trusted_origin(mut self, origin: impl Into<String>) -> Self {
        self.trusted_origin = origin.into();
        self
    }

    /// Allow an additional exact hostname.
    pub fn allow_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.extra_hostnames.push(hostname.into());
        self
    }

    /// Set default and maximum timeouts in milliseconds.
    pub fn timeouts(mut self, default_ms: u64, max_ms: u64) -> Self {
        self.default_timeout_ms = default_ms;
        self.max_timeout_ms = max_ms;
        self
    }

    /// Enable the resolved-address check.
    pub fn resolve_dns(mut self, enabled: bool) -> Self {
        self.resolve_dns = enabled;
        self
    }

    /// Validate and build the config.
    pub fn build(self) -> Result<GuardConfig> {
        let trusted_origin = TrustedOrigin::parse(&self.trusted_origin)?;
        let timeouts = TimeoutPolicy::new(self.default_timeout_ms, self.max_timeout_ms)
            .ok_or_else(|| {
                EgressError::InvalidConfig(format!(
                    "timeouts must satisfy 0 < default ({}) <= max ({})",
                    self.default_timeout_ms, self.max_timeout_ms
                ))
            })?;

        let extra_hostnames = self
            .extra_hostnames
            .iter()
            .map(|hostname| parse_allowed_hostname(hostname))
            .collect::<Result<Vec<_>>>()?;

        Ok(GuardConfig {
            trusted_origin,
            extra_hostnames,
            timeouts,
            resolve_dns: self.resolve_dns,
        })
    }
}

/// Normalize an extra allowed hostname, rejecting entries that could never
/// pass validation.
fn parse_allowed_hostname(hostname: &str) -> Result<String> {
    let invalid = |reason: &str| {
        EgressError::InvalidConfig(format!("allowed hostname {hostname:?} {reason}"))
    };

    if hostname.contains(['*', '/', '@', '?', '#']) || hostname.trim().contains(char::is_whitespace)
    {
        return Err(invalid("must be an exact hostname"));
    }
    let host = Host::parse(hostname).map_err(|_| invalid("is empty"))?;
    if let Host::Domain(domain) = &host
        && domain.contains(':')
    {
        return Err(invalid("must not include a port"));
    }
    let class = classify_host(&host);
    if !class.is_public() {
        return Err(invalid(&format!("is {class}")));
    }
    Ok(host.allowlist_key())
}
