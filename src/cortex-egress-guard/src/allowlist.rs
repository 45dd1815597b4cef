//! Exact-match hostname allow-list.

use std::collections::HashSet;

use super::{GuardConfig, Result, host::Host};

/// Hostnames outbound requests may target.
///
/// Membership is exact after normalization. There is no wildcard or suffix
/// matching: `api.example.com` does not admit `evil.api.example.com`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedHostnames {
    hosts: HashSet<String>,
}

impl AllowedHostnames {
    /// Create an empty set, which admits nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the set from configuration: the trusted origin's host plus any
    /// extra configured hostnames.
    pub fn from_config(config: &GuardConfig) -> Result<Self> {
        let mut set = Self::new();
        set.insert(&config.trusted_origin().host()?);
        for extra in config.extra_hostnames() {
            set.insert(&Host::parse(extra)?);
        }
        Ok(set)
    }

    /// Add a host.
    pub fn insert(&mut self, host: &Host) {
        self.hosts.insert(host.allowlist_key());
    }

    /// Check membership.
    pub fn contains(&self, host: &Host) -> bool {
        self.hosts.contains(&host.allowlist_key())
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(s: &str) -> Host {
        Host::parse(s).unwrap()
    }

    #[test]
    fn test_from_config() {
        let config = GuardConfig::builder()
            .trusted_origin("https://api.example.com")
            .allow_hostname("Uploads.Example.com.")
            .build()
            .unwrap();
        let set = AllowedHostnames::from_config(&config).unwrap();

        assert_eq!(set.len(), 2);
        assert!(set.contains(&host("api.example.com")));
        assert!(set.contains(&host("API.EXAMPLE.COM")));
        assert!(set.contains(&host("uploads.example.com")));
    }

    #[test]
    fn test_no_suffix_matching() {
        let mut set = AllowedHostnames::new();
        set.insert(&host("example.com"));

        assert!(set.contains(&host("example.com")));
        assert!(!set.contains(&host("api.example.com")));
        assert!(!set.contains(&host("notexample.com")));
        assert!(!set.contains(&host("example.com.evil.net")));
    }

    #[test]
    fn test_empty_set_admits_nothing() {
        let set = AllowedHostnames::new();
        assert!(set.is_empty());
        assert!(!set.contains(&host("api.example.com")));
    }
}
