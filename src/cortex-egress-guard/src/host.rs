//! Host normalization for allow-list and private-network checks.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::EgressError;

/// A normalized host as it appears in a parsed URL.
///
/// Domains are lowercased with trailing dots removed. IP literals keep their
/// parsed form so range checks never depend on textual spelling
/// (`http://2130706433/` is already `127.0.0.1` once parsed).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Host {
    Domain(String),
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
}

impl Host {
    /// Parse and normalize a bare host string (no scheme, no path).
    pub fn parse(input: &str) -> Result<Self, EgressError> {
        let normalized = normalize_host(input);
        if normalized.is_empty() {
            return Err(EgressError::HostnameNotAllowed("host is empty".to_string()));
        }
        if let Ok(ip) = normalized.parse::<IpAddr>() {
            return Ok(Self::from_ip(ip));
        }
        Ok(Self::Domain(normalized))
    }

    /// Convert the host of a parsed URL.
    pub fn from_url_host(host: url::Host<&str>) -> Self {
        match host {
            url::Host::Domain(domain) => Self::Domain(normalize_host(domain)),
            url::Host::Ipv4(ip) => Self::Ipv4(ip),
            url::Host::Ipv6(ip) => Self::Ipv6(ip),
        }
    }

    fn from_ip(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(ip) => Self::Ipv4(ip),
            IpAddr::V6(ip) => Self::Ipv6(ip),
        }
    }

    /// The host as an IP address, if it is a literal.
    pub fn ip(&self) -> Option<IpAddr> {
        match self {
            Host::Domain(_) => None,
            Host::Ipv4(ip) => Some(IpAddr::V4(*ip)),
            Host::Ipv6(ip) => Some(IpAddr::V6(*ip)),
        }
    }

    /// Key used for allow-list membership.
    pub fn allowlist_key(&self) -> String {
        self.to_string()
    }

    /// Check if this host is loopback or private.
    pub fn is_private(&self) -> bool {
        super::ip_validation::is_private_host(self)
    }
}

impl std::fmt::Display for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Host::Domain(domain) => f.write_str(domain),
            Host::Ipv4(ip) => write!(f, "{ip}"),
            Host::Ipv6(ip) => write!(f, "{ip}"),
        }
    }
}

impl std::str::FromStr for Host {
    type Err = EgressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Normalize a host string.
/// - Lowercase
/// - Strip brackets from IPv6
/// - Remove trailing dots
fn normalize_host(input: &str) -> String {
    let mut host = input.trim().to_lowercase();

    if host.starts_with('[')
        && let Some(end) = host.find(']')
    {
        host = host[1..end].to_string();
    }

    while host.ends_with('.') {
        host.pop();
    }

    host
}
