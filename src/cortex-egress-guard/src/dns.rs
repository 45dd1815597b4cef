//! Resolved-address check for validated hosts.
//!
//! Lexical validation only sees the hostname. A public-looking name can still
//! resolve to a private address (DNS rebinding). When enabled, the guard
//! resolves the host right before dispatch and refuses if any address is
//! non-public. The connection itself resolves again, so this narrows the
//! window rather than pinning the address.

use std::net::IpAddr;

use async_trait::async_trait;
use tracing::warn;

use super::{EgressError, Result, ip_validation::classify_ip, validator::ValidatedUrl};

/// Result of DNS resolution check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsCheckResult {
    /// All resolved IPs are public.
    Safe(Vec<IpAddr>),

    /// At least one resolved IP is non-public.
    NonPublicIp(IpAddr),

    /// DNS resolution failed.
    ResolutionFailed(String),
}

/// Looks up the addresses a hostname resolves to.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn lookup(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the system (`tokio::net::lookup_host`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn lookup(&self, host: &str, port: u16) -> std::io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, port)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Resolve `host` with the system resolver and classify every returned address.
pub async fn check_dns_resolution(host: &str, port: u16) -> DnsCheckResult {
    check_resolution(&SystemResolver, host, port).await
}

/// Resolve `host` with `resolver` and classify every returned address.
pub async fn check_resolution(resolver: &dyn Resolver, host: &str, port: u16) -> DnsCheckResult {
    match resolver.lookup(host, port).await {
        Ok(ips) => {
            let mut safe_ips = Vec::new();
            for ip in ips {
                if !classify_ip(ip).is_public() {
                    return DnsCheckResult::NonPublicIp(ip);
                }
                safe_ips.push(ip);
            }

            if safe_ips.is_empty() {
                DnsCheckResult::ResolutionFailed("No addresses returned".to_string())
            } else {
                DnsCheckResult::Safe(safe_ips)
            }
        }
        Err(e) => DnsCheckResult::ResolutionFailed(e.to_string()),
    }
}

/// Fail unless every address the validated host resolves to is public.
///
/// IP literals were already classified during validation and are not
/// looked up again.
pub async fn ensure_public_resolution(resolver: &dyn Resolver, url: &ValidatedUrl) -> Result<()> {
    if url.host().ip().is_some() {
        return Ok(());
    }

    let host = url.host().to_string();
    match check_resolution(resolver, &host, url.port()).await {
        DnsCheckResult::Safe(_) => Ok(()),
        DnsCheckResult::NonPublicIp(ip) => {
            let class = classify_ip(ip);
            warn!(%host, %ip, %class, "Validated host resolved to a non-public address");
            Err(EgressError::PrivateNetworkBlocked(format!(
                "{host} resolves to {ip} ({class})"
            )))
        }
        DnsCheckResult::ResolutionFailed(e) => Err(EgressError::Transport(format!(
            "Failed to resolve {host}: {e}"
        ))),
    }
}
