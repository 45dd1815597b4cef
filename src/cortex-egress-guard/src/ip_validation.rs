//! Loopback and private-network classification for SSRF protection.
//!
//! Classification is lexical: it looks at the host as written in the URL,
//! never at what a DNS lookup for that host would return. See `dns` for the
//! opt-in resolved-address check.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::Host;

/// Hostnames that always refer to the local machine.
const LOOPBACK_HOSTNAMES: &[&str] = &["localhost", "localhost.localdomain"];

/// Why a host is considered non-public.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClass {
    /// Publicly routable.
    Public,
    /// `localhost`, 127.0.0.0/8, ::1.
    Loopback,
    /// 10.0.0.0/8, 172.16.0.0/12, 192.168.0.0/16 (RFC 1918), fc00::/7 (RFC 4193).
    Private,
    /// 169.254.0.0/16, fe80::/10. Cloud metadata services live here.
    LinkLocal,
    /// 100.64.0.0/10 (RFC 6598).
    SharedAddressSpace,
    /// Unspecified, broadcast, multicast, and "this network".
    Reserved,
}

impl AddressClass {
    pub fn is_public(&self) -> bool {
        matches!(self, AddressClass::Public)
    }
}

impl std::fmt::Display for AddressClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressClass::Public => write!(f, "public"),
            AddressClass::Loopback => write!(f, "loopback"),
            AddressClass::Private => write!(f, "private"),
            AddressClass::LinkLocal => write!(f, "link-local"),
            AddressClass::SharedAddressSpace => write!(f, "shared address space"),
            AddressClass::Reserved => write!(f, "reserved"),
        }
    }
}

/// Check if a host is loopback or private.
pub fn is_private_host(host: &Host) -> bool {
    !classify_host(host).is_public()
}

/// Classify a normalized host.
pub fn classify_host(host: &Host) -> AddressClass {
    match host {
        Host::Domain(domain) => classify_domain(domain),
        Host::Ipv4(ip) => classify_ipv4(*ip),
        Host::Ipv6(ip) => classify_ipv6(*ip),
    }
}

/// Classify an IP address.
pub fn classify_ip(ip: IpAddr) -> AddressClass {
    match ip {
        IpAddr::V4(ip) => classify_ipv4(ip),
        IpAddr::V6(ip) => classify_ipv6(ip),
    }
}

fn classify_domain(domain: &str) -> AddressClass {
    let domain = domain.to_ascii_lowercase();
    if LOOPBACK_HOSTNAMES.contains(&domain.as_str()) || domain.ends_with(".localhost") {
        return AddressClass::Loopback;
    }
    // Non-special schemes leave IP literals as opaque domains.
    match domain.parse::<IpAddr>() {
        Ok(ip) => classify_ip(ip),
        Err(_) => AddressClass::Public,
    }
}

/// Classify an IPv4 address.
pub fn classify_ipv4(ip: Ipv4Addr) -> AddressClass {
    if ip.is_loopback() {
        AddressClass::Loopback
    } else if ip.is_private() {
        AddressClass::Private
    } else if ip.is_link_local() {
        AddressClass::LinkLocal
    } else if ipv4_in_cidr(ip, [100, 64, 0, 0], 10) {
        AddressClass::SharedAddressSpace
    } else if ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_multicast()
        || ipv4_in_cidr(ip, [0, 0, 0, 0], 8)
    {
        AddressClass::Reserved
    } else {
        AddressClass::Public
    }
}

/// Classify an IPv6 address.
pub fn classify_ipv6(ip: Ipv6Addr) -> AddressClass {
    // ::ffff:a.b.c.d and ::a.b.c.d carry an IPv4 destination.
    if !ip.is_loopback()
        && !ip.is_unspecified()
        && let Some(v4) = ip.to_ipv4()
    {
        return classify_ipv4(v4);
    }

    if ip.is_loopback() {
        AddressClass::Loopback
    } else if is_unique_local_ipv6(&ip) {
        AddressClass::Private
    } else if is_link_local_ipv6(&ip) {
        AddressClass::LinkLocal
    } else if ip.is_unspecified() || ip.is_multicast() {
        AddressClass::Reserved
    } else {
        AddressClass::Public
    }
}

/// Check if IPv4 is in a CIDR range.
fn ipv4_in_cidr(ip: Ipv4Addr, base: [u8; 4], prefix: u8) -> bool {
    let ip = u32::from(ip);
    let base = u32::from(Ipv4Addr::from(base));
    let mask = if prefix == 0 {
        0
    } else {
        u32::MAX << (32 - prefix)
    };
    (ip & mask) == (base & mask)
}

/// fc00::/7 (RFC 4193).
fn is_unique_local_ipv6(ip: &Ipv6Addr) -> bool {
    (ip.octets()[0] & 0xfe) == 0xfc
}

/// fe80::/10.
fn is_link_local_ipv6(ip: &Ipv6Addr) -> bool {
    let octets = ip.octets();
    octets[0] == 0xfe && (octets[1] & 0xc0) == 0x80
}
