//! Trusted base origin for relative endpoints.

use serde::{Deserialize, Serialize};
use url::Url;

use super::{EgressError, Result, host::Host, ip_validation::classify_host};

/// Scheme every outbound request must use.
pub const REQUIRED_SCHEME: &str = "https";

/// The trusted API origin that relative endpoints resolve against.
///
/// Only `https` origins with a public host can be constructed. The check is
/// repeated by [`TrustedOrigin::verify`] each time a relative endpoint is
/// resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrustedOrigin {
    url: Url,
}

impl TrustedOrigin {
    /// Parse and validate an origin such as `https://api.example.com`.
    ///
    /// Any path, query, or fragment is discarded; only scheme, host, and port
    /// are kept.
    pub fn parse(input: &str) -> Result<Self> {
        let mut url = Url::parse(input.trim()).map_err(|e| {
            EgressError::InvalidConfig(format!("trusted origin {input:?} is not a URL: {e}"))
        })?;
        if url.cannot_be_a_base() {
            return Err(EgressError::InvalidConfig(format!(
                "trusted origin {input:?} cannot be used as a base URL"
            )));
        }
        url.set_path("/");
        url.set_query(None);
        url.set_fragment(None);

        let origin = Self { url };
        origin
            .verify()
            .map_err(|e| EgressError::InvalidConfig(format!("trusted origin rejected: {e}")))?;
        Ok(origin)
    }

    /// Re-check the origin's scheme and host.
    pub fn verify(&self) -> Result<()> {
        if self.url.scheme() != REQUIRED_SCHEME {
            return Err(EgressError::SchemeNotAllowed(self.url.scheme().to_string()));
        }
        let host = self.host()?;
        let class = classify_host(&host);
        if !class.is_public() {
            return Err(EgressError::PrivateNetworkBlocked(format!("{host} ({class})")));
        }
        Ok(())
    }

    /// Normalized host of the origin.
    pub fn host(&self) -> Result<Host> {
        self.url
            .host()
            .map(Host::from_url_host)
            .ok_or_else(|| EgressError::HostnameNotAllowed("trusted origin has no host".into()))
    }

    /// Resolve a root-relative path against this origin.
    pub(crate) fn join(&self, path: &str) -> Result<Url> {
        self.url
            .join(path)
            .map_err(|e| EgressError::InvalidPath(format!("{path}: {e}")))
    }

    /// The origin as a URL.
    pub fn as_url(&self) -> &Url {
        &self.url
    }

    /// Build an origin without validation, so the per-call re-check can be tested.
    #[cfg(test)]
    pub(crate) fn new_unchecked(input: &str) -> Self {
        Self {
            url: Url::parse(input).unwrap(),
        }
    }
}

impl std::fmt::Display for TrustedOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.url.origin().ascii_serialization().as_str())
    }
}

impl std::str::FromStr for TrustedOrigin {
    type Err = EgressError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TrustedOrigin {
    type Error = EgressError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TrustedOrigin> for String {
    fn from(origin: TrustedOrigin) -> Self {
        origin.to_string()
    }
}
