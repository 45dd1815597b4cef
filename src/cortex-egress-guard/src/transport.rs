//! HTTP transport behind the guard.
//!
//! The [`Transport`] trait only accepts a [`ValidatedUrl`], so nothing can be
//! sent to a destination that skipped validation. [`ReqwestTransport`] is the
//! production implementation; tests substitute their own.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;

use super::{EgressError, Result, validator::ValidatedUrl};

/// User-Agent string for all outbound requests.
pub const USER_AGENT: &str = concat!("cortex-egress-guard/", env!("CARGO_PKG_VERSION"));

/// Connection timeout, bounded again by the per-request deadline.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Idle pooled connections are dropped after this long so DNS is re-resolved.
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// A fully prepared outbound request.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: ValidatedUrl,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    /// Deadline for the whole exchange, body included.
    pub timeout: Duration,
}

/// Response from a validated destination.
#[derive(Debug, Clone)]
pub struct EgressResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl EgressResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw body bytes, unmodified.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Body as text, with invalid UTF-8 replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }

    pub fn into_bytes(self) -> Bytes {
        self.body
    }
}

/// Failure reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport's own deadline fired.
    TimedOut,
    /// Anything else: connect, TLS, I/O, protocol.
    Failed(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::TimedOut => write!(f, "timed out"),
            TransportError::Failed(reason) => write!(f, "{reason}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Sends a validated request and returns the buffered response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: OutboundRequest,
    ) -> std::result::Result<EgressResponse, TransportError>;
}

/// Transport backed by a shared `reqwest` client.
///
/// Redirects are never followed: a 3xx is returned to the guard as-is, since
/// its `Location` was never validated.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build the transport with the standard client configuration.
    pub fn new() -> Result<Self> {
        Self::with_client_builder(|builder| builder)
    }

    /// Build the transport after `configure` adjusts the standard builder
    /// (proxies, root certificates, pool sizes).
    ///
    /// Redirect following is switched off again after `configure` runs.
    pub fn with_client_builder(
        configure: impl FnOnce(reqwest::ClientBuilder) -> reqwest::ClientBuilder,
    ) -> Result<Self> {
        let client = configure(Self::client_builder())
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| EgressError::InvalidConfig(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn client_builder() -> reqwest::ClientBuilder {
        Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .tcp_nodelay(true)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .pool_max_idle_per_host(4)
    }

    async fn exchange(&self, request: OutboundRequest) -> reqwest::Result<EgressResponse> {
        let mut builder = self
            .client
            .request(request.method, request.url.into_url())
            .headers(request.headers)
            .timeout(request.timeout);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        Ok(EgressResponse::new(status, headers, body))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: OutboundRequest,
    ) -> std::result::Result<EgressResponse, TransportError> {
        self.exchange(request).await.map_err(|e| {
            if e.is_timeout() {
                TransportError::TimedOut
            } else {
                // Drop the URL from the message; it is logged separately.
                TransportError::Failed(e.without_url().to_string())
            }
        })
    }
}
