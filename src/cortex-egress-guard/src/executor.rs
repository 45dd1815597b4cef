//! Guarded request execution.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use super::{
    EgressError, GuardConfig, Result,
    auth::BearerTokenProvider,
    dns::{Resolver, SystemResolver, ensure_public_resolution},
    request::EndpointRequest,
    tenant::TenantContext,
    transport::{EgressResponse, OutboundRequest, ReqwestTransport, Transport, TransportError},
    validator::{ValidatedUrl, normalize},
};

/// Header carrying the tenant's team identifier.
pub static TEAM_ID_HEADER: HeaderName = HeaderName::from_static("x-team-id");

/// Header carrying the tenant's client (publishable) key.
pub static CLIENT_ID_HEADER: HeaderName = HeaderName::from_static("x-client-id");

/// Executes outbound calls through validation, authentication, and a deadline.
///
/// Each call is independent: the endpoint is validated from scratch, the
/// token is fetched again, and nothing is retried.
#[derive(Clone)]
pub struct EgressGuard {
    config: Arc<GuardConfig>,
    transport: Arc<dyn Transport>,
    resolver: Arc<dyn Resolver>,
}

impl std::fmt::Debug for EgressGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EgressGuard")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EgressGuard {
    /// Create a guard using the reqwest transport.
    pub fn new(config: GuardConfig) -> Result<Self> {
        Ok(Self::with_transport(config, Arc::new(ReqwestTransport::new()?)))
    }

    /// Create a guard with a custom transport.
    pub fn with_transport(config: GuardConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            resolver: Arc::new(SystemResolver),
        }
    }

    /// Replace the resolver used when `resolve_dns` is enabled.
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Validate an endpoint without sending anything.
    pub fn validate(&self, endpoint: &str) -> Result<ValidatedUrl> {
        normalize(endpoint, &self.config)
    }

    /// Execute a request on behalf of `tenant`.
    ///
    /// Authentication and validation both finish before any network I/O.
    /// A 504 from upstream and an elapsed deadline both surface as
    /// [`EgressError::Timeout`]; other non-2xx statuses become
    /// [`EgressError::UpstreamError`]. Success bodies are returned unparsed.
    pub async fn execute(
        &self,
        request: EndpointRequest,
        tenant: &TenantContext,
        auth: &dyn BearerTokenProvider,
    ) -> Result<EgressResponse> {
        let timeout_ms = self
            .config
            .timeouts()
            .effective_millis(request.requested_timeout_ms());
        let timeout = Duration::from_millis(timeout_ms);

        let token = auth
            .bearer_token()
            .await
            .ok_or(EgressError::Unauthenticated)?;

        let url = normalize(request.endpoint(), &self.config)?;
        let headers = build_headers(&token, tenant)?;
        let body = request
            .method()
            .body()
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| EgressError::InvalidBody(e.to_string()))?;

        let method = request.method().method();
        let host = url.host().to_string();
        debug!(%method, %host, timeout_ms, "Dispatching guarded request");

        let outbound = OutboundRequest {
            method: method.clone(),
            url,
            headers,
            body,
            timeout,
        };

        let resolve_dns = self.config.resolve_dns();
        let dispatch = async move {
            if resolve_dns {
                ensure_public_resolution(self.resolver.as_ref(), &outbound.url).await?;
            }
            Ok::<_, EgressError>(self.transport.send(outbound).await)
        };

        // The deadline covers resolution and the exchange. Dropping the
        // future on expiry closes its connection.
        let outcome = tokio::time::timeout(timeout, dispatch).await;
        let response = match outcome {
            Err(_) | Ok(Ok(Err(TransportError::TimedOut))) => {
                warn!(%method, %host, timeout_ms, "Guarded request timed out");
                return Err(EgressError::Timeout(timeout_ms));
            }
            Ok(Err(err)) => return Err(err),
            Ok(Ok(Err(TransportError::Failed(reason)))) => {
                warn!(%method, %host, %reason, "Guarded request failed");
                return Err(EgressError::Transport(reason));
            }
            Ok(Ok(Ok(response))) => response,
        };

        let status = response.status();
        if status.is_success() {
            debug!(%method, %host, status = status.as_u16(), "Guarded request succeeded");
            return Ok(response);
        }

        warn!(%method, %host, status = status.as_u16(), "Guarded request returned error status");
        if status == StatusCode::GATEWAY_TIMEOUT {
            return Err(EgressError::Timeout(timeout_ms));
        }
        Err(EgressError::UpstreamError {
            status: status.as_u16(),
            body: response.text(),
        })
    }
}

/// Headers attached to every guarded request.
fn build_headers(token: &SecretString, tenant: &TenantContext) -> Result<HeaderMap> {
    let mut authorization =
        HeaderValue::try_from(format!("Bearer {}", token.expose_secret()))
            .map_err(|_| EgressError::InvalidHeader("authorization"))?;
    authorization.set_sensitive(true);

    let team_id = HeaderValue::try_from(tenant.team_id())
        .map_err(|_| EgressError::InvalidHeader("x-team-id"))?;
    let client_id = HeaderValue::try_from(tenant.client_key())
        .map_err(|_| EgressError::InvalidHeader("x-client-id"))?;

    let mut headers = HeaderMap::with_capacity(5);
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(AUTHORIZATION, authorization);
    headers.insert(TEAM_ID_HEADER.clone(), team_id);
    headers.insert(CLIENT_ID_HEADER.clone(), client_id);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}
