use std::net::IpAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cortex_egress_guard::{
    EgressError, EgressErrorKind, EgressGuard, EgressResponse, EndpointRequest, GuardConfig,
    MAX_TIMEOUT_MS, OutboundRequest, PathSegment, Resolver, StaticToken, TenantContext,
    Transport, TransportError, endpoint_path,
};
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde_json::json;

enum Reply {
    Status(u16, &'static str),
    Error(TransportError),
    Hang,
}

/// Records every request and answers with a fixed reply.
struct SpyTransport {
    reply: Reply,
    calls: AtomicUsize,
    requests: Mutex<Vec<OutboundRequest>>,
    cancelled: Arc<AtomicBool>,
}

impl SpyTransport {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_request(&self) -> OutboundRequest {
        self.requests.lock().unwrap().last().cloned().unwrap()
    }
}

/// Sets the flag when dropped before completion.
struct CancelFlag(Arc<AtomicBool>);

impl Drop for CancelFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for SpyTransport {
    async fn send(&self, request: OutboundRequest) -> Result<EgressResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        match &self.reply {
            Reply::Status(status, body) => Ok(EgressResponse::new(
                StatusCode::from_u16(*status).unwrap(),
                HeaderMap::new(),
                body.as_bytes().to_vec(),
            )),
            Reply::Error(err) => Err(err.clone()),
            Reply::Hang => {
                let flag = CancelFlag(self.cancelled.clone());
                tokio::time::sleep(Duration::from_secs(60)).await;
                std::mem::forget(flag);
                Ok(EgressResponse::new(StatusCode::OK, HeaderMap::new(), ""))
            }
        }
    }
}

fn guard(transport: Arc<SpyTransport>) -> EgressGuard {
    let config = GuardConfig::builder()
        .trusted_origin("https://api.example.com")
        .build()
        .unwrap();
    EgressGuard::with_transport(config, transport)
}

fn tenant() -> TenantContext {
    TenantContext::new("team_123", "pk_live_abc")
}

fn token() -> StaticToken {
    StaticToken::new("secret-token")
}

#[tokio::test]
async fn test_get_returns_body_unmodified() {
    let transport = SpyTransport::new(Reply::Status(200, r#"{"result":[]}"#));
    let guard = guard(transport.clone());

    let response = guard
        .execute(EndpointRequest::get("/v1/teams/abc/projects"), &tenant(), &token())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text(), r#"{"result":[]}"#);
    assert_eq!(response.json::<serde_json::Value>().unwrap(), json!({"result": []}));
    assert_eq!(transport.calls(), 1);

    let sent = transport.last_request();
    assert_eq!(sent.method, reqwest::Method::GET);
    assert_eq!(sent.url.as_str(), "https://api.example.com/v1/teams/abc/projects");
    assert!(sent.body.is_none());
}

#[tokio::test]
async fn test_headers_attached() {
    let transport = SpyTransport::new(Reply::Status(200, "{}"));
    guard(transport.clone())
        .execute(EndpointRequest::get("/v1/me"), &tenant(), &token())
        .await
        .unwrap();

    let headers = transport.last_request().headers;
    assert_eq!(headers["authorization"], "Bearer secret-token");
    assert_eq!(headers["x-team-id"], "team_123");
    assert_eq!(headers["x-client-id"], "pk_live_abc");
    assert_eq!(headers["content-type"], "application/json");
    assert_eq!(headers["accept"], "application/json");
}

#[tokio::test]
async fn test_post_sends_json_body() {
    let transport = SpyTransport::new(Reply::Status(201, r#"{"id":"p1"}"#));
    let body = json!({"name": "demo", "domains": ["*"]});

    let response = guard(transport.clone())
        .execute(
            EndpointRequest::post("/v1/teams/abc/projects", body.clone()),
            &tenant(),
            &token(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let sent = transport.last_request();
    assert_eq!(sent.method, reqwest::Method::POST);
    let sent_body: serde_json::Value = serde_json::from_slice(&sent.body.unwrap()).unwrap();
    assert_eq!(sent_body, body);
}

#[tokio::test]
async fn test_gateway_timeout_maps_to_timeout() {
    let transport = SpyTransport::new(Reply::Status(504, "upstream timed out"));
    let err = guard(transport)
        .execute(EndpointRequest::get("/v1/teams/abc/projects"), &tenant(), &token())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), EgressErrorKind::Timeout);
    assert!(matches!(err, EgressError::Timeout(30_000)));
}

#[tokio::test]
async fn test_upstream_error_carries_status_and_body() {
    let transport = SpyTransport::new(Reply::Status(500, r#"{"error":{"message":"boom"}}"#));
    let err = guard(transport)
        .execute(EndpointRequest::delete("/v1/projects/p1"), &tenant(), &token())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), EgressErrorKind::UpstreamError);
    assert_eq!(err.status(), Some(500));
    assert_eq!(
        err.to_string(),
        r#"HTTP error! status: 500: {"error":{"message":"boom"}}"#
    );
    assert_eq!(err.user_message(), "boom");
}

#[tokio::test]
async fn test_foreign_host_never_reaches_transport() {
    let transport = SpyTransport::new(Reply::Status(200, "{}"));
    let err = guard(transport.clone())
        .execute(EndpointRequest::get("https://evil.com/steal"), &tenant(), &token())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), EgressErrorKind::HostnameNotAllowed);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_metadata_endpoint_never_reaches_transport() {
    let transport = SpyTransport::new(Reply::Status(200, "{}"));
    let guard = guard(transport.clone());

    let err = guard
        .execute(
            EndpointRequest::get("http://169.254.169.254/latest/meta-data/"),
            &tenant(),
            &token(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), EgressErrorKind::SchemeNotAllowed);

    let err = guard
        .execute(
            EndpointRequest::get("https://169.254.169.254/latest/meta-data/"),
            &tenant(),
            &token(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), EgressErrorKind::PrivateNetworkBlocked);

    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_path_rejections_never_reach_transport() {
    let transport = SpyTransport::new(Reply::Status(200, "{}"));
    let guard = guard(transport.clone());

    for (endpoint, kind) in [
        ("v1/teams", EgressErrorKind::InvalidPath),
        ("/v1/../admin", EgressErrorKind::PathTraversal),
        ("//evil.com/steal", EgressErrorKind::HostnameNotAllowed),
    ] {
        let err = guard
            .execute(EndpointRequest::get(endpoint), &tenant(), &token())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), kind, "{endpoint}");
    }
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_missing_token_is_unauthenticated() {
    let transport = SpyTransport::new(Reply::Status(200, "{}"));
    let guard = guard(transport.clone());

    for auth in [StaticToken::none(), StaticToken::new("   ")] {
        let err = guard
            .execute(EndpointRequest::get("/v1/me"), &tenant(), &auth)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), EgressErrorKind::Unauthenticated);
    }
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_deadline_cancels_slow_transport() {
    let transport = SpyTransport::new(Reply::Hang);
    let started = std::time::Instant::now();

    let err = guard(transport.clone())
        .execute(EndpointRequest::get("/v1/slow").timeout_ms(50.0), &tenant(), &token())
        .await
        .unwrap_err();

    assert!(matches!(err, EgressError::Timeout(50)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(transport.calls(), 1);
    assert!(transport.cancelled.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_transport_errors_are_mapped() {
    let transport = SpyTransport::new(Reply::Error(TransportError::TimedOut));
    let err = guard(transport)
        .execute(EndpointRequest::get("/v1/me"), &tenant(), &token())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), EgressErrorKind::Timeout);

    let transport = SpyTransport::new(Reply::Error(TransportError::Failed(
        "connection refused".to_string(),
    )));
    let err = guard(transport)
        .execute(EndpointRequest::get("/v1/me"), &tenant(), &token())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), EgressErrorKind::Transport);
    assert!(err.kind().is_retryable());
}

#[tokio::test]
async fn test_requested_timeout_is_clamped() {
    let transport = SpyTransport::new(Reply::Status(200, "{}"));
    let guard = guard(transport.clone());

    for (requested, expected) in [
        (999_999.0, MAX_TIMEOUT_MS),
        (-5.0, 30_000),
        (f64::NAN, 30_000),
        (1500.0, 1500),
    ] {
        guard
            .execute(
                EndpointRequest::get("/v1/me").timeout_ms(requested),
                &tenant(),
                &token(),
            )
            .await
            .unwrap();
        assert_eq!(
            transport.last_request().timeout,
            Duration::from_millis(expected),
            "{requested}"
        );
    }
}

#[tokio::test]
async fn test_invalid_tenant_header_is_rejected() {
    let transport = SpyTransport::new(Reply::Status(200, "{}"));
    let err = guard(transport.clone())
        .execute(
            EndpointRequest::get("/v1/me"),
            &TenantContext::new("team\nx-injected: 1", "pk"),
            &token(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind(), EgressErrorKind::InvalidHeader);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_sanitized_path_segments() {
    let transport = SpyTransport::new(Reply::Status(200, "[]"));
    let guard = guard(transport.clone());

    let team = PathSegment::parse("my-team", "teamSlug").unwrap();
    let endpoint = endpoint_path(&["v1", "teams", team.as_str(), "projects"]);
    guard
        .execute(EndpointRequest::get(endpoint), &tenant(), &token())
        .await
        .unwrap();
    assert_eq!(
        transport.last_request().url.as_str(),
        "https://api.example.com/v1/teams/my-team/projects"
    );

    assert!(PathSegment::parse("../admin", "teamSlug").is_err());
}

#[tokio::test]
async fn test_extra_hostname_is_allowed() {
    let transport = SpyTransport::new(Reply::Status(200, "{}"));
    let config = GuardConfig::builder()
        .trusted_origin("https://api.example.com")
        .allow_hostname("files.example.com")
        .build()
        .unwrap();
    let guard = EgressGuard::with_transport(config, transport.clone());

    guard
        .execute(
            EndpointRequest::get("https://files.example.com/upload"),
            &tenant(),
            &token(),
        )
        .await
        .unwrap();
    assert_eq!(transport.calls(), 1);

    let err = guard
        .execute(
            EndpointRequest::get("https://sub.files.example.com/upload"),
            &tenant(),
            &token(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), EgressErrorKind::HostnameNotAllowed);
    assert_eq!(transport.calls(), 1);
}

enum Lookup {
    Answer(Vec<IpAddr>),
    Hang,
}

struct StubResolver(Lookup);

#[async_trait]
impl Resolver for StubResolver {
    async fn lookup(&self, _host: &str, _port: u16) -> std::io::Result<Vec<IpAddr>> {
        match &self.0 {
            Lookup::Answer(ips) => Ok(ips.clone()),
            Lookup::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Vec::new())
            }
        }
    }
}

fn resolving_guard(transport: Arc<SpyTransport>, lookup: Lookup) -> EgressGuard {
    let config = GuardConfig::builder()
        .trusted_origin("https://api.example.com")
        .resolve_dns(true)
        .build()
        .unwrap();
    EgressGuard::with_transport(config, transport).with_resolver(Arc::new(StubResolver(lookup)))
}

#[tokio::test]
async fn test_deadline_covers_slow_resolution() {
    let transport = SpyTransport::new(Reply::Status(200, "{}"));
    let guard = resolving_guard(transport.clone(), Lookup::Hang);
    let started = std::time::Instant::now();

    let err = guard
        .execute(EndpointRequest::get("/v1/me").timeout_ms(50.0), &tenant(), &token())
        .await
        .unwrap_err();

    assert!(matches!(err, EgressError::Timeout(50)));
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_private_resolution_never_reaches_transport() {
    let transport = SpyTransport::new(Reply::Status(200, "{}"));
    let guard = resolving_guard(
        transport.clone(),
        Lookup::Answer(vec!["127.0.0.1".parse().unwrap()]),
    );

    let err = guard
        .execute(EndpointRequest::get("/v1/me"), &tenant(), &token())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), EgressErrorKind::PrivateNetworkBlocked);
    assert_eq!(transport.calls(), 0);

    let guard = resolving_guard(
        transport.clone(),
        Lookup::Answer(vec!["93.184.216.34".parse().unwrap()]),
    );
    guard
        .execute(EndpointRequest::get("/v1/me"), &tenant(), &token())
        .await
        .unwrap();
    assert_eq!(transport.calls(), 1);
}
