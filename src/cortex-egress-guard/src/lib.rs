//! Outbound HTTP guard for Cortex services.
//!
//! Every outbound call a server makes on behalf of a request goes through
//! [`EgressGuard::execute`], which:
//! - Validates the endpoint against a trusted origin and an exact hostname
//!   allow-list (SSRF protection, blocks loopback/private targets)
//! - Requires a bearer token before any network I/O
//! - Attaches `Authorization`, `x-team-id`, and `x-client-id` headers
//! - Bounds the call with a clamped deadline and never follows redirects
//! - Maps every failure onto [`EgressError`]
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       EgressGuard                           │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────┐  │
//! │  │ TimeoutPolicy│  │ BearerToken  │  │ validator         │  │
//! │  │ (clamp)      │  │ Provider     │  │ ├ TrustedOrigin   │  │
//! │  └──────────────┘  └──────────────┘  │ ├ AllowedHostnames│  │
//! │                                      │ └ ip_validation   │  │
//! │                                      └───────────────────┘  │
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │ Transport (ReqwestTransport, no redirects) + deadline   ││
//! │  └─────────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use cortex_egress_guard::{EgressGuard, EndpointRequest, GuardConfig, StaticToken, TenantContext};
//!
//! let guard = EgressGuard::new(GuardConfig::from_env()?)?;
//! let tenant = TenantContext::new(project.team_id, project.publishable_key);
//!
//! let response = guard
//!     .execute(EndpointRequest::get("/v1/teams/abc/projects"), &tenant, &StaticToken::new(token))
//!     .await?;
//! ```

pub mod allowlist;
pub mod auth;
pub mod config;
pub mod dns;
pub mod error;
pub mod executor;
pub mod host;
pub mod ip_validation;
pub mod origin;
pub mod path;
pub mod request;
pub mod tenant;
pub mod timeout;
pub mod transport;
pub mod validator;

pub use allowlist::AllowedHostnames;
pub use auth::{BearerTokenProvider, EnvToken, StaticToken};
pub use config::{
    API_BASE_URL_ENV, DEFAULT_API_BASE_URL, GuardConfig, GuardConfigBuilder, GuardConfigFile,
};
pub use dns::{
    DnsCheckResult, Resolver, SystemResolver, check_dns_resolution, check_resolution,
    ensure_public_resolution,
};
pub use error::{EgressError, EgressErrorKind, Result};
pub use executor::{CLIENT_ID_HEADER, EgressGuard, TEAM_ID_HEADER};
pub use host::Host;
pub use ip_validation::{AddressClass, classify_host, classify_ip, is_private_host};
pub use origin::TrustedOrigin;
pub use path::{PathSegment, endpoint_path};
pub use request::{EndpointRequest, RequestMethod};
pub use tenant::TenantContext;
pub use timeout::{DEFAULT_TIMEOUT_MS, MAX_TIMEOUT_MS, TimeoutPolicy};
pub use transport::{EgressResponse, OutboundRequest, ReqwestTransport, Transport, TransportError};
pub use validator::{ValidatedUrl, normalize};
