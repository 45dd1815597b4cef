//! Error taxonomy for guarded egress calls.

use serde::Deserialize;
use thiserror::Error;

/// Generic message shown when an upstream error body carries nothing usable.
const GENERIC_UPSTREAM_MESSAGE: &str = "The request failed. Please try again later.";

/// Errors produced by the egress guard.
///
/// Validation and authentication failures are raised before any network I/O.
/// Transport failures are normalized into these variants so no raw client
/// error crosses the crate boundary.
#[derive(Debug, Error)]
pub enum EgressError {
    /// Absolute URL used a scheme other than `https`.
    #[error("Scheme not allowed: {0} (only https is permitted)")]
    SchemeNotAllowed(String),

    /// Target host is loopback or in a private network range.
    #[error("Private network target blocked: {0}")]
    PrivateNetworkBlocked(String),

    /// Target host is not in the allow-list.
    #[error("Hostname not allowed: {0}")]
    HostnameNotAllowed(String),

    /// Relative endpoint does not start with `/`.
    #[error("Relative endpoints must start with '/': {0}")]
    InvalidPath(String),

    /// Relative endpoint contains `..`.
    #[error("Path traversal is not allowed in endpoint: {0}")]
    PathTraversal(String),

    /// Identifier cannot be used as a single path segment.
    #[error("Invalid {0}")]
    InvalidPathSegment(&'static str),

    /// No bearer token was available.
    #[error("No auth token available")]
    Unauthenticated,

    /// A header value supplied by the caller is not a legal header value.
    #[error("Invalid value for header {0}")]
    InvalidHeader(&'static str),

    /// Request body could not be serialized as JSON.
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    /// The deadline elapsed or the upstream answered 504.
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// The upstream answered with a non-success status.
    #[error("HTTP error! status: {status}: {body}")]
    UpstreamError { status: u16, body: String },

    /// Connection, DNS, or I/O failure talking to a validated destination.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Guard configuration is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Discriminant of [`EgressError`], for callers that branch on the kind only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EgressErrorKind {
    SchemeNotAllowed,
    PrivateNetworkBlocked,
    HostnameNotAllowed,
    InvalidPath,
    PathTraversal,
    InvalidPathSegment,
    Unauthenticated,
    InvalidHeader,
    InvalidBody,
    Timeout,
    UpstreamError,
    Transport,
    InvalidConfig,
}

impl EgressErrorKind {
    /// Whether the same call may succeed if retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EgressErrorKind::Timeout | EgressErrorKind::Transport)
    }

    /// Whether the failure was raised before the request was sent.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            EgressErrorKind::SchemeNotAllowed
                | EgressErrorKind::PrivateNetworkBlocked
                | EgressErrorKind::HostnameNotAllowed
                | EgressErrorKind::InvalidPath
                | EgressErrorKind::PathTraversal
                | EgressErrorKind::InvalidPathSegment
                | EgressErrorKind::Unauthenticated
                | EgressErrorKind::InvalidHeader
                | EgressErrorKind::InvalidBody
                | EgressErrorKind::InvalidConfig
        )
    }
}

impl std::fmt::Display for EgressErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EgressErrorKind::SchemeNotAllowed => "scheme_not_allowed",
            EgressErrorKind::PrivateNetworkBlocked => "private_network_blocked",
            EgressErrorKind::HostnameNotAllowed => "hostname_not_allowed",
            EgressErrorKind::InvalidPath => "invalid_path",
            EgressErrorKind::PathTraversal => "path_traversal",
            EgressErrorKind::InvalidPathSegment => "invalid_path_segment",
            EgressErrorKind::Unauthenticated => "unauthenticated",
            EgressErrorKind::InvalidHeader => "invalid_header",
            EgressErrorKind::InvalidBody => "invalid_body",
            EgressErrorKind::Timeout => "timeout",
            EgressErrorKind::UpstreamError => "upstream_error",
            EgressErrorKind::Transport => "transport",
            EgressErrorKind::InvalidConfig => "invalid_config",
        };
        f.write_str(name)
    }
}

impl EgressError {
    /// Get the kind of this error.
    pub fn kind(&self) -> EgressErrorKind {
        match self {
            EgressError::SchemeNotAllowed(_) => EgressErrorKind::SchemeNotAllowed,
            EgressError::PrivateNetworkBlocked(_) => EgressErrorKind::PrivateNetworkBlocked,
            EgressError::HostnameNotAllowed(_) => EgressErrorKind::HostnameNotAllowed,
            EgressError::InvalidPath(_) => EgressErrorKind::InvalidPath,
            EgressError::PathTraversal(_) => EgressErrorKind::PathTraversal,
            EgressError::InvalidPathSegment(_) => EgressErrorKind::InvalidPathSegment,
            EgressError::Unauthenticated => EgressErrorKind::Unauthenticated,
            EgressError::InvalidHeader(_) => EgressErrorKind::InvalidHeader,
            EgressError::InvalidBody(_) => EgressErrorKind::InvalidBody,
            EgressError::Timeout(_) => EgressErrorKind::Timeout,
            EgressError::UpstreamError { .. } => EgressErrorKind::UpstreamError,
            EgressError::Transport(_) => EgressErrorKind::Transport,
            EgressError::InvalidConfig(_) => EgressErrorKind::InvalidConfig,
        }
    }

    /// Upstream status code, if the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            EgressError::UpstreamError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Short message that is safe to show to end users.
    ///
    /// Never includes hostnames, raw bodies, or tenant values. For upstream
    /// errors the `{"error": {"message": ...}}` body shape is used when it
    /// parses; anything else falls back to a generic message.
    pub fn user_message(&self) -> String {
        match self {
            EgressError::Unauthenticated => {
                "You are not authorized to perform this action".to_string()
            }
            EgressError::Timeout(_) => "Request timed out. Please try again.".to_string(),
            EgressError::UpstreamError { body, .. } => upstream_message(body)
                .unwrap_or_else(|| GENERIC_UPSTREAM_MESSAGE.to_string()),
            EgressError::InvalidPathSegment(_) => "Invalid request parameters".to_string(),
            EgressError::Transport(_) => GENERIC_UPSTREAM_MESSAGE.to_string(),
            _ => "The request was rejected".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct UpstreamErrorBody {
    error: UpstreamErrorDetail,
}

#[derive(Deserialize)]
struct UpstreamErrorDetail {
    message: String,
}

/// Best-effort extraction of the upstream `error.message` field.
fn upstream_message(body: &str) -> Option<String> {
    serde_json::from_str::<UpstreamErrorBody>(body)
        .ok()
        .map(|parsed| parsed.error.message)
        .filter(|message| !message.trim().is_empty())
}

pub type Result<T> = std::result::Result<T, EgressError>;
