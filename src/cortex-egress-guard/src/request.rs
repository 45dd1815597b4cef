//! Caller-supplied request description.

use std::time::Duration;

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use super::{EgressError, Result};

/// HTTP method together with its body.
///
/// POST and PUT always carry a JSON body, GET and DELETE never do.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestMethod {
    Get,
    Delete,
    Post(Value),
    Put(Value),
}

impl RequestMethod {
    pub fn method(&self) -> Method {
        match self {
            RequestMethod::Get => Method::GET,
            RequestMethod::Delete => Method::DELETE,
            RequestMethod::Post(_) => Method::POST,
            RequestMethod::Put(_) => Method::PUT,
        }
    }

    pub fn body(&self) -> Option<&Value> {
        match self {
            RequestMethod::Get | RequestMethod::Delete => None,
            RequestMethod::Post(body) | RequestMethod::Put(body) => Some(body),
        }
    }
}

/// A single outbound call as requested by a caller.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointRequest {
    endpoint: String,
    method: RequestMethod,
    timeout_ms: Option<f64>,
}

impl EndpointRequest {
    fn new(endpoint: impl Into<String>, method: RequestMethod) -> Self {
        Self {
            endpoint: endpoint.into(),
            method,
            timeout_ms: None,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(endpoint, RequestMethod::Get)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(endpoint, RequestMethod::Delete)
    }

    pub fn post(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(endpoint, RequestMethod::Post(body))
    }

    pub fn put(endpoint: impl Into<String>, body: Value) -> Self {
        Self::new(endpoint, RequestMethod::Put(body))
    }

    /// POST with a serializable body.
    pub fn post_json<T: Serialize>(endpoint: impl Into<String>, body: &T) -> Result<Self> {
        Ok(Self::post(endpoint, to_value(body)?))
    }

    /// PUT with a serializable body.
    pub fn put_json<T: Serialize>(endpoint: impl Into<String>, body: &T) -> Result<Self> {
        Ok(Self::put(endpoint, to_value(body)?))
    }

    /// Override the timeout in milliseconds. Unusable values fall back to the
    /// configured default when the call runs.
    pub fn timeout_ms(mut self, timeout_ms: f64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Override the timeout.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.timeout_ms(timeout.as_secs_f64() * 1000.0)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> &RequestMethod {
        &self.method
    }

    pub fn requested_timeout_ms(&self) -> Option<f64> {
        self.timeout_ms
    }
}

fn to_value<T: Serialize>(body: &T) -> Result<Value> {
    serde_json::to_value(body)
        .map_err(|e| EgressError::InvalidBody(e.to_string()))
}
