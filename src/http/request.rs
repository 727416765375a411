//! Request inspection helpers.
//!
//! # Responsibilities
//! - Assign each request a unique ID (UUID v4), echoed as `x-request-id`
//! - Extract the `sessionId` cookie
//! - Parse query-string parameters and JSON bodies for handlers
//!
//! # Design Decisions
//! - Query values are taken verbatim (no percent-decoding); the endpoints
//!   only take identifiers
//! - A client-supplied `x-request-id` is kept so traces line up across hops

use std::collections::HashMap;

use axum::http::{header, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;

use crate::error::RequestError;
use crate::routing::Request;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const SESSION_COOKIE: &str = "sessionId";

/// Correlation ID attached to a request and its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Reuse the caller's ID if it sent a usable one.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty() && v.len() <= 128)
            .map(|v| Self(v.to_string()))
            .unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn header_value(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.0).ok()
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Value of the `sessionId` cookie, or an empty string when absent.
pub fn session_token(request: &Request) -> &str {
    request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .unwrap_or("")
}

/// All `key=value` pairs of the query string. Pairs without `=` are skipped;
/// a repeated key keeps its last value.
pub fn query_params(request: &Request) -> HashMap<&str, &str> {
    request
        .uri()
        .query()
        .unwrap_or("")
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .collect()
}

pub fn query_param<'a>(request: &'a Request, key: &str) -> Option<&'a str> {
    query_params(request).get(key).copied()
}

/// Deserialize the request body as JSON.
pub fn json_body<T: DeserializeOwned>(request: &Request) -> Result<T, RequestError> {
    serde_json::from_slice(request.body())
        .map_err(|_| RequestError::bad_request("Invalid JSON request"))
}
