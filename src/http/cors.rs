//! CORS headers.
//!
//! Credentials are allowed, so the wildcard origin is never used: the
//! request's `Origin` is echoed back, and the header is left out when the
//! request carried none.

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN,
};
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;

pub const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization";
pub const PREFLIGHT_ALLOW_HEADERS: &str =
    "Content-Type, Authorization, Access-Control-Allow-Origin";

/// Add the CORS headers to a response for a request with `request_headers`.
pub fn apply(response: &mut Response, request_headers: &HeaderMap, preflight: bool) {
    let headers = response.headers_mut();
    if let Some(origin) = request_headers.get(ORIGIN) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
    }
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(if preflight {
            PREFLIGHT_ALLOW_HEADERS
        } else {
            ALLOW_HEADERS
        }),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
}
