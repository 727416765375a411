//! Response builders.
//!
//! # Responsibilities
//! - JSON envelopes: `{"status":"ok","message":...}` and
//!   `{"status":"error","message":"..."}`
//! - Canned responses for the dispatcher's own branches (preflight, 404,
//!   429, 503)
//!
//! # Design Decisions
//! - CORS headers are added by the dispatcher, never here, so every
//!   response gets them exactly once

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

/// `200` with `{"status":"ok","message":<message>}`.
pub fn ok(message: Value) -> Response {
    json_response(StatusCode::OK, json!({ "status": "ok", "message": message }))
}

/// `status` with `{"status":"error","message":<message>}`.
pub fn error(status: StatusCode, message: &str) -> Response {
    json_response(status, json!({ "status": "error", "message": message }))
}

pub fn json_response(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

/// Empty `204` answering a CORS preflight.
pub fn preflight() -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
}

pub fn not_found() -> Response {
    error(StatusCode::NOT_FOUND, "Not found")
}

pub fn too_many_requests() -> Response {
    error(StatusCode::TOO_MANY_REQUESTS, "Too many requests")
}

pub fn unavailable() -> Response {
    error(StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable")
}

/// Mark the response as the last one on this connection.
pub fn close_connection(response: &mut Response) {
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn ok_wraps_message() {
        let response = ok(json!({ "user_id": 7 }));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );
        assert_eq!(
            body_json(response).await,
            json!({ "status": "ok", "message": { "user_id": 7 } })
        );
    }

    #[tokio::test]
    async fn rate_limited_body() {
        let response = too_many_requests();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            body_json(response).await,
            json!({ "status": "error", "message": "Too many requests" })
        );
    }

    #[test]
    fn preflight_is_empty_204() {
        let response = preflight();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
    }
}
