//! Per-request dispatch.
//!
//! # Data Flow
//! ```text
//! buffered Request
//!     → OPTIONS? → 204 preflight (limiter and handlers untouched)
//!     → RateCheck: limited? → 429
//!     → Routing: no prefix match? → 404
//!     → Handling: handler under the request deadline (expiry → 503)
//!     → CORS headers + x-request-id on every response
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::Method;
use axum::response::Response;
use tracing::Instrument;

use crate::http::request::{RequestId, X_REQUEST_ID};
use crate::http::{cors, response};
use crate::net::{Connection, ConnectionState};
use crate::observability::metrics;
use crate::routing::{HandlerRegistry, Request, RequestHandler};
use crate::security::RateLimiter;

/// Turns one request into one response.
pub struct Dispatcher {
    registry: Arc<HandlerRegistry>,
    limiter: Option<Arc<RateLimiter>>,
    request_timeout: Duration,
}

impl Dispatcher {
    /// `limiter: None` disables rate limiting.
    pub fn new(
        registry: Arc<HandlerRegistry>,
        limiter: Option<Arc<RateLimiter>>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            limiter,
            request_timeout,
        }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub async fn dispatch(&self, request: Request, conn: &Connection) -> Response {
        let start = Instant::now();
        let request_id = RequestId::from_headers(request.headers());
        let preflight = request.method() == Method::OPTIONS;

        let span = tracing::debug_span!(
            "request",
            request_id = %request_id,
            connection_id = %conn.id(),
            method = %request.method(),
            path = %request.uri().path(),
        );

        let mut response = if preflight {
            response::preflight()
        } else {
            self.route(&request, conn).instrument(span.clone()).await
        };

        cors::apply(&mut response, request.headers(), preflight);
        if let Some(value) = request_id.header_value() {
            response.headers_mut().insert(X_REQUEST_ID, value);
        }

        let status = response.status().as_u16();
        metrics::record_request(request.method().as_str(), status, start);
        span.in_scope(|| {
            tracing::debug!(
                status,
                latency_ms = start.elapsed().as_millis() as u64,
                "Request completed"
            );
        });
        response
    }

    async fn route(&self, request: &Request, conn: &Connection) -> Response {
        let client = conn.peer();

        conn.set_state(ConnectionState::RateCheck);
        if let Some(limiter) = &self.limiter {
            if limiter.is_limited(client.ip()) {
                return response::too_many_requests();
            }
        }

        conn.set_state(ConnectionState::Routing);
        let Some(binding) = self.registry.route(request.uri().path()) else {
            tracing::debug!("No handler matched");
            return response::not_found();
        };

        conn.set_state(ConnectionState::Handling);
        self.handle(binding.handler().as_ref(), request, client, binding.prefix())
            .await
    }

    async fn handle(
        &self,
        handler: &dyn RequestHandler,
        request: &Request,
        client: SocketAddr,
        prefix: &str,
    ) -> Response {
        match tokio::time::timeout(self.request_timeout, handler.handle(request, client)).await {
            Ok(response) => response,
            Err(_) => {
                tracing::warn!(
                    prefix,
                    timeout_secs = self.request_timeout.as_secs(),
                    "Handler timed out"
                );
                response::unavailable()
            }
        }
    }
}
