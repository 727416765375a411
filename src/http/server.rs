//! HTTP server: accept loop and per-connection tasks.
//!
//! # Responsibilities
//! - Accept connections from the bounded listener
//! - Serve exactly one HTTP/1.1 request per connection, then close
//! - Buffer the body (bounded by `max_body_bytes`) before dispatch
//! - Bound the whole exchange by the connection deadline
//! - Stop accepting on shutdown and drain in-flight connections
//!
//! # Design Decisions
//! - One tokio task per connection; a failing connection never affects
//!   another
//! - Read errors close the connection without a response
//! - Hyper drives the wire protocol; the dispatcher sees a plain
//!   `Request<Bytes>`

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::Response;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::http::dispatcher::Dispatcher;
use crate::http::response;
use crate::net::listener::ConnectionPermit;
use crate::net::{Connection, ConnectionState, ConnectionTracker, Listener, ListenerError};

/// Per-connection limits taken from configuration.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    pub max_body_bytes: usize,
    pub connection_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl ConnectionLimits {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            max_body_bytes: config.limits.max_body_bytes,
            connection_timeout: Duration::from_secs(config.timeouts.idle_secs),
            shutdown_grace: Duration::from_secs(config.timeouts.shutdown_grace_secs),
        }
    }
}

/// The HTTP front end.
pub struct HttpServer {
    listener: Listener,
    dispatcher: Arc<Dispatcher>,
    tracker: ConnectionTracker,
    limits: ConnectionLimits,
}

impl HttpServer {
    pub fn new(listener: Listener, dispatcher: Arc<Dispatcher>, limits: ConnectionLimits) -> Self {
        Self {
            listener,
            dispatcher,
            tracker: ConnectionTracker::new(),
            limits,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Accept until `shutdown` fires, then wait (bounded) for live
    /// connections to finish.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ListenerError> {
        let addr = self.listener.local_addr().map_err(ListenerError::Accept)?;
        tracing::info!(
            address = %addr,
            handlers = self.dispatcher.registry().bindings().len(),
            "HTTP server starting"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer, permit)) => self.spawn_connection(stream, peer, permit),
                    Err(ListenerError::Accept(e)) => {
                        tracing::warn!(error = %e, "Accept failed");
                    }
                    Err(e) => return Err(e),
                },
            }
        }

        let active = self.tracker.active_count();
        if active > 0 {
            tracing::info!(active, "Draining connections");
        }
        if !self.tracker.wait_for_drain(self.limits.shutdown_grace).await {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Shutdown grace period expired with connections still open"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr, permit: ConnectionPermit) {
        let guard = self.tracker.track();
        let conn = Arc::new(Connection::new(guard.id(), peer));
        let dispatcher = Arc::clone(&self.dispatcher);
        let limits = self.limits;
        let span = tracing::debug_span!("connection", id = %conn.id(), peer = %peer);

        tokio::spawn(
            async move {
                let _permit = permit;
                let _guard = guard;
                serve_connection(stream, Arc::clone(&conn), dispatcher, limits).await;
                conn.set_state(ConnectionState::Closed);
            }
            .instrument(span),
        );
    }
}

async fn serve_connection(
    stream: TcpStream,
    conn: Arc<Connection>,
    dispatcher: Arc<Dispatcher>,
    limits: ConnectionLimits,
) {
    let service = {
        let conn = Arc::clone(&conn);
        service_fn(move |request: hyper::Request<Incoming>| {
            let conn = Arc::clone(&conn);
            let dispatcher = Arc::clone(&dispatcher);
            async move { serve_request(request, &conn, &dispatcher, limits.max_body_bytes).await }
        })
    };

    conn.set_state(ConnectionState::Reading);
    let connection = http1::Builder::new()
        .keep_alive(false)
        .timer(TokioTimer::new())
        .serve_connection(TokioIo::new(stream), service);

    match tokio::time::timeout(limits.connection_timeout, connection).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(error = %e, state = ?conn.state(), "Connection error"),
        Err(_) => tracing::debug!(state = ?conn.state(), "Connection deadline exceeded"),
    }
}

async fn serve_request(
    request: hyper::Request<Incoming>,
    conn: &Connection,
    dispatcher: &Dispatcher,
    max_body_bytes: usize,
) -> Result<Response, axum::Error> {
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > max_body_bytes) {
        tracing::debug!(declared, max_body_bytes, "Request body too large");
        let mut res = response::error(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large");
        response::close_connection(&mut res);
        conn.set_state(ConnectionState::Writing);
        return Ok(res);
    }

    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(Body::new(body), max_body_bytes).await?;
    let request = hyper::Request::from_parts(parts, body);

    let mut res = dispatcher.dispatch(request, conn).await;
    response::close_connection(&mut res);
    conn.set_state(ConnectionState::Writing);
    Ok(res)
}
