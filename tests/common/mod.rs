//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::task::JoinHandle;

use trivia_server::config::{BindingOrder, ListenerConfig};
use trivia_server::http::{ConnectionLimits, Dispatcher, HttpServer};
use trivia_server::lifecycle::Shutdown;
use trivia_server::net::{Listener, ListenerError};
use trivia_server::routing::{HandlerRegistry, Request, RequestHandler};
use trivia_server::security::RateLimiter;

/// Handler that answers with its own prefix and counts calls.
pub struct EchoHandler {
    prefix: &'static str,
    calls: AtomicUsize,
}

impl EchoHandler {
    pub fn new(prefix: &'static str) -> Arc<Self> {
        Arc::new(Self {
            prefix,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestHandler for EchoHandler {
    fn endpoint_prefix(&self) -> &str {
        self.prefix
    }

    async fn handle(&self, request: &Request, _client: SocketAddr) -> Response {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let body = format!("{} {} {}", self.prefix, request.method(), request.body().len());
        (StatusCode::OK, body).into_response()
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub task: JoinHandle<Result<(), ListenerError>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub fn limits() -> ConnectionLimits {
    ConnectionLimits {
        max_body_bytes: 1024,
        connection_timeout: Duration::from_secs(5),
        shutdown_grace: Duration::from_secs(2),
    }
}

/// Boot a server on an ephemeral port with the given handlers.
pub async fn start_server(
    handlers: Vec<Arc<dyn RequestHandler>>,
    limiter: Option<RateLimiter>,
) -> TestServer {
    let registry = HandlerRegistry::new(handlers, BindingOrder::Declared).unwrap();
    let dispatcher = Dispatcher::new(
        Arc::new(registry),
        limiter.map(Arc::new),
        Duration::from_secs(5),
    );

    let listener = Listener::bind(&ListenerConfig {
        bind_address: "127.0.0.1:0".into(),
        max_connections: 64,
    })
    .await
    .unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::new(listener, Arc::new(dispatcher), limits());
    let shutdown = Shutdown::new();
    let task = tokio::spawn(server.run(shutdown.subscribe()));

    TestServer {
        addr,
        shutdown,
        task,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
