//! Trivia API server.
//!
//! An HTTP/1.1 backend serving JSON endpoints over PostgreSQL.
//!
//! ```text
//!     Client ──▶ net::listener ──▶ http::server ──▶ http::dispatcher
//!                                                    │  preflight / rate limit
//!                                                    ▼
//!                                         routing::registry ──▶ handlers::*
//!                                                                 │
//!                                     session::cache ◀────────────┤
//!                                                                 ▼
//!                                                             db::pool ──▶ PostgreSQL
//! ```
//!
//! Cross-cutting: `config`, `observability`, `lifecycle`, `security`.

// Core subsystems
pub mod config;
pub mod db;
pub mod http;
pub mod net;
pub mod routing;
pub mod session;

// Endpoints
pub mod handlers;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::ServerConfig;
pub use error::{RequestError, StartupError};
pub use http::HttpServer;
pub use lifecycle::{Application, Shutdown};
