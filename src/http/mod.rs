//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper HTTP/1.1, body buffering, connection deadline)
//!     → dispatcher.rs (preflight, rate check, routing, handler deadline)
//!     → cors.rs (CORS headers on every response)
//!     → Send to client, close
//!
//! Handler helpers:
//!     request.rs (request ID, session cookie, query string, JSON body)
//!     response.rs (JSON envelopes, canned statuses)
//! ```

pub mod cors;
pub mod dispatcher;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::Dispatcher;
pub use request::{RequestId, X_REQUEST_ID};
pub use server::{ConnectionLimits, HttpServer};
