//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     plugin catalog + handlers.enabled
//!     → registry.rs (collect statements, construct handlers)
//!     → order bindings (declared or longest-prefix-first)
//!     → Freeze as immutable HandlerRegistry
//!
//! Per request:
//!     path → registry.route() → first binding whose prefix matches
//!     → handler.rs (RequestHandler::handle)
//! ```
//!
//! # Design Decisions
//! - Bindings fixed at startup, immutable at runtime
//! - No regex in hot path (literal prefix matching only)
//! - Deterministic: same path always selects the same binding
//! - First match wins

pub mod handler;
pub mod registry;

pub use handler::{Construct, PluginDescriptor, Request, RequestHandler};
pub use registry::{HandlerBinding, HandlerRegistry, PluginLoadError};
