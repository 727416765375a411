//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (ID, state machine, drain tracking)
//!     → Hand off to HTTP layer
//!
//! Connection States:
//!     Idle → Reading → RateCheck → Routing → Handling → Writing → Closed
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - One request per connection

pub mod connection;
pub mod listener;

pub use connection::{Connection, ConnectionId, ConnectionState, ConnectionTracker};
pub use listener::{Listener, ListenerError};
