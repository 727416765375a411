//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (dispatcher):
//!     → rate_limit.rs (per-IP fixed window)
//!     → Pass to routing
//!
//! Inside handlers:
//!     identity from the session cache
//!     → permissions.rs (all required names held, or "*")
//! ```
//!
//! # Design Decisions
//! - Rate limiting happens before routing so unknown paths are throttled too
//! - Limiter state is sharded per client; no I/O under its locks
//! - Idle clients are swept so the map stays bounded

pub mod permissions;
pub mod rate_limit;

pub use permissions::Permissions;
pub use rate_limit::RateLimiter;
