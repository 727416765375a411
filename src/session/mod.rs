//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! handler → cache.resolve(token)
//!     → cache.rs hit (unexpired) → Identity
//!     → miss/expired → store.rs (pool.acquire → Sessions query)
//!         → active → insert {identity, now + ttl} → Identity
//!         → inactive/unknown → evict local entry → anonymous
//!
//! logout → cache.invalidate(token)
//!     → remove entry → store.deactivate(token)
//! ```

pub mod cache;
pub mod store;

use crate::security::permissions::Permissions;

pub use cache::{SessionCache, SessionError};
pub use store::{PgSessionStore, SessionStore};

/// Who a session belongs to. Handed out as an immutable copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i32,
    pub username: String,
    pub permissions: Permissions,
}
