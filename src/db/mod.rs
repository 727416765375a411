//! Database subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     plugin descriptors → statements.rs (collect StatementSet)
//!     → postgres.rs (PgConnector prepares the set on each connection)
//!     → pool.rs (open `pool_size` connections, fatal on failure)
//!
//! Per request:
//!     handler → pool.acquire()
//!         → stale? validate with SELECT 1 → dead? reconnect
//!     → query via prepared statement
//!     → guard dropped → slot returned → one waiter woken
//! ```

pub mod pool;
pub mod postgres;
pub mod statements;

pub use pool::{ConnectionManager, Pool, PoolError, PoolStatus, PooledConnection};
pub use postgres::{PgConnection, PgConnector, PgPool, QueryError};
pub use statements::{PreparedStatement, StatementConflict, StatementSet};
