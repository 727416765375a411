//! Backing store consulted by the session cache on a miss.

use std::sync::Arc;

use async_trait::async_trait;

use crate::db::{PgPool, PreparedStatement, QueryError};
use crate::security::permissions::Permissions;
use crate::session::Identity;

/// Session lookups and invalidation against the system of record.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Identity for an active, unexpired session, or `None`.
    async fn fetch_identity(&self, token: &str) -> Result<Option<Identity>, QueryError>;

    /// Mark the session inactive. Unknown tokens are not an error.
    async fn deactivate(&self, token: &str) -> Result<(), QueryError>;
}

pub const SELECT_SESSION_IDENTITY: PreparedStatement = PreparedStatement::new(
    "select_user_data_from_session",
    "SELECT user_id, username FROM public.\"Sessions\" \
     WHERE id = $1 AND expires_at > NOW() AND active = TRUE LIMIT 1",
);

pub const INVALIDATE_SESSION: PreparedStatement = PreparedStatement::new(
    "invalidate_session",
    "UPDATE public.\"Sessions\" SET active = FALSE WHERE id = $1",
);

pub const SELECT_USER_PERMISSIONS: PreparedStatement = PreparedStatement::new(
    "select_user_permissions",
    "SELECT p.permission_name FROM public.\"UserPermissions\" up \
     JOIN public.\"Permissions\" p ON p.id = up.permission_id \
     WHERE up.user_id = $1",
);

/// Statements the PostgreSQL store needs on every connection.
pub const STATEMENTS: &[PreparedStatement] =
    &[SELECT_SESSION_IDENTITY, INVALIDATE_SESSION, SELECT_USER_PERMISSIONS];

/// Session store backed by the `Sessions` table.
pub struct PgSessionStore {
    pool: Arc<PgPool>,
}

impl PgSessionStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn fetch_identity(&self, token: &str) -> Result<Option<Identity>, QueryError> {
        let conn = self.pool.acquire().await?;
        let Some(row) = conn.query_opt(SELECT_SESSION_IDENTITY.name, &[&token]).await? else {
            return Ok(None);
        };
        let user_id: i32 = row.try_get(0)?;
        let username: String = row.try_get(1)?;

        let names: Vec<String> = conn
            .query(SELECT_USER_PERMISSIONS.name, &[&user_id])
            .await?
            .iter()
            .map(|r| r.try_get(0))
            .collect::<Result<_, _>>()?;

        Ok(Some(Identity {
            user_id,
            username,
            permissions: Permissions::new(names),
        }))
    }

    async fn deactivate(&self, token: &str) -> Result<(), QueryError> {
        let conn = self.pool.acquire().await?;
        conn.execute(INVALIDATE_SESSION.name, &[&token]).await?;
        Ok(())
    }
}
