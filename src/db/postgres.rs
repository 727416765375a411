//! PostgreSQL connection manager.
//!
//! Every connection is opened with the full statement set declared by the
//! loaded plugins, so handlers look statements up by name instead of
//! preparing them per request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_postgres::config::TargetSessionAttrs;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row, Statement};

use crate::config::DatabaseConfig;
use crate::db::pool::{ConnectionManager, Pool, PoolError};
use crate::db::statements::StatementSet;

pub type PgPool = Pool<PgConnector>;

/// Opens prepared connections to PostgreSQL.
pub struct PgConnector {
    config: tokio_postgres::Config,
    statements: Arc<StatementSet>,
    connect_timeout: Duration,
}

impl PgConnector {
    pub fn new(db: &DatabaseConfig, statements: StatementSet) -> Self {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&db.host)
            .port(db.port)
            .user(&db.user)
            .dbname(&db.dbname)
            .connect_timeout(db.connect_timeout())
            .target_session_attrs(TargetSessionAttrs::ReadWrite);
        if !db.password.is_empty() {
            config.password(&db.password);
        }

        Self {
            config,
            statements: Arc::new(statements),
            connect_timeout: db.connect_timeout(),
        }
    }
}

#[async_trait]
impl ConnectionManager for PgConnector {
    type Connection = PgConnection;

    async fn connect(&self) -> Result<PgConnection, PoolError> {
        let (client, connection) =
            tokio::time::timeout(self.connect_timeout, self.config.connect(NoTls))
                .await
                .map_err(|_| PoolError::Connect("timed out".into()))?
                .map_err(|e| PoolError::Connect(e.to_string()))?;

        // The connection object drives the socket; it lives until the client drops.
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "Database connection closed with error");
            }
        });

        let mut prepared = HashMap::with_capacity(self.statements.len());
        for stmt in self.statements.iter() {
            let statement = client
                .prepare(stmt.sql)
                .await
                .map_err(|e| PoolError::Connect(format!("preparing '{}': {}", stmt.name, e)))?;
            prepared.insert(stmt.name, statement);
        }

        tracing::debug!(statements = prepared.len(), "Database connection opened");
        Ok(PgConnection {
            client,
            statements: prepared,
        })
    }

    async fn validate(&self, conn: &mut PgConnection) -> Result<(), PoolError> {
        if conn.client.is_closed() {
            return Err(PoolError::Validation("connection closed".into()));
        }
        conn.client
            .simple_query("SELECT 1")
            .await
            .map(|_| ())
            .map_err(|e| PoolError::Validation(e.to_string()))
    }

    fn is_broken(&self, conn: &PgConnection) -> bool {
        conn.client.is_closed()
    }
}

/// One live PostgreSQL session plus its prepared statements.
pub struct PgConnection {
    client: Client,
    statements: HashMap<&'static str, Statement>,
}

/// Failure of a query issued through a pooled connection.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("query failed: {0}")]
    Postgres(#[from] tokio_postgres::Error),
}

impl PgConnection {
    pub fn statement(&self, name: &str) -> Result<&Statement, PoolError> {
        self.statements
            .get(name)
            .ok_or_else(|| PoolError::UnknownStatement(name.to_string()))
    }

    /// Run a prepared statement expected to return at most one row.
    pub async fn query_opt(
        &self,
        name: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, QueryError> {
        let statement = self.statement(name)?;
        Ok(self.client.query_opt(statement, params).await?)
    }

    /// Run a prepared statement returning all rows.
    pub async fn query(
        &self,
        name: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, QueryError> {
        let statement = self.statement(name)?;
        Ok(self.client.query(statement, params).await?)
    }

    /// Run a prepared statement and return the affected row count.
    pub async fn execute(
        &self,
        name: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, QueryError> {
        let statement = self.statement(name)?;
        Ok(self.client.execute(statement, params).await?)
    }
}
