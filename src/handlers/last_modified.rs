//! `GET /api/last_modified?table_name=`: newest `last_modified` stamp of a
//! table, so clients can tell whether their cached copy is stale.
//!
//! Only tables listed in [`TABLES`] can be queried; each has its own
//! prepared statement since identifiers cannot be bound as parameters.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use axum::response::Response;
use serde_json::json;

use crate::db::{PgPool, PreparedStatement, QueryError};
use crate::error::RequestError;
use crate::handlers::{authorize, render, PluginContext};
use crate::http::{request, response};
use crate::routing::{PluginDescriptor, PluginLoadError, Request, RequestHandler};
use crate::session::SessionCache;

/// Queryable tables and the statement reading each one.
pub const TABLES: &[(&str, PreparedStatement)] = &[
    (
        "Category",
        PreparedStatement::new(
            "last_modified_category",
            "SELECT last_modified::text FROM public.\"Category\" \
             ORDER BY last_modified DESC LIMIT 1",
        ),
    ),
    (
        "Question",
        PreparedStatement::new(
            "last_modified_question",
            "SELECT last_modified::text FROM public.\"Question\" \
             ORDER BY last_modified DESC LIMIT 1",
        ),
    ),
    (
        "Users",
        PreparedStatement::new(
            "last_modified_users",
            "SELECT last_modified::text FROM public.\"Users\" \
             ORDER BY last_modified DESC LIMIT 1",
        ),
    ),
];

const STATEMENTS: &[PreparedStatement] = &[TABLES[0].1, TABLES[1].1, TABLES[2].1];

pub const DESCRIPTOR: PluginDescriptor<PluginContext> = PluginDescriptor {
    name: "last_modified",
    statements: STATEMENTS,
    construct,
};

fn construct(ctx: &PluginContext) -> Result<Arc<dyn RequestHandler>, PluginLoadError> {
    Ok(Arc::new(LastModifiedHandler::new(
        Arc::clone(&ctx.sessions),
        Arc::clone(&ctx.pool) as Arc<dyn LastModifiedStore>,
    )))
}

#[async_trait]
pub trait LastModifiedStore: Send + Sync {
    /// Run `statement`; `None` when the table is empty.
    async fn last_modified(&self, statement: &PreparedStatement) -> Result<Option<String>, QueryError>;
}

#[async_trait]
impl LastModifiedStore for PgPool {
    async fn last_modified(&self, statement: &PreparedStatement) -> Result<Option<String>, QueryError> {
        let conn = self.acquire().await?;
        let row = conn.query_opt(statement.name, &[]).await?;
        Ok(row
            .map(|r| r.try_get::<_, Option<String>>(0))
            .transpose()?
            .flatten())
    }
}

pub struct LastModifiedHandler {
    sessions: Arc<SessionCache>,
    store: Arc<dyn LastModifiedStore>,
}

impl LastModifiedHandler {
    pub fn new(sessions: Arc<SessionCache>, store: Arc<dyn LastModifiedStore>) -> Self {
        Self { sessions, store }
    }

    async fn serve(&self, request: &Request) -> Result<Response, RequestError> {
        if request.method() != Method::GET {
            return Err(RequestError::bad_request("Invalid method"));
        }

        let table = request::query_param(request, "table_name")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| RequestError::bad_request("Invalid parameters"))?;

        let permission = format!("{}.admin", table);
        authorize(&self.sessions, request, &[permission.as_str()]).await?;

        let (_, statement) = TABLES
            .iter()
            .find(|(name, _)| *name == table)
            .ok_or_else(|| RequestError::bad_request("Table not found"))?;

        let last_modified = self
            .store
            .last_modified(statement)
            .await?
            .ok_or_else(|| RequestError::bad_request("Table not found"))?;

        Ok(response::ok(json!({
            "message": "Last modified date found successfully",
            "last_modified": last_modified,
        })))
    }
}

#[async_trait]
impl RequestHandler for LastModifiedHandler {
    fn endpoint_prefix(&self) -> &str {
        "/api/last_modified"
    }

    async fn handle(&self, request: &Request, _client: SocketAddr) -> Response {
        render(self.serve(request).await)
    }
}
