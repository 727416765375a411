//! `GET /api/user?user_id=`: username for a user id.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use axum::response::Response;
use serde_json::json;

use crate::db::{PgPool, PreparedStatement, QueryError};
use crate::error::RequestError;
use crate::handlers::{render, IdParam, PluginContext};
use crate::http::response;
use crate::routing::{PluginDescriptor, PluginLoadError, Request, RequestHandler};

const SELECT_USERNAME: PreparedStatement = PreparedStatement::new(
    "select_username_from_id",
    "SELECT username FROM public.\"Users\" WHERE id = $1 LIMIT 1",
);

const USER_ID: IdParam = IdParam {
    key: "user_id",
    missing: "Invalid user id parameters",
    malformed: "Invalid user id format",
    out_of_range: "User id out of range",
};

pub const DESCRIPTOR: PluginDescriptor<PluginContext> = PluginDescriptor {
    name: "user",
    statements: &[SELECT_USERNAME],
    construct,
};

fn construct(ctx: &PluginContext) -> Result<Arc<dyn RequestHandler>, PluginLoadError> {
    Ok(Arc::new(UserHandler::new(
        Arc::clone(&ctx.pool) as Arc<dyn UserStore>
    )))
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn username(&self, user_id: i32) -> Result<Option<String>, QueryError>;
}

#[async_trait]
impl UserStore for PgPool {
    async fn username(&self, user_id: i32) -> Result<Option<String>, QueryError> {
        let conn = self.acquire().await?;
        let row = conn.query_opt(SELECT_USERNAME.name, &[&user_id]).await?;
        Ok(row.map(|r| r.try_get::<_, String>(0)).transpose()?)
    }
}

pub struct UserHandler {
    store: Arc<dyn UserStore>,
}

impl UserHandler {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    async fn serve(&self, request: &Request) -> Result<Response, RequestError> {
        if request.method() != Method::GET {
            return Err(RequestError::bad_request("Invalid request method"));
        }

        let user_id = USER_ID.parse(request)?;
        let username = self
            .store
            .username(user_id)
            .await?
            .filter(|name| !name.is_empty())
            .ok_or_else(|| RequestError::bad_request("User not found"))?;

        Ok(response::ok(json!({
            "message": "User found successfully",
            "user_id": user_id,
            "username": username,
        })))
    }
}

#[async_trait]
impl RequestHandler for UserHandler {
    fn endpoint_prefix(&self) -> &str {
        "/api/user"
    }

    async fn handle(&self, request: &Request, _client: SocketAddr) -> Response {
        render(self.serve(request).await)
    }
}
