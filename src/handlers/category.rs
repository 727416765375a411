//! `/api/category`: look up, create and delete trivia categories.
//!
//! | Method | Input | Permission |
//! |---|---|---|
//! | `GET` | `?category_name=` | `category.admin` |
//! | `PUT` | `{"category_name": ".."}` | `category.put` |
//! | `DELETE` | `?category_name=` | `category.delete` |

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;

use crate::db::{PgPool, PreparedStatement, QueryError};
use crate::error::RequestError;
use crate::handlers::{authorize, render, PluginContext};
use crate::http::{request, response};
use crate::routing::{PluginDescriptor, PluginLoadError, Request, RequestHandler};
use crate::session::SessionCache;

const SELECT_CATEGORY: PreparedStatement = PreparedStatement::new(
    "select_category",
    "SELECT id FROM public.\"Category\" WHERE category_name = $1 LIMIT 1",
);

const CREATE_CATEGORY: PreparedStatement = PreparedStatement::new(
    "create_category",
    "INSERT INTO public.\"Category\" (category_name) VALUES ($1) \
     ON CONFLICT (category_name) DO NOTHING RETURNING id",
);

const DELETE_CATEGORY: PreparedStatement = PreparedStatement::new(
    "delete_category",
    "DELETE FROM public.\"Category\" WHERE category_name = $1 RETURNING id",
);

pub const DESCRIPTOR: PluginDescriptor<PluginContext> = PluginDescriptor {
    name: "category",
    statements: &[SELECT_CATEGORY, CREATE_CATEGORY, DELETE_CATEGORY],
    construct,
};

fn construct(ctx: &PluginContext) -> Result<Arc<dyn RequestHandler>, PluginLoadError> {
    Ok(Arc::new(CategoryHandler::new(
        Arc::clone(&ctx.sessions),
        Arc::clone(&ctx.pool) as Arc<dyn CategoryStore>,
    )))
}

/// Category persistence. Each call returns the affected category id.
#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn find(&self, name: &str) -> Result<Option<i32>, QueryError>;

    /// `None` when the category already exists.
    async fn create(&self, name: &str) -> Result<Option<i32>, QueryError>;

    /// `None` when there was nothing to delete.
    async fn delete(&self, name: &str) -> Result<Option<i32>, QueryError>;
}

#[async_trait]
impl CategoryStore for PgPool {
    async fn find(&self, name: &str) -> Result<Option<i32>, QueryError> {
        let conn = self.acquire().await?;
        let row = conn.query_opt(SELECT_CATEGORY.name, &[&name]).await?;
        Ok(row.map(|r| r.try_get::<_, i32>(0)).transpose()?)
    }

    async fn create(&self, name: &str) -> Result<Option<i32>, QueryError> {
        let conn = self.acquire().await?;
        let row = conn.query_opt(CREATE_CATEGORY.name, &[&name]).await?;
        Ok(row.map(|r| r.try_get::<_, i32>(0)).transpose()?)
    }

    async fn delete(&self, name: &str) -> Result<Option<i32>, QueryError> {
        let conn = self.acquire().await?;
        let row = conn.query_opt(DELETE_CATEGORY.name, &[&name]).await?;
        Ok(row.map(|r| r.try_get::<_, i32>(0)).transpose()?)
    }
}

#[derive(Debug, Deserialize)]
struct NewCategory {
    category_name: Option<String>,
}

pub struct CategoryHandler {
    sessions: Arc<SessionCache>,
    store: Arc<dyn CategoryStore>,
}

impl CategoryHandler {
    pub fn new(sessions: Arc<SessionCache>, store: Arc<dyn CategoryStore>) -> Self {
        Self { sessions, store }
    }

    async fn serve(&self, request: &Request) -> Result<Response, RequestError> {
        match *request.method() {
            Method::GET => self.get(request).await,
            Method::PUT => self.put(request).await,
            Method::DELETE => self.delete(request).await,
            _ => Err(RequestError::bad_request("Invalid method")),
        }
    }

    async fn get(&self, request: &Request) -> Result<Response, RequestError> {
        authorize(&self.sessions, request, &["category.admin"]).await?;
        let name = category_param(request)?;

        let id = self
            .store
            .find(name)
            .await?
            .ok_or_else(|| RequestError::bad_request("Category not found"))?;

        Ok(response::ok(json!({
            "message": "Category found successfully",
            "category_name": name,
            "id": id,
        })))
    }

    async fn put(&self, request: &Request) -> Result<Response, RequestError> {
        let identity = authorize(&self.sessions, request, &["category.put"]).await?;
        let body: NewCategory = request::json_body(request)?;
        let name = body.category_name.ok_or_else(|| {
            RequestError::bad_request("Invalid request: Missing required field (category_name).")
        })?;

        let id = self
            .store
            .create(&name)
            .await?
            .ok_or_else(|| RequestError::bad_request("Category already exists"))?;

        tracing::info!(user_id = identity.user_id, category = %name, id, "Category created");
        Ok(response::ok(json!({
            "message": "Category created successfully",
            "category": name,
        })))
    }

    async fn delete(&self, request: &Request) -> Result<Response, RequestError> {
        let identity = authorize(&self.sessions, request, &["category.delete"]).await?;
        let name = category_param(request)?;

        self.store
            .delete(name)
            .await?
            .ok_or_else(|| RequestError::bad_request("Category not found"))?;

        tracing::info!(user_id = identity.user_id, category = %name, "Category deleted");
        Ok(response::ok(json!({
            "message": "Category deleted successfully",
            "category_name": name,
        })))
    }
}

fn category_param(request: &Request) -> Result<&str, RequestError> {
    request::query_param(request, "category_name")
        .filter(|name| !name.is_empty())
        .ok_or_else(|| RequestError::bad_request("Invalid category parameters"))
}

#[async_trait]
impl RequestHandler for CategoryHandler {
    fn endpoint_prefix(&self) -> &str {
        "/api/category"
    }

    async fn handle(&self, request: &Request, _client: SocketAddr) -> Response {
        render(self.serve(request).await)
    }
}
