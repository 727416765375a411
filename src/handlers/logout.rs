//! `POST /api/logout`: end the caller's session.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;

use crate::error::RequestError;
use crate::handlers::{render, PluginContext};
use crate::http::{request, response};
use crate::routing::{PluginDescriptor, PluginLoadError, Request, RequestHandler};
use crate::session::SessionCache;

pub const DESCRIPTOR: PluginDescriptor<PluginContext> = PluginDescriptor {
    name: "logout",
    statements: &[],
    construct,
};

fn construct(ctx: &PluginContext) -> Result<Arc<dyn RequestHandler>, PluginLoadError> {
    Ok(Arc::new(LogoutHandler::new(Arc::clone(&ctx.sessions))))
}

#[derive(Debug, Deserialize)]
struct LogoutRequest {
    user_id: Option<i32>,
}

pub struct LogoutHandler {
    sessions: Arc<SessionCache>,
}

impl LogoutHandler {
    pub fn new(sessions: Arc<SessionCache>) -> Self {
        Self { sessions }
    }

    async fn logout(&self, request: &Request) -> Result<Response, RequestError> {
        if request.method() != Method::POST {
            return Err(RequestError::bad_request("Invalid request method"));
        }

        let body: LogoutRequest = request::json_body(request)?;
        let user_id = body
            .user_id
            .ok_or_else(|| RequestError::bad_request("Invalid user id parameters"))?;

        let token = request::session_token(request);
        if token.is_empty() {
            return Err(RequestError::unauthorized("Invalid or expired session"));
        }

        let owner = self.sessions.resolve(token).await?.map(|identity| identity.user_id);
        if owner != Some(user_id) {
            return Err(RequestError::unauthorized("Session id does not match user id!"));
        }

        self.sessions.invalidate(token).await?;
        tracing::info!(user_id, "User logged out");
        Ok(response::ok(json!({ "message": "Logout successful" })))
    }
}

#[async_trait]
impl RequestHandler for LogoutHandler {
    fn endpoint_prefix(&self) -> &str {
        "/api/logout"
    }

    async fn handle(&self, request: &Request, _client: SocketAddr) -> Response {
        render(self.logout(request).await)
    }
}
