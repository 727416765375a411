//! `GET /api/session`: report who the `sessionId` cookie belongs to.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::Method;
use axum::response::Response;
use serde_json::json;

use crate::error::RequestError;
use crate::handlers::{render, PluginContext};
use crate::http::{request, response};
use crate::routing::{PluginDescriptor, PluginLoadError, Request, RequestHandler};
use crate::session::SessionCache;

pub const DESCRIPTOR: PluginDescriptor<PluginContext> = PluginDescriptor {
    name: "session",
    statements: &[],
    construct,
};

fn construct(ctx: &PluginContext) -> Result<Arc<dyn RequestHandler>, PluginLoadError> {
    Ok(Arc::new(SessionHandler::new(Arc::clone(&ctx.sessions))))
}

pub struct SessionHandler {
    sessions: Arc<SessionCache>,
}

impl SessionHandler {
    pub fn new(sessions: Arc<SessionCache>) -> Self {
        Self { sessions }
    }

    async fn validate(&self, request: &Request) -> Result<Response, RequestError> {
        if request.method() != Method::GET {
            return Err(RequestError::bad_request("Invalid request method"));
        }

        let token = request::session_token(request);
        let identity = self
            .sessions
            .resolve(token)
            .await?
            .ok_or_else(|| RequestError::unauthorized("Invalid or expired session"))?;

        Ok(response::ok(json!({
            "message": "Session validated successfully",
            "user_id": identity.user_id,
            "username": identity.username,
        })))
    }
}

#[async_trait]
impl RequestHandler for SessionHandler {
    fn endpoint_prefix(&self) -> &str {
        "/api/session"
    }

    async fn handle(&self, request: &Request, _client: SocketAddr) -> Response {
        render(self.validate(request).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn valid_session_returns_identity() {
        let (sessions, _) = testing::sessions("tok", &[]);
        let handler = SessionHandler::new(sessions);

        let res = handler
            .handle(&testing::request(Method::GET, "/api/session", Some("tok"), ""), testing::client())
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            testing::body(res).await,
            json!({
                "status": "ok",
                "message": {
                    "message": "Session validated successfully",
                    "user_id": 7,
                    "username": "ada",
                }
            })
        );
    }

    #[tokio::test]
    async fn missing_or_unknown_session_is_401() {
        let (sessions, _) = testing::sessions("tok", &[]);
        let handler = SessionHandler::new(sessions);

        for token in [None, Some("other")] {
            let res = handler
                .handle(&testing::request(Method::GET, "/api/session", token, ""), testing::client())
                .await;
            assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
            assert_eq!(testing::body(res).await["message"], "Invalid or expired session");
        }
    }

    #[tokio::test]
    async fn other_methods_are_rejected() {
        let (sessions, _) = testing::sessions("tok", &[]);
        let handler = SessionHandler::new(sessions);
        let res = handler
            .handle(&testing::request(Method::POST, "/api/session", Some("tok"), ""), testing::client())
            .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
