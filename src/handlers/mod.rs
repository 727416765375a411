//! Built-in endpoint plugins.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     catalog() + handlers.enabled → HandlerRegistry::load(.., &PluginContext)
//!
//! Per request (inside a handler):
//!     sessionId cookie → SessionCache::resolve → Identity
//!     → permission check → prepared statement via the pool
//!     → {"status":"ok"|"error","message":...}
//! ```
//!
//! # Design Decisions
//! - The catalog is compiled in; configuration only selects and orders it
//! - Handlers return `Result<Response, RequestError>` internally and render
//!   errors at the boundary

pub mod category;
pub mod last_modified;
pub mod logout;
pub mod question;
pub mod session;
pub mod user;

use std::num::IntErrorKind;
use std::sync::Arc;

use axum::response::{IntoResponse, Response};

use crate::db::PgPool;
use crate::error::RequestError;
use crate::http::request;
use crate::routing::{PluginDescriptor, Request};
use crate::session::{Identity, SessionCache};

/// Shared collaborators handed to every plugin constructor.
#[derive(Clone)]
pub struct PluginContext {
    pub pool: Arc<PgPool>,
    pub sessions: Arc<SessionCache>,
}

static CATALOG: &[PluginDescriptor<PluginContext>] = &[
    category::DESCRIPTOR,
    last_modified::DESCRIPTOR,
    logout::DESCRIPTOR,
    question::DESCRIPTOR,
    session::DESCRIPTOR,
    user::DESCRIPTOR,
];

/// Every plugin compiled into this binary.
pub fn catalog() -> &'static [PluginDescriptor<PluginContext>] {
    CATALOG
}

/// Resolve the caller's session and require `required` permissions.
pub(crate) async fn authorize(
    sessions: &SessionCache,
    request: &Request,
    required: &[&str],
) -> Result<Identity, RequestError> {
    let identity = sessions
        .resolve(request::session_token(request))
        .await?
        .ok_or_else(|| RequestError::unauthorized("Unauthorized"))?;

    if !identity.permissions.allows(required) {
        tracing::debug!(user_id = identity.user_id, ?required, "Permission denied");
        return Err(RequestError::unauthorized("Unauthorized"));
    }
    Ok(identity)
}

/// A numeric id taken from the query string, with its client-facing errors.
pub(crate) struct IdParam {
    pub key: &'static str,
    pub missing: &'static str,
    pub malformed: &'static str,
    pub out_of_range: &'static str,
}

impl IdParam {
    pub fn parse(&self, request: &Request) -> Result<i32, RequestError> {
        let raw = request::query_param(request, self.key)
            .ok_or_else(|| RequestError::bad_request(self.missing))?;
        raw.parse::<i32>().map_err(|e| match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                RequestError::bad_request(self.out_of_range)
            }
            _ => RequestError::bad_request(self.malformed),
        })
    }
}

pub(crate) fn render(result: Result<Response, RequestError>) -> Response {
    result.unwrap_or_else(IntoResponse::into_response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HandlersConfig;
    use crate::routing::HandlerRegistry;
    use crate::session::store;

    #[test]
    fn default_plugins_prepare_without_conflicts() {
        let enabled = HandlersConfig::default().enabled;
        assert_eq!(enabled.len(), catalog().len());

        let mut statements = HandlerRegistry::statements(catalog(), &enabled).unwrap();
        statements.extend(store::STATEMENTS).unwrap();
        assert!(statements.iter().any(|s| s.name == "select_username_from_id"));
        assert!(statements.iter().any(|s| s.name == "create_question"));
    }

    #[test]
    fn id_param_classifies_failures() {
        let id = IdParam {
            key: "id",
            missing: "missing",
            malformed: "malformed",
            out_of_range: "range",
        };
        let parse = |uri: &str| {
            id.parse(&testing::request(axum::http::Method::GET, uri, None, ""))
                .map_err(|e| e.to_string())
        };

        assert_eq!(parse("/x?id=12"), Ok(12));
        assert_eq!(parse("/x?id=-3"), Ok(-3));
        assert_eq!(parse("/x"), Err("missing".to_string()));
        assert_eq!(parse("/x?id="), Err("malformed".to_string()));
        assert_eq!(parse("/x?id=1.5"), Err("malformed".to_string()));
        assert_eq!(parse("/x?id=2147483648"), Err("range".to_string()));
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory session store shared by handler tests.

    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::http::{header, Method};
    use axum::response::Response;
    use bytes::Bytes;
    use serde_json::Value;

    use crate::db::QueryError;
    use crate::routing::Request;
    use crate::security::Permissions;
    use crate::session::{Identity, SessionCache, SessionStore};

    #[derive(Default)]
    pub struct MemoryStore {
        pub sessions: Mutex<HashMap<String, Identity>>,
    }

    #[async_trait]
    impl SessionStore for MemoryStore {
        async fn fetch_identity(&self, token: &str) -> Result<Option<Identity>, QueryError> {
            Ok(self.sessions.lock().unwrap().get(token).cloned())
        }

        async fn deactivate(&self, token: &str) -> Result<(), QueryError> {
            self.sessions.lock().unwrap().remove(token);
            Ok(())
        }
    }

    /// Cache backed by one session `token` for user 7 holding `permissions`.
    pub fn sessions(token: &str, permissions: &[&str]) -> (Arc<SessionCache>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        store.sessions.lock().unwrap().insert(
            token.to_string(),
            Identity {
                user_id: 7,
                username: "ada".into(),
                permissions: Permissions::new(permissions.iter().copied()),
            },
        );
        let cache = SessionCache::new(store.clone(), Duration::from_secs(300), 100);
        (Arc::new(cache), store)
    }

    pub fn request(method: Method, uri: &str, token: Option<&str>, body: &str) -> Request {
        let mut builder = axum::http::Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("sessionId={}", token));
        }
        builder.body(Bytes::copy_from_slice(body.as_bytes())).unwrap()
    }

    pub async fn body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub fn client() -> std::net::SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }
}
