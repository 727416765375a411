//! Crate-level error types.
//!
//! `RequestError` is what handlers return with `?`; it renders itself as a
//! JSON error response. `StartupError` collects everything that aborts the
//! process before traffic is served.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::config::ConfigError;
use crate::db::{PoolError, QueryError};
use crate::http::response;
use crate::net::listener::ListenerError;
use crate::routing::PluginLoadError;
use crate::session::SessionError;

/// Failure while serving a single request.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Database(#[from] QueryError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl RequestError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Database(e) => query_status(e),
            Self::Session(SessionError::Store(e)) => query_status(e),
        }
    }
}

fn query_status(err: &QueryError) -> StatusCode {
    match err {
        QueryError::Pool(PoolError::Unavailable(_) | PoolError::Closed) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::BadRequest(message) | Self::Unauthorized(message) => {
                response::error(status, message)
            }
            _ => {
                tracing::error!(error = %self, status = status.as_u16(), "Request failed");
                let message = if status == StatusCode::SERVICE_UNAVAILABLE {
                    "Service temporarily unavailable"
                } else {
                    "Internal server error"
                };
                response::error(status, message)
            }
        }
    }
}

/// Anything that prevents the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Plugin(#[from] PluginLoadError),

    #[error("connection pool construction failed: {0}")]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("invalid {field} '{value}'")]
    Address { field: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_keep_their_message() {
        let err = RequestError::unauthorized("Unauthorized");
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Unauthorized");
    }

    #[test]
    fn exhausted_database_maps_to_503() {
        let err = RequestError::from(QueryError::Pool(PoolError::Unavailable("down".into())));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);

        let err = RequestError::from(QueryError::Pool(PoolError::UnknownStatement("x".into())));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn session_store_failure_maps_like_database() {
        let err = RequestError::from(SessionError::Store(QueryError::Pool(PoolError::Closed)));
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
