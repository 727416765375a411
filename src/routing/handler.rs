//! Plugin contract.
//!
//! A plugin is a static descriptor: a name, the SQL statements its handler
//! needs prepared on every pooled connection, and a constructor. The
//! constructed handler declares the path prefix it serves.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use bytes::Bytes;

use crate::db::PreparedStatement;
use crate::routing::registry::PluginLoadError;

/// A fully buffered inbound request.
pub type Request = axum::http::Request<Bytes>;

/// Serves every request whose path starts with its prefix.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    fn endpoint_prefix(&self) -> &str;

    async fn handle(&self, request: &Request, client: SocketAddr) -> Response;
}

/// Constructor signature exposed by every plugin.
pub type Construct<C> = fn(&C) -> Result<Arc<dyn RequestHandler>, PluginLoadError>;

/// Entry in the compiled plugin catalog.
pub struct PluginDescriptor<C> {
    pub name: &'static str,
    pub statements: &'static [PreparedStatement],
    pub construct: Construct<C>,
}

impl<C> std::fmt::Debug for PluginDescriptor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("name", &self.name)
            .field("statements", &self.statements.len())
            .finish()
    }
}
