//! Handler registry and prefix routing.
//!
//! # Responsibilities
//! - Select enabled plugins from the catalog and construct their handlers
//! - Collect the statement set those plugins need
//! - Return the first binding whose prefix matches a request path
//!
//! # Design Decisions
//! - Immutable after construction (shared without locks)
//! - O(n) prefix scan, first match wins
//! - Any load problem is fatal: the endpoint set must be complete before
//!   traffic is served
//! - Shadowed prefixes are reported at load time, not silently reordered

use std::sync::Arc;

use crate::config::BindingOrder;
use crate::db::{StatementConflict, StatementSet};
use crate::routing::handler::{PluginDescriptor, RequestHandler};

/// Startup failure while loading plugins.
#[derive(Debug, thiserror::Error)]
pub enum PluginLoadError {
    #[error("plugin '{0}' is not in the catalog")]
    NotFound(String),

    #[error("plugin '{name}' failed to construct: {reason}")]
    Construct { name: String, reason: String },

    #[error("handler prefix '{0}' must be non-empty and start with '/'")]
    InvalidPrefix(String),

    #[error(transparent)]
    Statement(#[from] StatementConflict),
}

/// A path prefix bound to the handler that serves it.
#[derive(Clone)]
pub struct HandlerBinding {
    prefix: String,
    handler: Arc<dyn RequestHandler>,
}

impl HandlerBinding {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn handler(&self) -> &Arc<dyn RequestHandler> {
        &self.handler
    }
}

impl std::fmt::Debug for HandlerBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerBinding").field("prefix", &self.prefix).finish()
    }
}

/// Ordered set of handler bindings.
#[derive(Debug, Clone)]
pub struct HandlerRegistry {
    bindings: Vec<HandlerBinding>,
}

impl HandlerRegistry {
    /// Build a registry from already-constructed handlers.
    pub fn new(
        handlers: Vec<Arc<dyn RequestHandler>>,
        order: BindingOrder,
    ) -> Result<Self, PluginLoadError> {
        let mut bindings = Vec::with_capacity(handlers.len());
        for handler in handlers {
            let prefix = handler.endpoint_prefix().to_string();
            if !prefix.starts_with('/') {
                return Err(PluginLoadError::InvalidPrefix(prefix));
            }
            bindings.push(HandlerBinding { prefix, handler });
        }

        if order == BindingOrder::LongestPrefixFirst {
            bindings.sort_by(|a, b| {
                b.prefix
                    .len()
                    .cmp(&a.prefix.len())
                    .then_with(|| a.prefix.cmp(&b.prefix))
            });
        }

        let registry = Self { bindings };
        for (earlier, later) in registry.shadowed() {
            tracing::warn!(
                earlier = %earlier,
                later = %later,
                "Handler prefix is shadowed by an earlier binding"
            );
        }
        Ok(registry)
    }

    /// Construct the enabled plugins, in `enabled` order, from the catalog.
    pub fn load<C>(
        catalog: &[PluginDescriptor<C>],
        enabled: &[String],
        order: BindingOrder,
        ctx: &C,
    ) -> Result<Self, PluginLoadError> {
        let mut handlers = Vec::with_capacity(enabled.len());
        for descriptor in select(catalog, enabled)? {
            let handler = (descriptor.construct)(ctx)?;
            tracing::info!(
                plugin = descriptor.name,
                prefix = handler.endpoint_prefix(),
                "Handler loaded"
            );
            handlers.push(handler);
        }
        Self::new(handlers, order)
    }

    /// Statements the enabled plugins need prepared on each connection.
    pub fn statements<C>(
        catalog: &[PluginDescriptor<C>],
        enabled: &[String],
    ) -> Result<StatementSet, PluginLoadError> {
        let mut set = StatementSet::new();
        for descriptor in select(catalog, enabled)? {
            set.extend(descriptor.statements)?;
        }
        Ok(set)
    }

    /// First binding whose prefix is a literal prefix of `path`.
    pub fn route(&self, path: &str) -> Option<&HandlerBinding> {
        self.bindings.iter().find(|b| path.starts_with(&b.prefix))
    }

    pub fn bindings(&self) -> &[HandlerBinding] {
        &self.bindings
    }

    /// Pairs (earlier, later) where the later binding can never match a
    /// path the earlier one does not also match.
    pub fn shadowed(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for (i, earlier) in self.bindings.iter().enumerate() {
            for later in &self.bindings[i + 1..] {
                if later.prefix.starts_with(&earlier.prefix) {
                    pairs.push((earlier.prefix.clone(), later.prefix.clone()));
                }
            }
        }
        pairs
    }
}

fn select<'a, C>(
    catalog: &'a [PluginDescriptor<C>],
    enabled: &[String],
) -> Result<Vec<&'a PluginDescriptor<C>>, PluginLoadError> {
    enabled
        .iter()
        .map(|name| {
            catalog
                .iter()
                .find(|d| d.name == name.as_str())
                .ok_or_else(|| PluginLoadError::NotFound(name.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::PreparedStatement;
    use crate::routing::handler::Request;
    use async_trait::async_trait;
    use axum::response::{IntoResponse, Response};
    use std::net::SocketAddr;

    struct Named(&'static str);

    #[async_trait]
    impl RequestHandler for Named {
        fn endpoint_prefix(&self) -> &str {
            self.0
        }

        async fn handle(&self, _request: &Request, _client: SocketAddr) -> Response {
            self.0.into_response()
        }
    }

    fn handlers(prefixes: &[&'static str]) -> Vec<Arc<dyn RequestHandler>> {
        prefixes
            .iter()
            .map(|p| Arc::new(Named(*p)) as Arc<dyn RequestHandler>)
            .collect()
    }

    fn named(prefix: &'static str) -> Result<Arc<dyn RequestHandler>, PluginLoadError> {
        Ok(Arc::new(Named(prefix)))
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    const CATALOG: &[PluginDescriptor<()>] = &[
        PluginDescriptor {
            name: "category",
            statements: &[PreparedStatement::new("select_category", "SELECT 1")],
            construct: |_| named("/api/category"),
        },
        PluginDescriptor {
            name: "session",
            statements: &[PreparedStatement::new("select_session", "SELECT 2")],
            construct: |_| named("/api/session"),
        },
        PluginDescriptor {
            name: "broken",
            statements: &[],
            construct: |_| {
                Err(PluginLoadError::Construct {
                    name: "broken".into(),
                    reason: "missing entry point".into(),
                })
            },
        },
        PluginDescriptor {
            name: "clash",
            statements: &[PreparedStatement::new("select_category", "SELECT 99")],
            construct: |_| named("/api/clash"),
        },
    ];

    #[test]
    fn first_prefix_match_wins() {
        let registry =
            HandlerRegistry::new(handlers(&["/api/category", "/api/categoryX"]), BindingOrder::Declared)
                .unwrap();
        let binding = registry.route("/api/categoryX/1").unwrap();
        assert_eq!(binding.prefix(), "/api/category");
        assert_eq!(
            registry.shadowed(),
            vec![("/api/category".to_string(), "/api/categoryX".to_string())]
        );
    }

    #[test]
    fn longest_prefix_ordering_removes_shadowing() {
        let registry = HandlerRegistry::new(
            handlers(&["/api/category", "/api/categoryX", "/api"]),
            BindingOrder::LongestPrefixFirst,
        )
        .unwrap();
        let prefixes: Vec<_> = registry.bindings().iter().map(|b| b.prefix()).collect();
        assert_eq!(prefixes, vec!["/api/categoryX", "/api/category", "/api"]);
        assert_eq!(registry.route("/api/categoryX/1").unwrap().prefix(), "/api/categoryX");
        assert!(registry.shadowed().is_empty());
    }

    #[test]
    fn unmatched_path_is_none() {
        let registry = HandlerRegistry::new(handlers(&["/api/session"]), BindingOrder::Declared).unwrap();
        assert!(registry.route("/api/user").is_none());
        assert!(registry.route("/").is_none());
    }

    #[test]
    fn invalid_prefix_is_rejected() {
        let err = HandlerRegistry::new(handlers(&["api"]), BindingOrder::Declared).unwrap_err();
        assert!(matches!(err, PluginLoadError::InvalidPrefix(p) if p == "api"));
    }

    #[test]
    fn load_follows_enabled_order() {
        let registry =
            HandlerRegistry::load(CATALOG, &names(&["session", "category"]), BindingOrder::Declared, &())
                .unwrap();
        let prefixes: Vec<_> = registry.bindings().iter().map(|b| b.prefix()).collect();
        assert_eq!(prefixes, vec!["/api/session", "/api/category"]);
    }

    #[test]
    fn unknown_plugin_is_fatal() {
        let err =
            HandlerRegistry::load(CATALOG, &names(&["session", "user"]), BindingOrder::Declared, &())
                .unwrap_err();
        assert!(matches!(err, PluginLoadError::NotFound(n) if n == "user"));
    }

    #[test]
    fn construction_failure_is_fatal() {
        let err = HandlerRegistry::load(CATALOG, &names(&["broken"]), BindingOrder::Declared, &())
            .unwrap_err();
        assert!(matches!(err, PluginLoadError::Construct { .. }));
    }

    #[test]
    fn statements_cover_enabled_plugins_only() {
        let set = HandlerRegistry::statements(CATALOG, &names(&["session"])).unwrap();
        let prepared: Vec<_> = set.iter().map(|s| s.name).collect();
        assert_eq!(prepared, vec!["select_session"]);

        let err = HandlerRegistry::statements(CATALOG, &names(&["category", "clash"])).unwrap_err();
        assert!(matches!(err, PluginLoadError::Statement(_)));
    }
}
