//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, connection cap).
    pub listener: ListenerConfig,

    /// Database connection and pool settings.
    pub database: DatabaseConfig,

    /// Session cache settings.
    pub sessions: SessionConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Plugin selection and ordering.
    pub handlers: HandlersConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

/// PostgreSQL connection parameters and pool sizing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,

    /// Number of connections opened at startup.
    pub pool_size: usize,

    /// Connections idle longer than this are validated before reuse.
    pub freshness_secs: u64,

    /// Upper bound on establishing a single connection.
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            dbname: "trivia".to_string(),
            pool_size: 8,
            freshness_secs: 60,
            connect_timeout_secs: 5,
        }
    }
}

impl DatabaseConfig {
    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Session cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Lifetime of a cached identity in seconds.
    pub ttl_secs: u64,

    /// Maximum number of cached sessions.
    pub max_entries: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            max_entries: 10_000,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Maximum requests per client within one window.
    pub max_requests: u32,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Clients idle for longer than this are dropped by the sweeper.
    pub idle_secs: u64,

    /// Tracked-client count that triggers an inline sweep.
    pub max_clients: usize,

    /// Interval of the background sweep task.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 5,
            window_ms: 1000,
            idle_secs: 60,
            max_clients: 100_000,
            sweep_interval_secs: 30,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_secs)
    }
}

/// How bindings are ordered when prefixes overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BindingOrder {
    /// Keep the order of `handlers.enabled`.
    #[default]
    Declared,
    /// Longest prefix first, ties broken lexicographically.
    LongestPrefixFirst,
}

/// Plugin selection.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HandlersConfig {
    /// Plugin names to load, in registration order.
    pub enabled: Vec<String>,

    pub ordering: BindingOrder,
}

impl Default for HandlersConfig {
    fn default() -> Self {
        Self {
            enabled: vec![
                "category".to_string(),
                "last_modified".to_string(),
                "logout".to_string(),
                "question".to_string(),
                "session".to_string(),
                "user".to_string(),
            ],
            ordering: BindingOrder::Declared,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Handler execution deadline in seconds.
    pub request_secs: u64,

    /// Whole-connection deadline (read + handle + write) in seconds.
    pub idle_secs: u64,

    /// Grace period for in-flight connections on shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            idle_secs: 60,
            shutdown_grace_secs: 10,
        }
    }
}

/// Request size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            [database]
            host = "db.internal"
            pool_size = 2

            [handlers]
            enabled = ["session"]
            ordering = "longest_prefix_first"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.pool_size, 2);
        assert_eq!(config.database.port, 5432);
        assert_eq!(config.handlers.enabled, vec!["session".to_string()]);
        assert_eq!(config.handlers.ordering, BindingOrder::LongestPrefixFirst);
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window(), Duration::from_secs(1));
    }
}
