//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and cross-field
//! consistency. All problems are collected so an operator sees every
//! mistake in one run.

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration, returning every error found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be > 0"));
    }

    if config.database.pool_size == 0 {
        errors.push(ValidationError::new("database.pool_size", "must be > 0"));
    }
    if config.database.host.is_empty() {
        errors.push(ValidationError::new("database.host", "must not be empty"));
    }
    if config.database.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("database.connect_timeout_secs", "must be > 0"));
    }

    if config.sessions.ttl_secs == 0 {
        errors.push(ValidationError::new("sessions.ttl_secs", "must be > 0"));
    }
    if config.sessions.max_entries == 0 {
        errors.push(ValidationError::new("sessions.max_entries", "must be > 0"));
    }

    let rl = &config.rate_limit;
    if rl.enabled {
        if rl.max_requests == 0 {
            errors.push(ValidationError::new("rate_limit.max_requests", "must be > 0"));
        }
        if rl.window_ms == 0 {
            errors.push(ValidationError::new("rate_limit.window_ms", "must be > 0"));
        }
        if rl.idle_secs.saturating_mul(1000) < rl.window_ms {
            errors.push(ValidationError::new(
                "rate_limit.idle_secs",
                "must cover at least one window",
            ));
        }
        if rl.sweep_interval_secs == 0 {
            errors.push(ValidationError::new("rate_limit.sweep_interval_secs", "must be > 0"));
        }
    }

    if config.handlers.enabled.is_empty() {
        errors.push(ValidationError::new("handlers.enabled", "at least one handler is required"));
    }
    let mut seen = HashSet::new();
    for name in &config.handlers.enabled {
        if !seen.insert(name.as_str()) {
            errors.push(ValidationError::new(
                "handlers.enabled",
                format!("'{}' listed more than once", name),
            ));
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }
    if config.timeouts.idle_secs < config.timeouts.request_secs {
        errors.push(ValidationError::new(
            "timeouts.idle_secs",
            "must be >= timeouts.request_secs",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_error() {
        let mut config = ServerConfig::default();
        config.listener.bind_address = "not-an-addr".into();
        config.database.pool_size = 0;
        config.handlers.enabled = vec!["session".into(), "session".into()];

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert!(fields.contains(&"listener.bind_address"));
        assert!(fields.contains(&"database.pool_size"));
        assert!(fields.contains(&"handlers.enabled"));
    }

    #[test]
    fn disabled_rate_limit_skips_its_checks() {
        let mut config = ServerConfig::default();
        config.rate_limit.enabled = false;
        config.rate_limit.max_requests = 0;
        assert!(validate_config(&config).is_ok());
    }
}
