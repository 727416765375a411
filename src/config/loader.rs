//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid environment override {var}: {message}")]
    Env { var: &'static str, message: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: ServerConfig = toml::from_str(&content)?;
    finalize(config, |var| std::env::var(var).ok())
}

/// Apply environment overrides and validate.
///
/// `lookup` abstracts the environment so tests do not mutate process state.
pub fn finalize<F>(mut config: ServerConfig, lookup: F) -> Result<ServerConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    apply_env_overrides(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Database credentials are usually injected by the deployment rather than
/// written into the config file.
fn apply_env_overrides<F>(config: &mut ServerConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let db = &mut config.database;
    if let Some(host) = lookup("TRIVIA_DB_HOST") {
        db.host = host;
    }
    if let Some(port) = lookup("TRIVIA_DB_PORT") {
        db.port = port.parse().map_err(|e: std::num::ParseIntError| ConfigError::Env {
            var: "TRIVIA_DB_PORT",
            message: e.to_string(),
        })?;
    }
    if let Some(user) = lookup("TRIVIA_DB_USERNAME") {
        db.user = user;
    }
    if let Some(password) = lookup("TRIVIA_DB_PASSWORD") {
        db.password = password;
    }
    if let Some(name) = lookup("TRIVIA_DB_NAME") {
        db.dbname = name;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_overrides_database_settings() {
        let env: HashMap<&str, &str> = [
            ("TRIVIA_DB_HOST", "pg.example"),
            ("TRIVIA_DB_PORT", "6543"),
            ("TRIVIA_DB_PASSWORD", "hunter2"),
        ]
        .into_iter()
        .collect();

        let config = finalize(ServerConfig::default(), |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.database.host, "pg.example");
        assert_eq!(config.database.port, 6543);
        assert_eq!(config.database.password, "hunter2");
        assert_eq!(config.database.user, "postgres");
    }

    #[test]
    fn bad_port_override_is_rejected() {
        let err = finalize(ServerConfig::default(), |k| {
            (k == "TRIVIA_DB_PORT").then(|| "five".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::Env { var: "TRIVIA_DB_PORT", .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/nonexistent/trivia.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
