//! Common configuration types for Fintrack components.
//!
//! Services load configuration from environment variables through
//! `from_env()`, which delegates to `from_vars()` so tests can pass a plain
//! `HashMap`. Sensitive fields are redacted in Debug output.

use crate::secret::SecretString;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Read a required variable.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if the variable is absent or blank.
pub fn required_var(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    match vars.get(name) {
        Some(value) if !value.trim().is_empty() => Ok(value.clone()),
        _ => Err(ConfigError::MissingEnvVar(name.to_string())),
    }
}

/// Read an optional variable, parsing it into `T` or falling back to `default`.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` if the variable is present but does not parse.
pub fn parse_var<T: FromStr>(
    vars: &HashMap<String, String>,
    name: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{name}={raw:?}"))),
        None => Ok(default),
    }
}

/// Redis configuration.
#[derive(Clone)]
pub struct RedisConfig {
    /// Redis connection URL. May carry credentials, so it is never logged.
    pub url: SecretString,
}

impl fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConfig")
            .field("url", &"[REDACTED]")
            .finish()
    }
}

impl RedisConfig {
    /// Load from `REDIS_URL`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `REDIS_URL` is not set.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Ok(Self {
            url: SecretString::from(required_var(vars, "REDIS_URL")?),
        })
    }
}

/// Observability configuration.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Default log filter used when `RUST_LOG` is not set.
    pub log_level: String,
    /// Emit JSON-formatted logs.
    pub json_logs: bool,
}

impl ObservabilityConfig {
    /// Load from `LOG_LEVEL` and `JSON_LOGS`, falling back to `default_filter`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `JSON_LOGS` is not a boolean.
    pub fn from_vars(
        vars: &HashMap<String, String>,
        default_filter: &str,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            log_level: vars
                .get("LOG_LEVEL")
                .cloned()
                .unwrap_or_else(|| default_filter.to_string()),
            json_logs: parse_var(vars, "JSON_LOGS", false)?,
        })
    }
}
