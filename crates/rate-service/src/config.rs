//! Rate worker configuration.

use crate::cache::{DEFAULT_RATE_CACHE_TTL, DEFAULT_RATE_HISTORY_RETENTION};
use crate::provider::DEFAULT_PROVIDER_TIMEOUT;
use crate::tasks::rate_refresher::DEFAULT_REFRESH_INTERVAL;
use common::config::{parse_var, required_var, ConfigError, ObservabilityConfig, RedisConfig};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

/// Default Prometheus scrape address.
pub const DEFAULT_METRICS_ADDRESS: &str = "0.0.0.0:9090";

/// Default log filter for the worker binary.
pub const DEFAULT_LOG_FILTER: &str = "rate_service=debug,token_service=debug,common=info";

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Rate worker configuration.
#[derive(Debug, Clone)]
pub struct RateWorkerConfig {
    pub redis: RedisConfig,
    pub provider_url: String,
    pub refresh_interval: Duration,
    pub cache_ttl: Duration,
    /// How long closed rate windows are kept after they end.
    pub history_retention: Duration,
    pub provider_timeout: Duration,
    pub metrics_address: SocketAddr,
    pub observability: ObservabilityConfig,
}

fn positive_seconds(
    vars: &HashMap<String, String>,
    name: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let secs: u64 = parse_var(vars, name, default.as_secs())?;
    if secs == 0 {
        return Err(ConfigError::InvalidValue(format!("{name} must be positive")));
    }
    Ok(Duration::from_secs(secs))
}

impl RateWorkerConfig {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`from_vars`](Self::from_vars).
    pub fn from_env() -> Result<Self, ConfigError> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    /// Load configuration from a map of variables.
    ///
    /// # Errors
    ///
    /// - `MissingEnvVar` if `REDIS_URL` or `RATE_PROVIDER_URL` is absent
    /// - `InvalidValue` for unparseable or out-of-range values
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let redis = RedisConfig::from_vars(vars)?;
        let provider_url = required_var(vars, "RATE_PROVIDER_URL")?;
        if !(provider_url.starts_with("http://") || provider_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(
                "RATE_PROVIDER_URL must be an http(s) URL".to_string(),
            ));
        }

        let refresh_interval = positive_seconds(
            vars,
            "RATE_REFRESH_INTERVAL_SECONDS",
            DEFAULT_REFRESH_INTERVAL,
        )?;
        let cache_ttl = positive_seconds(vars, "RATE_CACHE_TTL_SECONDS", DEFAULT_RATE_CACHE_TTL)?;
        // Groups are only rewritten by the refresher, so they must outlive a cycle.
        if cache_ttl <= refresh_interval {
            return Err(ConfigError::InvalidValue(
                "RATE_CACHE_TTL_SECONDS must exceed RATE_REFRESH_INTERVAL_SECONDS".to_string(),
            ));
        }
        let retention_days: u64 = parse_var(
            vars,
            "RATE_HISTORY_RETENTION_DAYS",
            DEFAULT_RATE_HISTORY_RETENTION.as_secs() / SECONDS_PER_DAY,
        )?;
        if retention_days == 0 {
            return Err(ConfigError::InvalidValue(
                "RATE_HISTORY_RETENTION_DAYS must be positive".to_string(),
            ));
        }
        let history_retention =
            Duration::from_secs(retention_days.saturating_mul(SECONDS_PER_DAY));
        let provider_timeout = positive_seconds(
            vars,
            "RATE_PROVIDER_TIMEOUT_SECONDS",
            DEFAULT_PROVIDER_TIMEOUT,
        )?;

        let metrics_address = vars
            .get("RATE_WORKER_METRICS_ADDRESS")
            .map_or(DEFAULT_METRICS_ADDRESS, String::as_str)
            .parse::<SocketAddr>()
            .map_err(|e| {
                ConfigError::InvalidValue(format!("RATE_WORKER_METRICS_ADDRESS: {e}"))
            })?;

        let mut observability = ObservabilityConfig::from_vars(vars, DEFAULT_LOG_FILTER)?;
        observability.json_logs =
            parse_var(vars, "RATE_WORKER_JSON_LOGS", observability.json_logs)?;

        Ok(Self {
            redis,
            provider_url,
            refresh_interval,
            cache_ttl,
            history_retention,
            provider_timeout,
            metrics_address,
            observability,
        })
    }
}
