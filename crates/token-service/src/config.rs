//! Token service configuration.
//!
//! Loaded from environment variables. The signing key is held in a
//! [`SecretString`] and redacted from Debug output.

use crate::errors::TokenError;
use crate::kinds::{TokenKind, TokenPolicies};
use crate::manager::{RetryPolicy, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX, DEFAULT_MAX_ATTEMPTS};
use crate::signer::{Ed25519Signer, DEFAULT_CLOCK_SKEW};
use common::config::{parse_var, required_var, ConfigError};
use common::secret::SecretString;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Token service configuration.
#[derive(Clone)]
pub struct TokenConfig {
    /// Base64 PKCS#8 Ed25519 private key (`TOKEN_SIGNING_KEY`).
    pub signing_key: SecretString,
    pub session_ttl: Duration,
    pub password_reset_ttl: Duration,
    pub email_confirmation_ttl: Duration,
    pub refresh_ttl: Duration,
    pub retry: RetryPolicy,
    /// Tolerance for `iat` in the future.
    pub clock_skew: Duration,
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("signing_key", &"[REDACTED]")
            .field("session_ttl", &self.session_ttl)
            .field("password_reset_ttl", &self.password_reset_ttl)
            .field("email_confirmation_ttl", &self.email_confirmation_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("retry", &self.retry)
            .field("clock_skew", &self.clock_skew)
            .finish()
    }
}

fn seconds_var(
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

fn millis_var(
    vars: &HashMap<String, String>,
    name: &str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    let millis: u64 = parse_var(vars, name, u64::try_from(default.as_millis()).unwrap_or(u64::MAX))?;
    Ok(Duration::from_millis(millis))
}

impl TokenConfig {
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
    /// - `MissingEnvVar` if `TOKEN_SIGNING_KEY` is absent
    /// - `InvalidValue` for unparseable or out-of-range values
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = TokenPolicies::default();
        let signing_key = SecretString::from(required_var(vars, "TOKEN_SIGNING_KEY")?);

        let session_ttl = seconds_var(
            vars,
            "TOKEN_SESSION_TTL_SECONDS",
            defaults.policy(TokenKind::Session).ttl,
        )?;
        let password_reset_ttl = seconds_var(
            vars,
            "TOKEN_PASSWORD_RESET_TTL_SECONDS",
            defaults.policy(TokenKind::PasswordReset).ttl,
        )?;
        let email_confirmation_ttl = seconds_var(
            vars,
            "TOKEN_EMAIL_CONFIRMATION_TTL_SECONDS",
            defaults.policy(TokenKind::EmailConfirmation).ttl,
        )?;
        let refresh_ttl = seconds_var(
            vars,
            "TOKEN_REFRESH_TTL_SECONDS",
            defaults.policy(TokenKind::Refresh).ttl,
        )?;

        let max_attempts: u32 = parse_var(vars, "TOKEN_ISSUE_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "TOKEN_ISSUE_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        let base_delay = millis_var(vars, "TOKEN_ISSUE_BACKOFF_BASE_MS", DEFAULT_BACKOFF_BASE)?;
        let max_delay = millis_var(vars, "TOKEN_ISSUE_BACKOFF_MAX_MS", DEFAULT_BACKOFF_MAX)?;
        if base_delay > max_delay {
            return Err(ConfigError::InvalidValue(
                "TOKEN_ISSUE_BACKOFF_BASE_MS exceeds TOKEN_ISSUE_BACKOFF_MAX_MS".to_string(),
            ));
        }

        let clock_skew = Duration::from_secs(parse_var(
            vars,
            "TOKEN_CLOCK_SKEW_SECONDS",
            DEFAULT_CLOCK_SKEW.as_secs(),
        )?);

        Ok(Self {
            signing_key,
            session_ttl,
            password_reset_ttl,
            email_confirmation_ttl,
            refresh_ttl,
            retry: RetryPolicy {
                max_attempts,
                base_delay,
                max_delay,
            },
            clock_skew,
        })
    }

    /// Policy table with the configured TTLs.
    #[must_use]
    pub fn policies(&self) -> TokenPolicies {
        TokenPolicies::default()
            .with_ttl(TokenKind::Session, self.session_ttl)
            .with_ttl(TokenKind::PasswordReset, self.password_reset_ttl)
            .with_ttl(TokenKind::EmailConfirmation, self.email_confirmation_ttl)
            .with_ttl(TokenKind::Refresh, self.refresh_ttl)
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Build the production signer from the configured key.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Configuration` if the key cannot be decoded.
    pub fn build_signer(&self) -> Result<Ed25519Signer, TokenError> {
        Ed25519Signer::from_base64_pkcs8(&self.signing_key, self.clock_skew)
            .map_err(TokenError::from)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        let (_, key) = Ed25519Signer::generate(DEFAULT_CLOCK_SKEW).unwrap();
        HashMap::from([(
            "TOKEN_SIGNING_KEY".to_string(),
            common::secret::ExposeSecret::expose_secret(&key).to_string(),
        )])
    }

    #[test]
    fn test_defaults() {
        let config = TokenConfig::from_vars(&base_vars()).unwrap();
        assert_eq!(config.session_ttl, Duration::from_secs(900));
        assert_eq!(config.password_reset_ttl, Duration::from_secs(1800));
        assert_eq!(config.email_confirmation_ttl, Duration::from_secs(7200));
        assert_eq!(config.refresh_ttl, Duration::from_secs(604_800));
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.clock_skew, Duration::from_secs(300));
        assert!(config.build_signer().is_ok());
    }

    #[test]
    fn test_missing_signing_key() {
        let result = TokenConfig::from_vars(&HashMap::new());
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "TOKEN_SIGNING_KEY"));
    }

    #[test]
    fn test_ttl_overrides_flow_into_policies() {
        let mut vars = base_vars();
        vars.insert("TOKEN_SESSION_TTL_SECONDS".to_string(), "60".to_string());
        vars.insert("TOKEN_ISSUE_MAX_ATTEMPTS".to_string(), "2".to_string());

        let config = TokenConfig::from_vars(&vars).unwrap();
        let policies = config.policies();
        assert_eq!(policies.policy(TokenKind::Session).ttl, Duration::from_secs(60));
        assert_eq!(config.retry_policy().max_attempts, 2);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        for (name, value) in [
            ("TOKEN_SESSION_TTL_SECONDS", "0"),
            ("TOKEN_REFRESH_TTL_SECONDS", "a week"),
            ("TOKEN_ISSUE_MAX_ATTEMPTS", "0"),
            ("TOKEN_ISSUE_BACKOFF_BASE_MS", "500"),
        ] {
            let mut vars = base_vars();
            vars.insert(name.to_string(), value.to_string());
            assert!(
                matches!(TokenConfig::from_vars(&vars), Err(ConfigError::InvalidValue(_))),
                "{name}={value}"
            );
        }
    }

    #[test]
    fn test_bad_signing_key_fails_at_build() {
        let vars = HashMap::from([("TOKEN_SIGNING_KEY".to_string(), "bm90LWEta2V5".to_string())]);
        let config = TokenConfig::from_vars(&vars).unwrap();
        assert!(matches!(
            config.build_signer(),
            Err(TokenError::Configuration(_))
        ));
    }

    #[test]
    fn test_debug_redacts_signing_key() {
        let vars = base_vars();
        let key = vars.get("TOKEN_SIGNING_KEY").unwrap().clone();
        let config = TokenConfig::from_vars(&vars).unwrap();
        let debug = format!("{config:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains(&key));
    }
}
