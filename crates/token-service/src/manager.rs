//! Token lifecycle manager.
//!
//! Issues, verifies, consumes and revokes tokens. A token is usable only when
//! the [`Signer`] accepts it AND the cache still holds its marker entry; the
//! cache entry is what makes revocation possible before the signed expiry.
//!
//! # Issuance
//!
//! Each attempt signs a fresh token and reserves `{prefix}:{raw}` with an
//! atomic set-if-absent. A lost reservation is an expected
//! [`IssueAttempt::Collision`], retried with capped exponential backoff until
//! the [`RetryPolicy`] budget runs out.
//!
//! # Consumption
//!
//! Single-use kinds are consumed with an atomic take, so of several
//! concurrent consumers exactly one observes the marker.

use crate::config::TokenConfig;
use crate::errors::TokenError;
use crate::kinds::{TokenKind, TokenPolicies};
use crate::observability::metrics;
use crate::signer::{Signer, VerifiedToken};
use common::cache::{CacheError, CacheStore};
use common::secret::{ExposeSecret, SecretString};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Value stored under every live token key.
pub const TOKEN_MARKER: &str = "true";

/// Default number of issuance attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Default delay after the first collision.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(10);

/// Default upper bound for a single backoff delay.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_millis(100);

/// Async sleep used between issuance attempts.
///
/// Injected so tests can observe the backoff schedule without waiting.
pub type DelayFn = Arc<dyn Fn(Duration) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Issuance retry budget and backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BACKOFF_BASE,
            max_delay: DEFAULT_BACKOFF_MAX,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// `base * 2^(attempt - 1)`, capped at `max_delay`.
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Outcome of one reservation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueAttempt {
    /// The cache entry was created; the token is live.
    Reserved(String),
    /// Another live token already occupies the key.
    Collision,
}

/// Session + refresh tokens issued together at login or rotation.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub session: SecretString,
    pub refresh: SecretString,
}

/// Cache-backed token lifecycle manager.
pub struct TokenLifecycleManager {
    cache: Arc<dyn CacheStore>,
    signer: Arc<dyn Signer>,
    policies: TokenPolicies,
    retry: RetryPolicy,
    delay: DelayFn,
}

impl std::fmt::Debug for TokenLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenLifecycleManager")
            .field("policies", &self.policies)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

fn tokio_sleep() -> DelayFn {
    Arc::new(|duration| -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(tokio::time::sleep(duration))
    })
}

impl TokenLifecycleManager {
    /// Create a manager with default policies and retry budget.
    pub fn new(cache: Arc<dyn CacheStore>, signer: Arc<dyn Signer>) -> Self {
        Self {
            cache,
            signer,
            policies: TokenPolicies::default(),
            retry: RetryPolicy::default(),
            delay: tokio_sleep(),
        }
    }

    /// Create a manager from environment configuration.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Configuration` if the signing key is invalid.
    pub fn from_config(cache: Arc<dyn CacheStore>, config: &TokenConfig) -> Result<Self, TokenError> {
        let signer = config.build_signer()?;
        Ok(Self::new(cache, Arc::new(signer))
            .with_policies(config.policies())
            .with_retry_policy(config.retry_policy()))
    }

    #[must_use]
    pub fn with_policies(mut self, policies: TokenPolicies) -> Self {
        self.policies = policies;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the backoff sleep.
    #[must_use]
    pub fn with_delay_fn(mut self, delay: DelayFn) -> Self {
        self.delay = delay;
        self
    }

    #[must_use]
    pub fn policies(&self) -> &TokenPolicies {
        &self.policies
    }

    /// Issue a new token of `kind` for `subject`.
    ///
    /// # Errors
    ///
    /// - `TokenGenerationFailed` when every attempt collided
    /// - `CacheUnavailable` when the last attempt could not reach the cache
    /// - `Signing` when the signer fails (not retried)
    #[instrument(skip_all, fields(kind = %kind))]
    pub async fn issue(&self, subject: &str, kind: TokenKind) -> Result<SecretString, TokenError> {
        let start = Instant::now();
        let result = self.issue_with_retry(subject, kind).await;

        let status = match &result {
            Ok(_) => "success",
            Err(TokenError::TokenGenerationFailed { .. }) => "collision_exhausted",
            Err(TokenError::CacheUnavailable(_)) => "cache_unavailable",
            Err(_) => "error",
        };
        metrics::record_issuance(kind, status, start.elapsed());
        result
    }

    async fn issue_with_retry(
        &self,
        subject: &str,
        kind: TokenKind,
    ) -> Result<SecretString, TokenError> {
        let policy = *self.policies.policy(kind);
        let max_attempts = self.retry.max_attempts.max(1);
        let mut last_cache_error: Option<CacheError> = None;

        for attempt in 1..=max_attempts {
            let raw = self.signer.sign(subject, kind, policy.ttl)?;

            match self.reserve(&policy.cache_key(&raw), raw, policy.ttl).await {
                Ok(IssueAttempt::Reserved(raw)) => {
                    debug!(target: "token.manager", attempt = attempt, "Token issued");
                    return Ok(SecretString::from(raw));
                }
                Ok(IssueAttempt::Collision) => {
                    metrics::record_issuance_collision(kind);
                    debug!(target: "token.manager", attempt = attempt, "Token key collision");
                    last_cache_error = None;
                }
                Err(e) => {
                    warn!(
                        target: "token.manager",
                        attempt = attempt,
                        error = %e,
                        "Token reservation failed"
                    );
                    last_cache_error = Some(e);
                }
            }

            if attempt < max_attempts {
                (self.delay)(self.retry.delay_after(attempt)).await;
            }
        }

        match last_cache_error {
            Some(e) => Err(TokenError::CacheUnavailable(e)),
            None => {
                error!(
                    target: "token.manager",
                    attempts = max_attempts,
                    "Token issuance exhausted retry budget"
                );
                Err(TokenError::TokenGenerationFailed {
                    attempts: max_attempts,
                })
            }
        }
    }

    async fn reserve(
        &self,
        key: &str,
        raw: String,
        ttl: Duration,
    ) -> Result<IssueAttempt, CacheError> {
        if self.cache.set_if_absent(key, TOKEN_MARKER, ttl).await? {
            Ok(IssueAttempt::Reserved(raw))
        } else {
            Ok(IssueAttempt::Collision)
        }
    }

    /// Signature/expiry/kind check. On failure the cache entry is removed
    /// on a best-effort basis.
    async fn check_signature(
        &self,
        raw: &str,
        kind: TokenKind,
    ) -> Result<Option<VerifiedToken>, TokenError> {
        match self.signer.verify(raw)? {
            Some(verified) if verified.kind == kind => Ok(Some(verified)),
            Some(verified) => {
                debug!(
                    target: "token.manager",
                    expected = %kind,
                    actual = %verified.kind,
                    "Token kind mismatch"
                );
                Ok(None)
            }
            None => {
                let key = self.policies.policy(kind).cache_key(raw);
                if let Err(e) = self.cache.remove(&key).await {
                    debug!(
                        target: "token.manager",
                        error = %e,
                        "Cleanup of rejected token failed"
                    );
                }
                Ok(None)
            }
        }
    }

    async fn marker_present(&self, raw: &str, kind: TokenKind) -> Result<bool, TokenError> {
        let key = self.policies.policy(kind).cache_key(raw);
        Ok(self.cache.get(&key).await?.as_deref() == Some(TOKEN_MARKER))
    }

    /// Whether `raw` is a live token of `kind`. Never revokes.
    ///
    /// # Errors
    ///
    /// - `CacheUnavailable` if the cache cannot be reached
    /// - `UnknownTokenType` if a validly signed token carries an unknown kind
    #[instrument(skip_all, fields(kind = %kind))]
    pub async fn verify(&self, raw: &str, kind: TokenKind) -> Result<bool, TokenError> {
        let result: Result<bool, TokenError> = async {
            if self.check_signature(raw, kind).await?.is_none() {
                return Ok(false);
            }
            self.marker_present(raw, kind).await
        }
        .await;

        metrics::record_verification(kind, verification_outcome(&result));
        result
    }

    /// Verify `raw` and, for single-use kinds, revoke it. Returns the subject.
    ///
    /// # Errors
    ///
    /// - `InvalidToken` if the token is not live (including a lost race
    ///   against a concurrent consumer)
    /// - `CacheUnavailable` if the cache cannot be reached
    #[instrument(skip_all, fields(kind = %kind))]
    pub async fn consume(&self, raw: &str, kind: TokenKind) -> Result<String, TokenError> {
        let result = self.consume_inner(raw, kind).await;

        let outcome = match &result {
            Ok(_) => "consumed",
            Err(TokenError::CacheUnavailable(_)) => "cache_unavailable",
            Err(_) => "invalid",
        };
        metrics::record_verification(kind, outcome);
        result
    }

    async fn consume_inner(&self, raw: &str, kind: TokenKind) -> Result<String, TokenError> {
        let Some(verified) = self.check_signature(raw, kind).await? else {
            return Err(TokenError::InvalidToken);
        };

        let policy = self.policies.policy(kind);
        let live = if policy.single_use {
            self.cache.take(&policy.cache_key(raw)).await?.as_deref() == Some(TOKEN_MARKER)
        } else {
            self.marker_present(raw, kind).await?
        };

        if live {
            Ok(verified.subject)
        } else {
            Err(TokenError::InvalidToken)
        }
    }

    /// Remove the cache entry for `raw`. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns `CacheUnavailable` if the cache cannot be reached.
    #[instrument(skip_all, fields(kind = %kind))]
    pub async fn revoke(&self, raw: &str, kind: TokenKind) -> Result<(), TokenError> {
        let key = self.policies.policy(kind).cache_key(raw);
        self.cache.remove(&key).await?;
        metrics::record_revocation(kind);
        debug!(target: "token.manager", "Token revoked");
        Ok(())
    }

    /// Whether `raw` is a live refresh token. Never revokes.
    ///
    /// # Errors
    ///
    /// Same as [`verify`](Self::verify).
    pub async fn is_refresh_valid(&self, raw: &str) -> Result<bool, TokenError> {
        self.verify(raw, TokenKind::Refresh).await
    }

    /// Issue a session token and a refresh token for `subject`.
    ///
    /// If the refresh token cannot be issued the session token is revoked
    /// again before the error is returned.
    ///
    /// # Errors
    ///
    /// Any error from [`issue`](Self::issue).
    #[instrument(skip_all)]
    pub async fn issue_pair(&self, subject: &str) -> Result<TokenPair, TokenError> {
        let session = self.issue(subject, TokenKind::Session).await?;

        match self.issue(subject, TokenKind::Refresh).await {
            Ok(refresh) => Ok(TokenPair { session, refresh }),
            Err(e) => {
                if let Err(cleanup) = self.revoke(session.expose_secret(), TokenKind::Session).await
                {
                    warn!(
                        target: "token.manager",
                        error = %cleanup,
                        "Could not revoke orphaned session token"
                    );
                }
                Err(e)
            }
        }
    }

    /// Exchange a live refresh token for a new session + refresh pair.
    ///
    /// The new pair is issued before the old refresh token is taken, so a
    /// failed issue leaves the old token usable. The take is atomic: when two
    /// rotations race on the same token, the loser's fresh pair is revoked.
    ///
    /// # Errors
    ///
    /// - `InvalidToken` if `raw` is not a live refresh token
    /// - any error from [`issue_pair`](Self::issue_pair)
    /// - `CacheUnavailable` if the old token cannot be taken
    #[instrument(skip_all)]
    pub async fn rotate_refresh(&self, raw: &str) -> Result<TokenPair, TokenError> {
        let Some(verified) = self.check_signature(raw, TokenKind::Refresh).await? else {
            metrics::record_verification(TokenKind::Refresh, "invalid");
            return Err(TokenError::InvalidToken);
        };

        let pair = self.issue_pair(&verified.subject).await?;

        let key = self.policies.policy(TokenKind::Refresh).cache_key(raw);
        match self.cache.take(&key).await {
            Ok(Some(marker)) if marker == TOKEN_MARKER => {
                metrics::record_verification(TokenKind::Refresh, "consumed");
                info!(target: "token.manager", "Refresh token rotated");
                Ok(pair)
            }
            Ok(_) => {
                metrics::record_verification(TokenKind::Refresh, "invalid");
                self.discard_pair(&pair).await;
                Err(TokenError::InvalidToken)
            }
            Err(e) => {
                metrics::record_verification(TokenKind::Refresh, "cache_unavailable");
                self.discard_pair(&pair).await;
                Err(e.into())
            }
        }
    }

    /// Best-effort revocation of a pair that will never reach the caller.
    async fn discard_pair(&self, pair: &TokenPair) {
        let tokens = [
            (pair.session.expose_secret(), TokenKind::Session),
            (pair.refresh.expose_secret(), TokenKind::Refresh),
        ];
        for (raw, kind) in tokens {
            if let Err(e) = self.revoke(raw, kind).await {
                warn!(
                    target: "token.manager",
                    error = %e,
                    kind = kind.as_str(),
                    "Could not revoke discarded token"
                );
            }
        }
    }
}

fn verification_outcome(result: &Result<bool, TokenError>) -> &'static str {
    match result {
        Ok(true) => "valid",
        Ok(false) => "invalid",
        Err(TokenError::CacheUnavailable(_)) => "cache_unavailable",
        Err(_) => "error",
    }
}
