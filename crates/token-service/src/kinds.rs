//! Token kinds and their per-kind policy table.
//!
//! Every operation looks up TTL, cache-key prefix and single-use behavior in
//! [`TokenPolicies`] instead of branching per kind.

use crate::errors::TokenError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default session token lifetime (15 minutes).
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(15 * 60);

/// Default password-reset token lifetime (30 minutes).
pub const DEFAULT_PASSWORD_RESET_TTL: Duration = Duration::from_secs(30 * 60);

/// Default e-mail confirmation token lifetime (2 hours).
pub const DEFAULT_EMAIL_CONFIRMATION_TTL: Duration = Duration::from_secs(2 * 60 * 60);

/// Default refresh token lifetime (7 days).
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// The closed set of token kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Session,
    PasswordReset,
    EmailConfirmation,
    Refresh,
}

impl TokenKind {
    /// All kinds, in declaration order.
    pub const ALL: [TokenKind; 4] = [
        TokenKind::Session,
        TokenKind::PasswordReset,
        TokenKind::EmailConfirmation,
        TokenKind::Refresh,
    ];

    /// Stable wire name, used in signed payloads, cache keys and metric labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Session => "session",
            TokenKind::PasswordReset => "password_reset",
            TokenKind::EmailConfirmation => "email_confirmation",
            TokenKind::Refresh => "refresh",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenKind {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TokenKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| TokenError::UnknownTokenType(s.to_string()))
    }
}

/// Behavior of one token kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenPolicy {
    /// Lifetime of both the signed expiry and the cache entry.
    pub ttl: Duration,
    /// Cache key prefix; keys are `{prefix}:{raw}`.
    pub key_prefix: &'static str,
    /// Revoke automatically on successful consumption.
    pub single_use: bool,
}

impl TokenPolicy {
    /// Cache key for a raw token of this kind.
    #[must_use]
    pub fn cache_key(&self, raw: &str) -> String {
        format!("{}:{raw}", self.key_prefix)
    }
}

/// Lookup table from [`TokenKind`] to [`TokenPolicy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPolicies {
    session: TokenPolicy,
    password_reset: TokenPolicy,
    email_confirmation: TokenPolicy,
    refresh: TokenPolicy,
}

impl Default for TokenPolicies {
    fn default() -> Self {
        Self {
            session: TokenPolicy {
                ttl: DEFAULT_SESSION_TTL,
                key_prefix: TokenKind::Session.as_str(),
                single_use: true,
            },
            password_reset: TokenPolicy {
                ttl: DEFAULT_PASSWORD_RESET_TTL,
                key_prefix: TokenKind::PasswordReset.as_str(),
                single_use: true,
            },
            email_confirmation: TokenPolicy {
                ttl: DEFAULT_EMAIL_CONFIRMATION_TTL,
                key_prefix: TokenKind::EmailConfirmation.as_str(),
                single_use: true,
            },
            refresh: TokenPolicy {
                ttl: DEFAULT_REFRESH_TTL,
                key_prefix: TokenKind::Refresh.as_str(),
                single_use: false,
            },
        }
    }
}

impl TokenPolicies {
    /// Policy for `kind`.
    #[must_use]
    pub fn policy(&self, kind: TokenKind) -> &TokenPolicy {
        match kind {
            TokenKind::Session => &self.session,
            TokenKind::PasswordReset => &self.password_reset,
            TokenKind::EmailConfirmation => &self.email_confirmation,
            TokenKind::Refresh => &self.refresh,
        }
    }

    /// Override the TTL for one kind.
    #[must_use]
    pub fn with_ttl(mut self, kind: TokenKind, ttl: Duration) -> Self {
        let policy = match kind {
            TokenKind::Session => &mut self.session,
            TokenKind::PasswordReset => &mut self.password_reset,
            TokenKind::EmailConfirmation => &mut self.email_confirmation,
            TokenKind::Refresh => &mut self.refresh,
        };
        policy.ttl = ttl;
        self
    }
}
