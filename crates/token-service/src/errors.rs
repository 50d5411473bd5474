//! Token service error types.
//!
//! Internal details are logged server-side; [`TokenError::client_message`]
//! gives the only text that may reach an end user.

use crate::signer::SignerError;
use common::cache::CacheError;
use thiserror::Error;

/// Generic message for every token failure a user can observe.
///
/// Expired, revoked, malformed and "could not check" all read the same so the
/// response cannot be used to enumerate token state.
pub const GENERIC_TOKEN_MESSAGE: &str = "The token is invalid or expired";

/// Token service error type.
#[derive(Debug, Clone, Error)]
pub enum TokenError {
    /// The cache could not be reached; token state is unknown.
    #[error("Token cache unavailable: {0}")]
    CacheUnavailable(#[from] CacheError),

    /// Signature, expiry, kind or cache-state check failed.
    #[error("Invalid token")]
    InvalidToken,

    /// A token kind name outside the closed set was encountered.
    #[error("Unknown token type: {0}")]
    UnknownTokenType(String),

    /// Every issuance attempt collided with an existing token.
    #[error("Token generation failed after {attempts} attempts")]
    TokenGenerationFailed { attempts: u32 },

    /// The signer could not produce a token.
    #[error("Token signing failed: {0}")]
    Signing(String),

    /// Invalid key material or policy configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<SignerError> for TokenError {
    fn from(err: SignerError) -> Self {
        match err {
            SignerError::UnknownKind(kind) => TokenError::UnknownTokenType(kind),
            SignerError::Signing(msg) => TokenError::Signing(msg),
            SignerError::InvalidKey(msg) => TokenError::Configuration(msg),
        }
    }
}

impl TokenError {
    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> &'static str {
        match self {
            TokenError::CacheUnavailable(_)
            | TokenError::InvalidToken
            | TokenError::UnknownTokenType(_) => GENERIC_TOKEN_MESSAGE,
            TokenError::TokenGenerationFailed { .. }
            | TokenError::Signing(_)
            | TokenError::Configuration(_) => "An internal error occurred",
        }
    }

    /// Whether the caller may retry the same operation later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, TokenError::CacheUnavailable(_))
    }
}
