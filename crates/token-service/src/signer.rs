//! Stateless token signing and verification.
//!
//! The [`Signer`] is a pure function of its input: it knows nothing about
//! revocation. Signature failures and expiry both collapse to `Ok(None)`;
//! the manager pairs the result with the cache check.
//!
//! [`Ed25519Signer`] produces EdDSA JWTs with claims
//! `{ sub, kind, exp, iat, jti }`.
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing
//! - Only `EdDSA` is accepted; expiry has zero leeway
//! - `iat` more than the clock skew in the future is rejected
//! - The `sub` claim (an e-mail address) is redacted in Debug output

use crate::kinds::TokenKind;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use ring::rand::SystemRandom;
use ring::signature::{Ed25519KeyPair, KeyPair};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

/// Maximum accepted token size in bytes (4KB). Checked before any decoding.
pub const MAX_TOKEN_SIZE_BYTES: usize = 4096;

/// Default tolerance for `iat` in the future (5 minutes).
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Errors from the signer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerError {
    /// Signing operation failed.
    #[error("Signing failed: {0}")]
    Signing(String),

    /// Key material could not be parsed.
    #[error("Invalid signing key: {0}")]
    InvalidKey(String),

    /// A correctly signed token carries a kind outside the closed set.
    #[error("Unknown token kind: {0}")]
    UnknownKind(String),
}

/// Result of a successful signature + expiry check.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    /// Subject (user e-mail) - redacted in Debug output.
    pub subject: String,
    /// Kind embedded in the signed payload.
    pub kind: TokenKind,
    /// Expiry (Unix epoch seconds).
    pub expires_at: i64,
}

impl fmt::Debug for VerifiedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifiedToken")
            .field("subject", &"[REDACTED]")
            .field("kind", &self.kind)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Stateless signer/verifier collaborator.
pub trait Signer: Send + Sync {
    /// Produce a signed token for `subject` of `kind`, expiring after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns `SignerError::Signing` if the signing operation fails.
    fn sign(&self, subject: &str, kind: TokenKind, ttl: Duration) -> Result<String, SignerError>;

    /// Check signature and expiry. `Ok(None)` means the token is not acceptable.
    ///
    /// # Errors
    ///
    /// Returns `SignerError::UnknownKind` if the signature is valid but the
    /// embedded kind is not recognized.
    fn verify(&self, raw: &str) -> Result<Option<VerifiedToken>, SignerError>;
}

/// Signed payload.
#[derive(Clone, Serialize, Deserialize)]
struct TokenClaims {
    sub: String,
    kind: String,
    exp: i64,
    iat: i64,
    jti: String,
}

impl fmt::Debug for TokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenClaims")
            .field("sub", &"[REDACTED]")
            .field("kind", &self.kind)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .finish_non_exhaustive()
    }
}

/// EdDSA (Ed25519) JWT signer.
pub struct Ed25519Signer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    key_id: String,
    clock_skew: Duration,
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("key_id", &self.key_id)
            .field("clock_skew", &self.clock_skew)
            .finish_non_exhaustive()
    }
}

impl Ed25519Signer {
    /// Build a signer from a PKCS#8 (v1 or v2) Ed25519 private key.
    ///
    /// # Errors
    ///
    /// Returns `SignerError::InvalidKey` if the document is not a valid Ed25519 key.
    pub fn from_pkcs8(private_key_pkcs8: &[u8], clock_skew: Duration) -> Result<Self, SignerError> {
        let key_pair = Ed25519KeyPair::from_pkcs8_maybe_unchecked(private_key_pkcs8)
            .map_err(|e| SignerError::InvalidKey(format!("Invalid private key format: {e}")))?;
        let public_key = key_pair.public_key().as_ref();

        let key_id = URL_SAFE_NO_PAD.encode(public_key.get(..8).unwrap_or(public_key));

        Ok(Self {
            encoding_key: EncodingKey::from_ed_der(private_key_pkcs8),
            decoding_key: DecodingKey::from_ed_der(public_key),
            key_id,
            clock_skew,
        })
    }

    /// Build a signer from a base64-encoded PKCS#8 key (the `TOKEN_SIGNING_KEY` format).
    ///
    /// # Errors
    ///
    /// Returns `SignerError::InvalidKey` if decoding or parsing fails.
    pub fn from_base64_pkcs8(
        encoded: &SecretString,
        clock_skew: Duration,
    ) -> Result<Self, SignerError> {
        let der = base64::engine::general_purpose::STANDARD
            .decode(encoded.expose_secret().trim())
            .map_err(|e| SignerError::InvalidKey(format!("Invalid key encoding: {e}")))?;
        Self::from_pkcs8(&der, clock_skew)
    }

    /// Generate a fresh key pair using the system CSPRNG.
    ///
    /// Returns the signer and its base64 PKCS#8 encoding so the key can be persisted.
    ///
    /// # Errors
    ///
    /// Returns `SignerError::InvalidKey` if key generation fails.
    pub fn generate(clock_skew: Duration) -> Result<(Self, SecretString), SignerError> {
        let rng = SystemRandom::new();
        let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng)
            .map_err(|e| SignerError::InvalidKey(format!("Key generation failed: {e}")))?;
        let signer = Self::from_pkcs8(pkcs8.as_ref(), clock_skew)?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(pkcs8.as_ref());
        Ok((signer, SecretString::from(encoded)))
    }

    /// Key identifier placed in the JWT header.
    #[must_use]
    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl Signer for Ed25519Signer {
    #[instrument(skip_all, fields(kind = %kind))]
    fn sign(&self, subject: &str, kind: TokenKind, ttl: Duration) -> Result<String, SignerError> {
        let now = chrono::Utc::now().timestamp();
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX).max(1);
        let claims = TokenClaims {
            sub: subject.to_string(),
            kind: kind.as_str().to_string(),
            exp: now.saturating_add(ttl_secs),
            iat: now,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let mut header = Header::new(Algorithm::EdDSA);
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.key_id.clone());

        encode(&header, &claims, &self.encoding_key)
            .map_err(|e| SignerError::Signing(format!("JWT signing operation failed: {e}")))
    }

    #[instrument(skip_all)]
    fn verify(&self, raw: &str) -> Result<Option<VerifiedToken>, SignerError> {
        if raw.len() > MAX_TOKEN_SIZE_BYTES {
            debug!(
                target: "token.signer",
                token_size = raw.len(),
                max_size = MAX_TOKEN_SIZE_BYTES,
                "Token rejected: size exceeds maximum allowed"
            );
            return Ok(None);
        }

        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.validate_exp = true;
        validation.leeway = 0;

        let claims = match decode::<TokenClaims>(raw, &self.decoding_key, &validation) {
            Ok(data) => data.claims,
            Err(e) => {
                debug!(target: "token.signer", error = %e, "Token verification failed");
                return Ok(None);
            }
        };

        let now = chrono::Utc::now().timestamp();
        let skew = i64::try_from(self.clock_skew.as_secs()).unwrap_or(i64::MAX);
        if claims.iat > now.saturating_add(skew) {
            debug!(
                target: "token.signer",
                iat = claims.iat,
                now = now,
                "Token rejected: iat too far in the future"
            );
            return Ok(None);
        }

        let kind = claims
            .kind
            .parse::<TokenKind>()
            .map_err(|_| SignerError::UnknownKind(claims.kind.clone()))?;

        Ok(Some(VerifiedToken {
            subject: claims.sub,
            kind,
            expires_at: claims.exp,
        }))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn signer() -> Ed25519Signer {
        Ed25519Signer::generate(DEFAULT_CLOCK_SKEW).unwrap().0
    }

    fn sign_claims(signer: &Ed25519Signer, claims: &TokenClaims) -> String {
        let header = Header::new(Algorithm::EdDSA);
        encode(&header, claims, &signer.encoding_key).unwrap()
    }

    #[test]
    fn test_sign_then_verify() {
        let signer = signer();
        let raw = signer
            .sign("alice@example.com", TokenKind::PasswordReset, Duration::from_secs(600))
            .unwrap();

        let verified = signer.verify(&raw).unwrap().expect("token should verify");
        assert_eq!(verified.subject, "alice@example.com");
        assert_eq!(verified.kind, TokenKind::PasswordReset);
        assert!(verified.expires_at > chrono::Utc::now().timestamp());
    }

    #[test]
    fn test_each_issuance_is_distinct() {
        let signer = signer();
        let a = signer
            .sign("alice@example.com", TokenKind::Session, Duration::from_secs(60))
            .unwrap();
        let b = signer
            .sign("alice@example.com", TokenKind::Session, Duration::from_secs(60))
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let signer = signer();
        let now = chrono::Utc::now().timestamp();
        let raw = sign_claims(
            &signer,
            &TokenClaims {
                sub: "alice@example.com".to_string(),
                kind: "session".to_string(),
                exp: now - 10,
                iat: now - 100,
                jti: "jti-1".to_string(),
            },
        );
        assert_eq!(signer.verify(&raw).unwrap(), None);
    }

    #[test]
    fn test_token_from_other_key_is_rejected() {
        let raw = signer()
            .sign("alice@example.com", TokenKind::Session, Duration::from_secs(60))
            .unwrap();
        assert_eq!(signer().verify(&raw).unwrap(), None);
    }

    #[test]
    fn test_tampered_and_garbage_tokens_are_rejected() {
        let signer = signer();
        let raw = signer
            .sign("alice@example.com", TokenKind::Session, Duration::from_secs(60))
            .unwrap();
        let tampered = format!("{raw}x");

        assert_eq!(signer.verify(&tampered).unwrap(), None);
        assert_eq!(signer.verify("not-a-token").unwrap(), None);
        assert_eq!(signer.verify("").unwrap(), None);
    }

    #[test]
    fn test_oversized_token_is_rejected_before_parsing() {
        let signer = signer();
        let huge = "a".repeat(MAX_TOKEN_SIZE_BYTES + 1);
        assert_eq!(signer.verify(&huge).unwrap(), None);
    }

    #[test]
    fn test_future_iat_is_rejected() {
        let signer = signer();
        let now = chrono::Utc::now().timestamp();
        let raw = sign_claims(
            &signer,
            &TokenClaims {
                sub: "alice@example.com".to_string(),
                kind: "session".to_string(),
                exp: now + 3600,
                iat: now + 1200,
                jti: "jti-2".to_string(),
            },
        );
        assert_eq!(signer.verify(&raw).unwrap(), None);
    }

    #[test]
    fn test_unknown_kind_with_valid_signature_is_an_error() {
        let signer = signer();
        let now = chrono::Utc::now().timestamp();
        let raw = sign_claims(
            &signer,
            &TokenClaims {
                sub: "alice@example.com".to_string(),
                kind: "magic_link".to_string(),
                exp: now + 60,
                iat: now,
                jti: "jti-3".to_string(),
            },
        );
        assert_eq!(
            signer.verify(&raw),
            Err(SignerError::UnknownKind("magic_link".to_string()))
        );
    }

    #[test]
    fn test_base64_key_round_trip() {
        let (original, encoded) = Ed25519Signer::generate(DEFAULT_CLOCK_SKEW).unwrap();
        let restored = Ed25519Signer::from_base64_pkcs8(&encoded, DEFAULT_CLOCK_SKEW).unwrap();
        assert_eq!(original.key_id(), restored.key_id());

        let raw = original
            .sign("bob@example.com", TokenKind::Refresh, Duration::from_secs(60))
            .unwrap();
        assert!(restored.verify(&raw).unwrap().is_some());
    }

    #[test]
    fn test_invalid_key_material() {
        let result = Ed25519Signer::from_pkcs8(&[0u8; 16], DEFAULT_CLOCK_SKEW);
        assert!(matches!(result, Err(SignerError::InvalidKey(_))));

        let result =
            Ed25519Signer::from_base64_pkcs8(&SecretString::from("%%%"), DEFAULT_CLOCK_SKEW);
        assert!(matches!(result, Err(SignerError::InvalidKey(_))));
    }

    #[test]
    fn test_debug_redacts_subject() {
        let verified = VerifiedToken {
            subject: "alice@example.com".to_string(),
            kind: TokenKind::Session,
            expires_at: 0,
        };
        assert!(!format!("{verified:?}").contains("alice"));
    }
}
