//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports the [`secrecy`] types used across Fintrack for raw tokens,
//! signing keys and connection URLs that may embed credentials.
//!
//! `SecretString` implements `Debug` with redaction, so deriving `Debug` on a
//! struct holding one never prints the value, and `tracing` fields built from
//! `{:?}` stay safe. Reading the value requires an explicit `expose_secret()`.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! let raw = SecretString::from("eyJhbGciOiJFZERTQSJ9.payload.sig");
//! assert!(!format!("{raw:?}").contains("payload"));
//! assert!(raw.expose_secret().starts_with("eyJ"));
//! ```
//!
//! Use `SecretString` for:
//! - raw tokens handed to clients (session, reset, confirmation, refresh)
//! - the token signing key (base64 PKCS#8)
//! - cache URLs (`redis://:password@host`)

pub use secrecy::{ExposeSecret, SecretBox, SecretString};

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_raw_token_debug_is_redacted() {
        let raw = SecretString::from("header.claims.signature");
        let debug_str = format!("{raw:?}");

        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("claims"));
    }

    #[test]
    fn test_token_pair_struct_is_safe_to_log() {
        #[allow(dead_code)]
        #[derive(Debug)]
        struct IssuedTokens {
            subject_hint: String,
            session: SecretString,
            refresh: SecretString,
        }

        let tokens = IssuedTokens {
            subject_hint: "a***@example.com".to_string(),
            session: SecretString::from("session-raw-value"),
            refresh: SecretString::from("refresh-raw-value"),
        };

        let debug_str = format!("{tokens:?}");
        assert!(debug_str.contains("a***@example.com"));
        assert!(!debug_str.contains("session-raw-value"));
        assert!(!debug_str.contains("refresh-raw-value"));
    }

    #[test]
    fn test_deserialize_signing_key() {
        #[derive(Deserialize)]
        struct KeyFile {
            signing_key: SecretString,
        }

        let json = r#"{"signing_key": "MC4CAQAwBQYDK2VwBCIEI"}"#;
        let file: KeyFile = serde_json::from_str(json).expect("deserialize");
        assert_eq!(file.signing_key.expose_secret(), "MC4CAQAwBQYDK2VwBCIEI");
    }
}
