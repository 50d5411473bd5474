//! Deterministic `Signer` for token manager tests.
//!
//! Tokens are opaque strings remembered in a table. A script of raw values
//! can be queued to make the signer hand out the same token twice, which is
//! how tests force issuance collisions.
//!
//! # Example
//!
//! ```rust,ignore
//! // First issuance reserves "dup"; the second collides once on "dup",
//! // then succeeds with "fresh".
//! let signer = ScriptedSigner::new().with_script(["dup", "dup", "fresh"]);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use token_service::{Signer, SignerError, TokenKind, VerifiedToken};

#[derive(Debug, Clone)]
struct Issued {
    subject: String,
    kind: TokenKind,
    expires_at: i64,
    expired: bool,
}

/// Scriptable in-memory signer.
#[derive(Debug, Default)]
pub struct ScriptedSigner {
    script: Mutex<VecDeque<String>>,
    issued: Mutex<HashMap<String, Issued>>,
    counter: AtomicUsize,
    sign_calls: AtomicUsize,
    fail_signing: AtomicBool,
}

impl ScriptedSigner {
    /// Signer that produces `token-1`, `token-2`, ...
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue raw values to hand out before falling back to the counter.
    #[must_use]
    pub fn with_script<I, S>(self, raws: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.script
            .lock()
            .unwrap()
            .extend(raws.into_iter().map(Into::into));
        self
    }

    /// Make `sign` fail with `SignerError::Signing`.
    pub fn set_fail_signing(&self, fail: bool) {
        self.fail_signing.store(fail, Ordering::SeqCst);
    }

    /// Treat `raw` as expired from now on.
    pub fn expire(&self, raw: &str) {
        if let Some(issued) = self.issued.lock().unwrap().get_mut(raw) {
            issued.expired = true;
        }
    }

    /// Register a token the signer will accept without having signed it.
    pub fn accept(&self, raw: &str, subject: &str, kind: TokenKind) {
        self.issued.lock().unwrap().insert(
            raw.to_string(),
            Issued {
                subject: subject.to_string(),
                kind,
                expires_at: i64::MAX,
                expired: false,
            },
        );
    }

    /// Number of `sign` calls so far.
    pub fn sign_calls(&self) -> usize {
        self.sign_calls.load(Ordering::SeqCst)
    }
}

impl Signer for ScriptedSigner {
    fn sign(&self, subject: &str, kind: TokenKind, ttl: Duration) -> Result<String, SignerError> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_signing.load(Ordering::SeqCst) {
            return Err(SignerError::Signing("injected signing failure".to_string()));
        }

        let raw = self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
            let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
            format!("token-{n}")
        });

        let expires_at = chrono::Utc::now().timestamp() + ttl.as_secs() as i64;
        self.issued.lock().unwrap().insert(
            raw.clone(),
            Issued {
                subject: subject.to_string(),
                kind,
                expires_at,
                expired: false,
            },
        );
        Ok(raw)
    }

    fn verify(&self, raw: &str) -> Result<Option<VerifiedToken>, SignerError> {
        let issued = self.issued.lock().unwrap();
        Ok(issued
            .get(raw)
            .filter(|t| !t.expired)
            .map(|t| VerifiedToken {
                subject: t.subject.clone(),
                kind: t.kind,
                expires_at: t.expires_at,
            }))
    }
}
