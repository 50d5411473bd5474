//! Metrics definitions for the token service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `token_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! - `kind`: 4 values (session, password_reset, email_confirmation, refresh)
//! - `status`: bounded by code (success, collision_exhausted, cache_unavailable, error)
//! - `outcome`: bounded by code (valid, invalid, consumed, cache_unavailable)

use crate::kinds::TokenKind;
use metrics::{counter, histogram};
use std::time::Duration;

/// Record an issuance call and how long it took, including retries.
///
/// Metrics: `token_issuance_total`, `token_issuance_duration_seconds`
/// Labels: `kind`, `status`
pub fn record_issuance(kind: TokenKind, status: &'static str, duration: Duration) {
    histogram!("token_issuance_duration_seconds", "kind" => kind.as_str(), "status" => status)
        .record(duration.as_secs_f64());
    counter!("token_issuance_total", "kind" => kind.as_str(), "status" => status).increment(1);
}

/// Record a reservation that lost to an existing token.
///
/// Metric: `token_issuance_collisions_total`
/// Labels: `kind`
pub fn record_issuance_collision(kind: TokenKind) {
    counter!("token_issuance_collisions_total", "kind" => kind.as_str()).increment(1);
}

/// Record the result of a verify or consume call.
///
/// Metric: `token_verifications_total`
/// Labels: `kind`, `outcome`
pub fn record_verification(kind: TokenKind, outcome: &'static str) {
    counter!("token_verifications_total", "kind" => kind.as_str(), "outcome" => outcome)
        .increment(1);
}

/// Record an explicit revocation.
///
/// Metric: `token_revocations_total`
/// Labels: `kind`
pub fn record_revocation(kind: TokenKind) {
    counter!("token_revocations_total", "kind" => kind.as_str()).increment(1);
}
