//! Observability for the token service.
//!
//! Logging follows the same rules everywhere in this crate: raw tokens and
//! subjects are never recorded as span or event fields. Only the token kind,
//! attempt counters and outcomes are safe to emit.

pub mod metrics;

pub use metrics::{
    record_issuance, record_issuance_collision, record_revocation, record_verification,
};
