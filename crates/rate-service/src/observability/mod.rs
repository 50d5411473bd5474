//! Observability for the rate service.
//!
//! Spans use `#[instrument(skip_all)]`; currency codes and counts are the only
//! fields recorded. Amounts are never logged.

pub mod metrics;
