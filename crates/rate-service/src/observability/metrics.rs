//! Metrics definitions for the rate service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `rate_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! - `status`: success, error
//! - `resolution`: interval, fallback, missing
//! - `error_category`: bounded by `RateError::category`

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record one refresh cycle.
///
/// Metrics: `rate_refresh_cycles_total`, `rate_refresh_duration_seconds`
/// Labels: `status`
pub fn record_refresh_cycle(status: &'static str, duration: Duration) {
    histogram!("rate_refresh_duration_seconds", "status" => status).record(duration.as_secs_f64());
    counter!("rate_refresh_cycles_total", "status" => status).increment(1);
}

/// Number of pairs whose actual rate changed in the last successful cycle.
///
/// Metric: `rate_refresh_pairs_updated`
#[allow(clippy::cast_precision_loss)]
pub fn set_pairs_updated(count: usize) {
    gauge!("rate_refresh_pairs_updated").set(count as f64);
}

/// Record how a rate lookup was resolved.
///
/// Metric: `rate_lookups_total`
/// Labels: `resolution`
pub fn record_rate_lookup(resolution: &'static str) {
    counter!("rate_lookups_total", "resolution" => resolution).increment(1);
}

/// Record a processed conversion request.
///
/// Metric: `rate_conversions_total`
/// Labels: `status`, `error_category`
pub fn record_conversion(status: &'static str, error_category: Option<&'static str>) {
    counter!(
        "rate_conversions_total",
        "status" => status,
        "error_category" => error_category.unwrap_or("none")
    )
    .increment(1);
}
