//! Exchange-rate refresh background task.
//!
//! Pulls current rates from the provider on a fixed interval and merges them
//! into the cache. The first tick fires immediately so the cache is warmed
//! at start-up.
//!
//! A failed cycle is logged and retried on the next tick. The [`RunSignal`]
//! fires after the first cycle that succeeds, however many failed before it.
//!
//! # Graceful Shutdown
//!
//! The task exits when the cancellation token is triggered, including while
//! a cycle is in flight. An abandoned cycle leaves the cache as it was or
//! with some pairs already rewritten; either state is valid.

use crate::cache::{ExchangeRateCache, MergeSummary};
use crate::errors::RateError;
use crate::observability::metrics;
use crate::provider::RateProvider;
use chrono::Utc;
use common::run_signal::RunSignal;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Default refresh interval (1 hour).
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Fetch current quotes and merge them into the cache.
///
/// # Errors
///
/// - `RateError::Provider` if the provider call fails
/// - `RateError::CacheUnavailable` if the merge cannot read or write the cache
/// - `RateError::CorruptCache` never; undecodable groups are rebuilt
pub async fn run_refresh_cycle(
    cache: &ExchangeRateCache,
    provider: &dyn RateProvider,
) -> Result<MergeSummary, RateError> {
    let quotes = provider.fetch_current_rates().await?;
    cache.merge_quotes(&quotes, Utc::now()).await
}

/// Start the rate refresher background task.
///
/// Returns when the cancellation token is triggered.
#[instrument(skip_all, name = "rate.task.refresher")]
pub async fn start_rate_refresher(
    cache: Arc<ExchangeRateCache>,
    provider: Arc<dyn RateProvider>,
    first_run: Arc<RunSignal>,
    refresh_interval: Duration,
    cancel_token: CancellationToken,
) {
    info!(
        target: "rate.task.refresher",
        interval_secs = refresh_interval.as_secs(),
        "Starting rate refresher task"
    );

    let mut interval = tokio::time::interval(refresh_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let start = Instant::now();
                let result = tokio::select! {
                    biased;
                    () = cancel_token.cancelled() => {
                        info!(
                            target: "rate.task.refresher",
                            "Rate refresher cancelled mid-cycle, exiting"
                        );
                        break;
                    }
                    result = run_refresh_cycle(&cache, provider.as_ref()) => result,
                };
                match result {
                    Ok(summary) => {
                        metrics::record_refresh_cycle("success", start.elapsed());
                        metrics::set_pairs_updated(summary.pairs_updated);
                        debug!(
                            target: "rate.task.refresher",
                            pairs_updated = summary.pairs_updated,
                            pairs_unchanged = summary.pairs_unchanged,
                            quotes_rejected = summary.quotes_rejected,
                            groups_discarded = summary.groups_discarded,
                            "Rate refresh cycle completed"
                        );
                        if first_run.signal_first_run_completed() {
                            info!(
                                target: "rate.task.refresher",
                                "Rate cache warm, dependent workers released"
                            );
                        }
                    }
                    Err(e) => {
                        // Keep the previous cache contents; next tick retries.
                        metrics::record_refresh_cycle("error", start.elapsed());
                        error!(
                            target: "rate.task.refresher",
                            error = %e,
                            category = e.category(),
                            "Rate refresh cycle failed"
                        );
                    }
                }
            }
            () = cancel_token.cancelled() => {
                info!(
                    target: "rate.task.refresher",
                    "Rate refresher task received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(target: "rate.task.refresher", "Rate refresher task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_refresh_interval() {
        assert_eq!(DEFAULT_REFRESH_INTERVAL, Duration::from_secs(3600));
    }
}
