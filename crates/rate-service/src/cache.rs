//! Time-versioned exchange-rate cache.
//!
//! Rates are stored per currency pair as one JSON list, sorted by
//! `valid_from`, under `exchange_rates:{BASE}_{TARGET}`.
//!
//! # Lookup
//!
//! [`ExchangeRateCache::rate_on`] resolves in two tiers:
//! 1. the covering row (`valid_from <= date < valid_to`) with the latest
//!    `valid_from`, so overlapping rows resolve to the newest;
//! 2. otherwise the row flagged `actual`.
//!
//! Only when both tiers come up empty is the lookup a `MissingRates` error.
//!
//! # Refresh
//!
//! [`ExchangeRateCache::merge_quotes`] rewrites every quoted pair on every
//! cycle, changed or not, so a group's TTL follows the refresh cadence rather
//! than the last rate change. Closed rows that ended before the history
//! retention window are pruned on the same write.

use crate::errors::RateError;
use crate::models::{ExchangeRate, RateQuote};
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use common::cache::{CacheStore, CacheStoreExt};
use common::types::CurrencyCode;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Key prefix for grouped rate lists.
pub const RATE_KEY_PREFIX: &str = "exchange_rates";

/// Default lifetime of a cached rate group (3 days).
pub const DEFAULT_RATE_CACHE_TTL: Duration = Duration::from_secs(3 * 24 * 60 * 60);

/// Default history kept per pair (400 days).
pub const DEFAULT_RATE_HISTORY_RETENTION: Duration = Duration::from_secs(400 * 24 * 60 * 60);

/// Cache key for a currency pair.
#[must_use]
pub fn rate_key(base: CurrencyCode, target: CurrencyCode) -> String {
    format!("{RATE_KEY_PREFIX}:{base}_{target}")
}

/// How a lookup found its row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A row's validity window covers the date.
    Interval,
    /// No window matched; the `actual` row was used.
    Fallback,
}

impl Resolution {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::Interval => "interval",
            Resolution::Fallback => "fallback",
        }
    }
}

/// Pick the row effective on `date`.
#[must_use]
pub fn select_rate(rows: &[ExchangeRate], date: DateTime<Utc>) -> Option<(&ExchangeRate, Resolution)> {
    rows.iter()
        .filter(|row| row.covers(date))
        .max_by_key(|row| row.valid_from)
        .map(|row| (row, Resolution::Interval))
        .or_else(|| {
            rows.iter()
                .filter(|row| row.actual)
                .max_by_key(|row| row.valid_from)
                .map(|row| (row, Resolution::Fallback))
        })
}

/// Counts reported by [`ExchangeRateCache::merge_quotes`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Pairs whose actual rate changed (or that were seen for the first time).
    pub pairs_updated: usize,
    /// Pairs whose actual rate already matched the quote.
    pub pairs_unchanged: usize,
    /// Quotes dropped by validation.
    pub quotes_rejected: usize,
    /// Stored groups that could not be decoded and were rebuilt from the quote.
    pub groups_discarded: usize,
}

/// Exchange-rate cache over a [`CacheStore`].
#[derive(Clone)]
pub struct ExchangeRateCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    history_retention: Duration,
}

impl std::fmt::Debug for ExchangeRateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeRateCache")
            .field("ttl", &self.ttl)
            .field("history_retention", &self.history_retention)
            .finish_non_exhaustive()
    }
}

impl ExchangeRateCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            history_retention: DEFAULT_RATE_HISTORY_RETENTION,
        }
    }

    /// Keep closed rows for `retention` after their window ends.
    #[must_use]
    pub fn with_history_retention(mut self, retention: Duration) -> Self {
        self.history_retention = retention;
        self
    }

    fn retention_cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        chrono::Duration::from_std(self.history_retention)
            .ok()
            .and_then(|retention| now.checked_sub_signed(retention))
    }

    /// Replace the cached groups for every pair present in `rates`.
    ///
    /// Pairs absent from `rates` are left untouched.
    ///
    /// # Errors
    ///
    /// Returns `RateError::CacheUnavailable` if a group cannot be written.
    #[instrument(skip_all, fields(rows = rates.len()))]
    pub async fn refresh_all(&self, rates: Vec<ExchangeRate>) -> Result<(), RateError> {
        let mut groups: BTreeMap<(CurrencyCode, CurrencyCode), Vec<ExchangeRate>> = BTreeMap::new();
        for rate in rates {
            groups.entry(rate.pair()).or_default().push(rate);
        }

        for ((base, target), mut rows) in groups {
            rows.sort_by_key(|row| row.valid_from);
            self.store
                .set_json(&rate_key(base, target), &rows, self.ttl)
                .await?;
            debug!(
                target: "rate.cache",
                base = %base,
                target_currency = %target,
                rows = rows.len(),
                "Rate group stored"
            );
        }
        Ok(())
    }

    /// Load the cached rows for a pair.
    ///
    /// # Errors
    ///
    /// Returns `RateError::CacheUnavailable` if the cache cannot be read.
    pub async fn load_group(
        &self,
        base: CurrencyCode,
        target: CurrencyCode,
    ) -> Result<Option<Vec<ExchangeRate>>, RateError> {
        Ok(self.store.get_json(&rate_key(base, target)).await?)
    }

    /// Rate effective on `date` for `base -> target`.
    ///
    /// # Errors
    ///
    /// - `MissingRates` when the pair is not cached or no row applies
    /// - `CacheUnavailable` when the cache cannot be read
    #[instrument(skip_all, fields(base = %base, target_currency = %target))]
    pub async fn rate_on(
        &self,
        date: DateTime<Utc>,
        base: CurrencyCode,
        target: CurrencyCode,
    ) -> Result<Decimal, RateError> {
        let rows = self.load_group(base, target).await?.unwrap_or_default();

        match select_rate(&rows, date) {
            Some((row, resolution)) => {
                metrics::record_rate_lookup(resolution.as_str());
                if resolution == Resolution::Fallback {
                    debug!(
                        target: "rate.cache",
                        date = %date,
                        "No rate window covers date, using actual rate"
                    );
                }
                Ok(row.rate)
            }
            None => {
                metrics::record_rate_lookup("missing");
                Err(RateError::MissingRates { base, target })
            }
        }
    }

    /// Convert `amount` of `from` into `to` at the rate effective on `date`.
    ///
    /// Same-currency conversion is the identity and never touches the cache.
    ///
    /// # Errors
    ///
    /// Same as [`rate_on`](Self::rate_on).
    pub async fn convert(
        &self,
        amount: Decimal,
        date: DateTime<Utc>,
        from: CurrencyCode,
        to: CurrencyCode,
    ) -> Result<Decimal, RateError> {
        if from == to {
            return Ok(amount);
        }
        let rate = self.rate_on(date, from, to).await?;
        amount
            .checked_mul(rate)
            .ok_or_else(|| RateError::InvalidRate(format!("{amount} {from} overflows at rate {rate}")))
    }

    /// Fold fresh provider quotes into the cached history.
    ///
    /// For each pair the current `actual` row is kept if its rate matches the
    /// quote. Otherwise it is closed at `now` and a new open-ended `actual`
    /// row starting at `now` is appended. Every quoted pair is written back,
    /// which renews its TTL. A stored group that cannot be decoded is
    /// discarded and rebuilt from the quote; other pairs are unaffected.
    ///
    /// # Errors
    ///
    /// Returns `RateError::CacheUnavailable` if a group cannot be read or written.
    #[instrument(skip_all, fields(quotes = quotes.len()))]
    pub async fn merge_quotes(
        &self,
        quotes: &[RateQuote],
        now: DateTime<Utc>,
    ) -> Result<MergeSummary, RateError> {
        let mut summary = MergeSummary::default();
        let mut latest: BTreeMap<(CurrencyCode, CurrencyCode), &RateQuote> = BTreeMap::new();
        for quote in quotes {
            latest.insert((quote.base, quote.target), quote);
        }

        let cutoff = self.retention_cutoff(now);
        let mut merged: Vec<ExchangeRate> = Vec::new();
        for ((base, target), quote) in latest {
            let fresh = match ExchangeRate::new(base, target, quote.rate, now, None, true) {
                Ok(row) => row,
                Err(e) => {
                    warn!(target: "rate.cache", error = %e, "Rejected provider quote");
                    summary.quotes_rejected += 1;
                    continue;
                }
            };

            let existing = match self.load_group(base, target).await {
                Ok(rows) => rows.unwrap_or_default(),
                Err(RateError::CorruptCache(reason)) => {
                    warn!(
                        target: "rate.cache",
                        base = %base,
                        target_currency = %target,
                        error = %reason,
                        "Discarding undecodable rate group"
                    );
                    summary.groups_discarded += 1;
                    Vec::new()
                }
                Err(e) => return Err(e),
            };

            let (rows, changed) = merge_group(existing, fresh, now, cutoff);
            if changed {
                summary.pairs_updated += 1;
            } else {
                summary.pairs_unchanged += 1;
            }
            merged.extend(rows);
        }

        if !merged.is_empty() {
            self.refresh_all(merged).await?;
        }
        Ok(summary)
    }
}

/// Merge one fresh actual row into a pair's history and prune closed rows
/// that ended at or before `cutoff`.
///
/// The flag is `false` when the current actual rate was already `fresh.rate`.
fn merge_group(
    mut rows: Vec<ExchangeRate>,
    fresh: ExchangeRate,
    now: DateTime<Utc>,
    cutoff: Option<DateTime<Utc>>,
) -> (Vec<ExchangeRate>, bool) {
    let unchanged = rows
        .iter()
        .filter(|row| row.actual)
        .max_by_key(|row| row.valid_from)
        .is_some_and(|row| row.rate == fresh.rate);

    if !unchanged {
        // Superseded rows that would start at or after `now` have an empty window.
        rows.retain(|row| !(row.actual && row.valid_from >= now));
        for row in rows.iter_mut().filter(|row| row.actual) {
            row.actual = false;
            row.valid_to = Some(row.valid_to.map_or(now, |end| end.min(now)));
        }
        rows.push(fresh);
    }

    if let Some(cutoff) = cutoff {
        rows.retain(|row| row.actual || row.valid_to.map_or(true, |end| end > cutoff));
    }
    (rows, !unchanged)
}
