//! Integration tests for the rate refresher and the conversion consumer.
//!
//! Uses paused tokio time. Verifies:
//! - the refresher warms the cache immediately and signals after the first
//!   successful cycle
//! - failed cycles are retried on the next tick without signalling
//! - the consumer pulls nothing until the first refresh completes
//! - both tasks exit promptly on cancellation, even mid-cycle
//! - an undecodable cache entry does not block the first signal

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::cache::CacheStore;
use common::run_signal::RunSignal;
use ft_test_utils::{
    code, conversion_request, quote, CountingSource, MemoryCacheStore, MockRateProvider,
    RecordingSink,
};
use rate_service::cache::DEFAULT_RATE_CACHE_TTL;
use rate_service::tasks::{run_refresh_cycle, start_conversion_consumer, start_rate_refresher};
use rate_service::{ConversionOutcome, ExchangeRateCache, ProviderError, RateError};
use rust_decimal_macros::dec;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const INTERVAL: Duration = Duration::from_secs(60);

fn rate_cache() -> (Arc<ExchangeRateCache>, Arc<MemoryCacheStore>) {
    let store = Arc::new(MemoryCacheStore::new());
    let dyn_store: Arc<dyn CacheStore> = store.clone();
    (
        Arc::new(ExchangeRateCache::new(dyn_store, DEFAULT_RATE_CACHE_TTL)),
        store,
    )
}

async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

fn spawn_refresher(
    cache: &Arc<ExchangeRateCache>,
    provider: &MockRateProvider,
    signal: &Arc<RunSignal>,
    cancel: &CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(start_rate_refresher(
        Arc::clone(cache),
        Arc::new(provider.clone()),
        Arc::clone(signal),
        INTERVAL,
        cancel.clone(),
    ))
}

// ============================================================================
// Refresh cycle
// ============================================================================

#[tokio::test]
async fn test_refresh_cycle_propagates_provider_error() {
    let (cache, store) = rate_cache();
    let provider = MockRateProvider::new().then_error(ProviderError::Status(503));

    let err = run_refresh_cycle(&cache, &provider).await.unwrap_err();
    assert!(matches!(err, RateError::Provider(ProviderError::Status(503))));
    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn test_refresh_cycle_surfaces_cache_outage() {
    let (cache, store) = rate_cache();
    store.set_unavailable(true);
    let provider = MockRateProvider::new().then_quotes(vec![quote("EUR", "USD", "1.1")]);

    let err = run_refresh_cycle(&cache, &provider).await.unwrap_err();
    assert!(matches!(err, RateError::CacheUnavailable(_)));
}

// ============================================================================
// Refresher task
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_refresher_runs_immediately_and_signals() {
    let (cache, store) = rate_cache();
    let provider = MockRateProvider::new().then_quotes(vec![quote("EUR", "USD", "1.12")]);
    let signal = Arc::new(RunSignal::new());
    let cancel = CancellationToken::new();

    let handle = spawn_refresher(&cache, &provider, &signal, &cancel);
    settle().await;

    assert_eq!(provider.calls(), 1);
    assert!(signal.has_run());
    assert_eq!(store.keys(), vec!["exchange_rates:EUR_USD".to_string()]);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("refresher should stop on cancel")
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_refresher_retries_after_failure_before_signalling() {
    let (cache, _store) = rate_cache();
    let provider = MockRateProvider::new()
        .then_error(ProviderError::Unreachable("connection refused".to_string()))
        .then_quotes(vec![quote("EUR", "USD", "1.12")]);
    let signal = Arc::new(RunSignal::new());
    let cancel = CancellationToken::new();

    let handle = spawn_refresher(&cache, &provider, &signal, &cancel);
    settle().await;
    assert_eq!(provider.calls(), 1);
    assert!(!signal.has_run());

    tokio::time::advance(INTERVAL).await;
    settle().await;
    assert_eq!(provider.calls(), 2);
    assert!(signal.has_run());

    // Further cycles keep running on the interval.
    tokio::time::advance(INTERVAL).await;
    settle().await;
    assert_eq!(provider.calls(), 3);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_refresher_keeps_cache_when_later_cycle_fails() {
    let (cache, _store) = rate_cache();
    let provider = MockRateProvider::new().then_quotes(vec![quote("EUR", "USD", "1.12")]);
    let signal = Arc::new(RunSignal::new());
    let cancel = CancellationToken::new();

    let handle = spawn_refresher(&cache, &provider, &signal, &cancel);
    settle().await;
    provider.push(Err(ProviderError::Status(500)));

    tokio::time::advance(INTERVAL).await;
    settle().await;
    assert_eq!(provider.calls(), 2);

    let rate = cache
        .rate_on(chrono::Utc::now(), code("EUR"), code("USD"))
        .await
        .unwrap();
    assert_eq!(rate, dec!(1.12));

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_refresher_abandons_slow_cycle_on_cancel() {
    let (cache, store) = rate_cache();
    let provider = MockRateProvider::new()
        .then_quotes(vec![quote("EUR", "USD", "1.12")])
        .with_delay(Duration::from_secs(60 * 60));
    let signal = Arc::new(RunSignal::new());
    let cancel = CancellationToken::new();

    let handle = spawn_refresher(&cache, &provider, &signal, &cancel);
    settle().await;
    assert_eq!(provider.calls(), 1);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("refresher should not wait for the provider")
        .unwrap();
    assert!(!signal.has_run());
    assert!(store.keys().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_refresher_signals_despite_undecodable_entry() {
    let (cache, store) = rate_cache();
    store.seed("exchange_rates:GBP_USD", "{not json", DEFAULT_RATE_CACHE_TTL);
    let provider = MockRateProvider::new().then_quotes(vec![
        quote("EUR", "USD", "1.12"),
        quote("GBP", "USD", "1.27"),
    ]);
    let signal = Arc::new(RunSignal::new());
    let cancel = CancellationToken::new();

    let handle = spawn_refresher(&cache, &provider, &signal, &cancel);
    settle().await;
    assert!(signal.has_run());

    let now = chrono::Utc::now();
    assert_eq!(
        cache.rate_on(now, code("EUR"), code("USD")).await.unwrap(),
        dec!(1.12)
    );
    assert_eq!(
        cache.rate_on(now, code("GBP"), code("USD")).await.unwrap(),
        dec!(1.27)
    );

    cancel.cancel();
    handle.await.unwrap();
}

// ============================================================================
// Conversion consumer
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_consumer_waits_for_first_refresh() {
    let (cache, _store) = rate_cache();
    let provider = MockRateProvider::new()
        .then_quotes(vec![quote("EUR", "USD", "1.12")])
        .with_delay(Duration::from_secs(30));
    let signal = Arc::new(RunSignal::new());
    let cancel = CancellationToken::new();
    let (source, requests, pulled) = CountingSource::channel(16);
    let sink = RecordingSink::new();

    let refresher = spawn_refresher(&cache, &provider, &signal, &cancel);
    let consumer = tokio::spawn(start_conversion_consumer(
        Arc::clone(&cache),
        Arc::clone(&signal),
        source,
        sink.clone(),
        cancel.clone(),
    ));

    let today = chrono::Utc::now();
    requests
        .send(conversion_request("tx-1", "100", "EUR", "USD", today))
        .await
        .unwrap();
    requests
        .send(conversion_request("tx-2", "5", "GBP", "JPY", today))
        .await
        .unwrap();
    settle().await;

    // Provider is still sleeping: nothing may be pulled.
    assert_eq!(provider.calls(), 1);
    assert!(!signal.has_run());
    assert_eq!(pulled.load(Ordering::SeqCst), 0);
    assert!(sink.outcomes().is_empty());

    tokio::time::advance(Duration::from_secs(31)).await;
    let outcomes = sink.wait_for(2).await;
    assert_eq!(pulled.load(Ordering::SeqCst), 2);

    assert_eq!(
        outcomes[0],
        ConversionOutcome::Converted {
            id: "tx-1".to_string(),
            amount: dec!(112.00),
        }
    );
    assert!(matches!(&outcomes[1], ConversionOutcome::Failed { id, .. } if id == "tx-2"));

    cancel.cancel();
    refresher.await.unwrap();
    consumer.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_consumer_exits_on_cancel_before_first_refresh() {
    let (cache, _store) = rate_cache();
    let signal = Arc::new(RunSignal::new());
    let cancel = CancellationToken::new();
    let (source, requests, pulled) = CountingSource::channel(4);
    let sink = RecordingSink::new();

    let consumer = tokio::spawn(start_conversion_consumer(
        cache,
        signal,
        source,
        sink.clone(),
        cancel.clone(),
    ));
    requests
        .send(conversion_request("tx-1", "1", "EUR", "USD", chrono::Utc::now()))
        .await
        .unwrap();
    settle().await;

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), consumer)
        .await
        .expect("consumer should stop on cancel")
        .unwrap();
    assert_eq!(pulled.load(Ordering::SeqCst), 0);
    assert!(sink.outcomes().is_empty());
}

#[tokio::test]
async fn test_consumer_exits_when_source_closes() {
    let (cache, _store) = rate_cache();
    let signal = Arc::new(RunSignal::new());
    signal.signal_first_run_completed();
    let (source, requests, _pulled) = CountingSource::channel(4);
    let sink = RecordingSink::new();

    let consumer = tokio::spawn(start_conversion_consumer(
        cache,
        signal,
        source,
        sink.clone(),
        CancellationToken::new(),
    ));
    requests
        .send(conversion_request("tx-1", "7.5", "EUR", "EUR", chrono::Utc::now()))
        .await
        .unwrap();
    drop(requests);

    consumer.await.unwrap();
    assert_eq!(
        sink.outcomes(),
        vec![ConversionOutcome::Converted {
            id: "tx-1".to_string(),
            amount: dec!(7.5),
        }]
    );
}
