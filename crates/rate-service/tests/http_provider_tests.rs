//! Integration tests for `HttpRateProvider` against a wiremock server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use common::cache::CacheStore;
use ft_test_utils::{code, quote, MemoryCacheStore};
use rate_service::cache::DEFAULT_RATE_CACHE_TTL;
use rate_service::tasks::run_refresh_cycle;
use rate_service::{ExchangeRateCache, HttpRateProvider, ProviderError, RateProvider};
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn provider_for(server: &MockServer, timeout: Duration) -> HttpRateProvider {
    HttpRateProvider::new(format!("{}/rates", server.uri()), timeout).unwrap()
}

async fn mount(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/rates"))
        .respond_with(response)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_fetch_accepts_string_and_number_rates() {
    let server = MockServer::start().await;
    mount(
        &server,
        ResponseTemplate::new(200).set_body_json(json!([
            { "base": "EUR", "target": "USD", "rate": "1.0845" },
            { "base": "usd", "target": "jpy", "rate": 149.5 }
        ])),
    )
    .await;

    let quotes = provider_for(&server, Duration::from_secs(2))
        .await
        .fetch_current_rates()
        .await
        .unwrap();

    assert_eq!(
        quotes,
        vec![quote("EUR", "USD", "1.0845"), quote("USD", "JPY", "149.5")]
    );
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let server = MockServer::start().await;
    mount(&server, ResponseTemplate::new(503)).await;

    let err = provider_for(&server, Duration::from_secs(2))
        .await
        .fetch_current_rates()
        .await
        .unwrap_err();
    assert_eq!(err, ProviderError::Status(503));
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    mount(
        &server,
        ResponseTemplate::new(200).set_body_json(json!({ "rates": "nope" })),
    )
    .await;

    let err = provider_for(&server, Duration::from_secs(2))
        .await
        .fetch_current_rates()
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Decode(_)));
}

#[tokio::test]
async fn test_slow_provider_times_out_as_unreachable() {
    let server = MockServer::start().await;
    mount(
        &server,
        ResponseTemplate::new(200)
            .set_body_json(json!([]))
            .set_delay(Duration::from_secs(2)),
    )
    .await;

    let err = provider_for(&server, Duration::from_millis(100))
        .await
        .fetch_current_rates()
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Unreachable(_)));
}

#[tokio::test]
async fn test_refresh_cycle_against_http_provider() {
    let server = MockServer::start().await;
    mount(
        &server,
        ResponseTemplate::new(200).set_body_json(json!([
            { "base": "EUR", "target": "USD", "rate": "1.12" }
        ])),
    )
    .await;

    let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
    let cache = ExchangeRateCache::new(store, DEFAULT_RATE_CACHE_TTL);
    let provider = provider_for(&server, Duration::from_secs(2)).await;

    let summary = run_refresh_cycle(&cache, &provider).await.unwrap();
    assert_eq!(summary.pairs_updated, 1);

    // Second cycle with the same rate changes nothing.
    let summary = run_refresh_cycle(&cache, &provider).await.unwrap();
    assert_eq!(summary.pairs_unchanged, 1);

    let converted = cache
        .convert(dec!(10), chrono::Utc::now(), code("EUR"), code("USD"))
        .await
        .unwrap();
    assert_eq!(converted, dec!(11.20));
}
