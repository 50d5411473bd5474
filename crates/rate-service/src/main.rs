//! Rate Worker
//!
//! Keeps the exchange-rate cache warm and converts queued amounts once it is.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Initialize tracing
//! 3. Install the Prometheus recorder and scrape listener
//! 4. Connect to Redis
//! 5. Spawn the rate refresher (fires the first-run signal)
//! 6. Spawn the conversion consumer (gated on that signal)
//! 7. Wait for shutdown signal, cancel tasks, wait for them to finish

#![warn(clippy::pedantic)]

use common::cache::{CacheStore, RedisCacheStore};
use common::run_signal::RunSignal;
use common::secret::ExposeSecret;
use metrics_exporter_prometheus::PrometheusBuilder;
use rate_service::config::RateWorkerConfig;
use rate_service::models::{ConversionOutcome, ConversionRequest};
use rate_service::provider::{HttpRateProvider, RateProvider};
use rate_service::tasks::{start_conversion_consumer, start_rate_refresher};
use rate_service::ExchangeRateCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Capacity of the in-process request and outcome queues.
const QUEUE_CAPACITY: usize = 1024;

/// Upper bound on waiting for tasks after cancellation.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = RateWorkerConfig::from_env()?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.observability.log_level.clone().into());
    if config.observability.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    info!("Starting Rate Worker");
    info!(
        refresh_interval_secs = config.refresh_interval.as_secs(),
        cache_ttl_secs = config.cache_ttl.as_secs(),
        history_retention_days = config.history_retention.as_secs() / 86_400,
        provider_timeout_secs = config.provider_timeout.as_secs(),
        metrics_address = %config.metrics_address,
        "Configuration loaded successfully"
    );

    PrometheusBuilder::new()
        .with_http_listener(config.metrics_address)
        .install()
        .map_err(|e| {
            error!(error = %e, "Failed to install Prometheus metrics exporter");
            format!("Failed to install Prometheus metrics exporter: {e}")
        })?;
    info!(addr = %config.metrics_address, "Prometheus scrape listener started");

    info!("Connecting to Redis...");
    let store = RedisCacheStore::connect(config.redis.url.expose_secret())
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to connect to Redis");
            e
        })?;
    let store: Arc<dyn CacheStore> = Arc::new(store);
    info!("Redis connection established");

    let cache = Arc::new(
        ExchangeRateCache::new(store, config.cache_ttl)
            .with_history_retention(config.history_retention),
    );
    let provider: Arc<dyn RateProvider> = Arc::new(HttpRateProvider::new(
        config.provider_url.clone(),
        config.provider_timeout,
    )?);
    let first_refresh = Arc::new(RunSignal::new());
    let shutdown_token = CancellationToken::new();

    let refresher = tokio::spawn(start_rate_refresher(
        Arc::clone(&cache),
        provider,
        Arc::clone(&first_refresh),
        config.refresh_interval,
        shutdown_token.child_token(),
    ));

    // Broker adapters feed `request_tx` and drain `outcome_rx`.
    let (request_tx, request_rx) = mpsc::channel::<ConversionRequest>(QUEUE_CAPACITY);
    let (outcome_tx, mut outcome_rx) = mpsc::channel::<ConversionOutcome>(QUEUE_CAPACITY);

    let consumer = tokio::spawn(start_conversion_consumer(
        Arc::clone(&cache),
        Arc::clone(&first_refresh),
        request_rx,
        outcome_tx,
        shutdown_token.child_token(),
    ));

    let outcomes = tokio::spawn(async move {
        while let Some(outcome) = outcome_rx.recv().await {
            debug!(id = %outcome.id(), "Conversion outcome ready");
        }
    });

    info!("Rate Worker running");
    shutdown_signal().await;
    info!("Shutdown signal received, initiating graceful shutdown...");

    shutdown_token.cancel();
    drop(request_tx);

    let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
        for (name, handle) in [("refresher", refresher), ("consumer", consumer), ("outcomes", outcomes)] {
            if let Err(e) = handle.await {
                warn!(task = name, error = %e, "Task ended abnormally");
            }
        }
    })
    .await;
    if drained.is_err() {
        warn!(
            grace_secs = SHUTDOWN_GRACE.as_secs(),
            "Tasks did not stop within grace period"
        );
    }

    info!("Rate Worker shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        #[expect(
            clippy::expect_used,
            reason = "Signal handler installation is critical - panic is appropriate if it fails"
        )]
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
