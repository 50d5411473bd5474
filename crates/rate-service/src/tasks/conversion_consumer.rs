//! Gated conversion consumer.
//!
//! Converts incoming [`ConversionRequest`]s at the rate effective on each
//! request's date. The task does not pull a single request until the rate
//! refresher has announced its first successful cycle, so nothing is priced
//! against a cold cache.
//!
//! A request that cannot be priced produces a `Failed` outcome; the task
//! keeps running.

use crate::cache::ExchangeRateCache;
use crate::errors::SinkError;
use crate::models::{ConversionOutcome, ConversionRequest};
use crate::observability::metrics;
use async_trait::async_trait;
use common::run_signal::RunSignal;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Inbound stream of conversion requests.
#[async_trait]
pub trait ConversionSource: Send {
    /// Next request, or `None` once the source is closed.
    async fn next_request(&mut self) -> Option<ConversionRequest>;
}

/// Destination for conversion outcomes.
#[async_trait]
pub trait ConversionSink: Send + Sync {
    async fn publish(&self, outcome: ConversionOutcome) -> Result<(), SinkError>;
}

#[async_trait]
impl ConversionSource for mpsc::Receiver<ConversionRequest> {
    async fn next_request(&mut self) -> Option<ConversionRequest> {
        self.recv().await
    }
}

#[async_trait]
impl ConversionSink for mpsc::Sender<ConversionOutcome> {
    async fn publish(&self, outcome: ConversionOutcome) -> Result<(), SinkError> {
        self.send(outcome)
            .await
            .map_err(|e| SinkError(format!("outcome channel closed ({})", e.0.id())))
    }
}

/// Price one request.
pub async fn handle_request(cache: &ExchangeRateCache, request: ConversionRequest) -> ConversionOutcome {
    match cache
        .convert(request.amount, request.date, request.from, request.to)
        .await
    {
        Ok(amount) => {
            metrics::record_conversion("converted", None);
            ConversionOutcome::Converted {
                id: request.id,
                amount,
            }
        }
        Err(e) => {
            metrics::record_conversion("failed", Some(e.category()));
            warn!(
                target: "rate.task.consumer",
                from = %request.from,
                to = %request.to,
                error = %e,
                "Conversion failed"
            );
            ConversionOutcome::Failed {
                id: request.id,
                reason: e.to_string(),
            }
        }
    }
}

/// Start the conversion consumer.
///
/// Waits for `first_refresh` (cancellable), then processes requests until
/// the source closes or the cancellation token is triggered.
#[instrument(skip_all, name = "rate.task.consumer")]
pub async fn start_conversion_consumer<S, K>(
    cache: Arc<ExchangeRateCache>,
    first_refresh: Arc<RunSignal>,
    mut source: S,
    sink: K,
    cancel_token: CancellationToken,
) where
    S: ConversionSource,
    K: ConversionSink,
{
    info!(target: "rate.task.consumer", "Waiting for first rate refresh");
    if first_refresh
        .wait_for_first_run_or_cancel(&cancel_token)
        .await
        .is_err()
    {
        info!(
            target: "rate.task.consumer",
            "Shutdown before first rate refresh, exiting"
        );
        return;
    }
    info!(target: "rate.task.consumer", "Rate cache warm, starting conversion consumer");

    loop {
        tokio::select! {
            biased;
            () = cancel_token.cancelled() => {
                info!(
                    target: "rate.task.consumer",
                    "Conversion consumer received shutdown signal, exiting"
                );
                break;
            }
            request = source.next_request() => {
                let Some(request) = request else {
                    info!(target: "rate.task.consumer", "Conversion source closed");
                    break;
                };
                let outcome = handle_request(&cache, request).await;
                debug!(target: "rate.task.consumer", "Conversion processed");
                if let Err(e) = sink.publish(outcome).await {
                    warn!(target: "rate.task.consumer", error = %e, "Failed to publish conversion outcome");
                }
            }
        }
    }

    info!(target: "rate.task.consumer", "Conversion consumer stopped");
}
