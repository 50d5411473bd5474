//! Upstream exchange-rate provider.
//!
//! The refresh worker calls [`RateProvider::fetch_current_rates`] once per
//! cycle. A provider failure fails that cycle only; the cache keeps whatever
//! it held before.
//!
//! # Wire format
//!
//! [`HttpRateProvider`] issues `GET {base_url}` and expects a JSON array:
//!
//! ```json
//! [{ "base": "EUR", "target": "USD", "rate": "1.12" }]
//! ```
//!
//! `rate` may be a JSON string or number.

use crate::errors::ProviderError;
use crate::models::RateQuote;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Default request timeout.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Source of current exchange rates.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Fetch the current rate for every pair the provider publishes.
    async fn fetch_current_rates(&self) -> Result<Vec<RateQuote>, ProviderError>;
}

/// HTTP/JSON rate provider.
#[derive(Debug, Clone)]
pub struct HttpRateProvider {
    client: Client,
    url: String,
}

impl HttpRateProvider {
    /// Create a provider for `url` with the given request timeout.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError::Unreachable` if the HTTP client cannot be built.
    pub fn new(url: String, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .build()
            .map_err(|e| {
                error!(target: "rate.provider", error = %e, "Failed to build HTTP client");
                ProviderError::Unreachable(format!("HTTP client build failed: {e}"))
            })?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    #[instrument(skip_all)]
    async fn fetch_current_rates(&self) -> Result<Vec<RateQuote>, ProviderError> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            warn!(target: "rate.provider", error = %e, "Rate provider request failed");
            ProviderError::Unreachable(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(target: "rate.provider", status = %status, "Rate provider returned error status");
            return Err(ProviderError::Status(status.as_u16()));
        }

        let quotes: Vec<RateQuote> = response.json().await.map_err(|e| {
            warn!(target: "rate.provider", error = %e, "Failed to parse rate provider response");
            ProviderError::Decode(e.to_string())
        })?;

        debug!(target: "rate.provider", quotes = quotes.len(), "Fetched current rates");
        Ok(quotes)
    }
}
