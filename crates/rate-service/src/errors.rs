//! Rate service error types.

use common::cache::CacheError;
use common::types::CurrencyCode;
use thiserror::Error;

/// Errors from the exchange-rate cache and its workers.
#[derive(Debug, Clone, Error)]
pub enum RateError {
    /// No cached rate applies to the pair on the requested date.
    #[error("No exchange rate available for {base}/{target}")]
    MissingRates {
        base: CurrencyCode,
        target: CurrencyCode,
    },

    /// A rate row or quote failed validation.
    #[error("Invalid exchange rate: {0}")]
    InvalidRate(String),

    /// The cache could not be read or written.
    #[error("Rate cache unavailable: {0}")]
    CacheUnavailable(CacheError),

    /// A cached rate group could not be decoded.
    #[error("Rate cache entry is corrupt: {0}")]
    CorruptCache(String),

    /// The upstream rate provider failed.
    #[error("Rate provider failed: {0}")]
    Provider(#[from] ProviderError),
}

impl RateError {
    /// Label used in metrics and logs.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            RateError::MissingRates { .. } => "missing_rates",
            RateError::InvalidRate(_) => "invalid_rate",
            RateError::CacheUnavailable(_) => "cache_unavailable",
            RateError::CorruptCache(_) => "corrupt_cache",
            RateError::Provider(_) => "provider",
        }
    }
}

impl From<CacheError> for RateError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Serialization(msg) => RateError::CorruptCache(msg),
            CacheError::Unavailable(_) => RateError::CacheUnavailable(err),
        }
    }
}

/// Errors from a [`RateProvider`](crate::provider::RateProvider).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    /// Connection failure or timeout.
    #[error("Provider unreachable: {0}")]
    Unreachable(String),

    /// Non-success HTTP status.
    #[error("Provider returned status {0}")]
    Status(u16),

    /// Response body could not be decoded.
    #[error("Provider response could not be decoded: {0}")]
    Decode(String),
}

/// Error returned by a [`ConversionSink`](crate::tasks::conversion_consumer::ConversionSink).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Conversion sink rejected outcome: {0}")]
pub struct SinkError(pub String);

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_rates_message_names_pair() {
        let err = RateError::MissingRates {
            base: CurrencyCode::new("EUR").unwrap(),
            target: CurrencyCode::new("USD").unwrap(),
        };
        assert_eq!(err.to_string(), "No exchange rate available for EUR/USD");
        assert_eq!(err.category(), "missing_rates");
    }

    #[test]
    fn test_cache_errors_keep_outage_and_corruption_apart() {
        let outage: RateError = CacheError::Unavailable("connection refused".to_string()).into();
        assert!(matches!(outage, RateError::CacheUnavailable(_)));
        assert_eq!(outage.category(), "cache_unavailable");

        let corrupt: RateError =
            CacheError::Serialization("decode exchange_rates:GBP_USD".to_string()).into();
        assert!(matches!(corrupt, RateError::CorruptCache(_)));
        assert_eq!(corrupt.category(), "corrupt_cache");
    }

    #[test]
    fn test_provider_error_converts() {
        let err: RateError = ProviderError::Status(503).into();
        assert!(matches!(err, RateError::Provider(ProviderError::Status(503))));
        assert_eq!(err.category(), "provider");
    }
}
