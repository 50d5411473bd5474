//! Exchange-rate cache and rate worker.
//!
//! # Modules
//!
//! - `models` - rate rows, provider quotes, conversion messages
//! - `cache` - [`ExchangeRateCache`]: grouped, time-versioned rates with
//!   interval lookup and actual-rate fallback
//! - `provider` - [`RateProvider`] collaborator and its HTTP implementation
//! - `tasks` - the refresh worker and the gated conversion consumer
//! - `config` - environment configuration for the `rate-worker` binary
//! - `errors` - [`RateError`], [`ProviderError`]
//! - `observability` - metrics

#![warn(clippy::pedantic)]

pub mod cache;
pub mod config;
pub mod errors;
pub mod models;
pub mod observability;
pub mod provider;
pub mod tasks;

pub use cache::{ExchangeRateCache, MergeSummary};
pub use errors::{ProviderError, RateError, SinkError};
pub use models::{ConversionOutcome, ConversionRequest, ExchangeRate, RateQuote};
pub use provider::{HttpRateProvider, RateProvider};
