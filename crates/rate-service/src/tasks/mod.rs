//! Background tasks for the rate worker.
//!
//! - `rate_refresher` keeps the exchange-rate cache warm and announces the
//!   first successful cycle on a [`RunSignal`](common::run_signal::RunSignal)
//! - `conversion_consumer` converts incoming amounts, but only after that
//!   announcement

pub mod conversion_consumer;
pub mod rate_refresher;

pub use conversion_consumer::{start_conversion_consumer, ConversionSink, ConversionSource};
pub use rate_refresher::{run_refresh_cycle, start_rate_refresher};
