//! Common infrastructure shared across Fintrack services and workers.

#![warn(clippy::pedantic)]

/// Module for the key/value cache abstraction and its Redis backend
pub mod cache;

/// Module for common configuration blocks
pub mod config;

/// Module for the one-shot start-up coordination signal
pub mod run_signal;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for common domain types
pub mod types;
