//! Token lifecycle management.
//!
//! Issues, verifies, consumes and revokes the four token kinds used by the
//! authentication, password-reset and e-mail confirmation flows.
//!
//! A token is usable only when BOTH hold:
//! 1. the [`Signer`](signer::Signer) accepts its signature and embedded expiry, and
//! 2. the cache holds `{kind-prefix}:{raw} = "true"`.
//!
//! # Modules
//!
//! - `kinds` - the closed set of token kinds and their policy table
//! - `signer` - stateless signing/verification (EdDSA JWT)
//! - `manager` - [`TokenLifecycleManager`]: issuance with collision retry,
//!   verification, consumption, revocation
//! - `config` - environment configuration
//! - `errors` - [`TokenError`]
//! - `observability` - metrics

#![warn(clippy::pedantic)]

pub mod config;
pub mod errors;
pub mod kinds;
pub mod manager;
pub mod observability;
pub mod signer;

pub use errors::TokenError;
pub use kinds::{TokenKind, TokenPolicies, TokenPolicy};
pub use manager::{RetryPolicy, TokenLifecycleManager, TokenPair};
pub use signer::{Ed25519Signer, Signer, SignerError, VerifiedToken};
