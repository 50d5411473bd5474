//! # Fintrack Test Utilities
//!
//! Mocks and fixtures for testing the token and rate services without Redis,
//! a real signing key, or a live rate provider.
//!
//! ## Modules
//!
//! - `memory_cache` - [`MemoryCacheStore`]: TTL-aware in-memory `CacheStore`
//!   with failure injection
//! - `scripted_signer` - [`ScriptedSigner`]: deterministic `Signer` that can
//!   replay the same raw token to force collisions
//! - `mock_rate_provider` - [`MockRateProvider`]: queued provider responses
//! - `conversion` - counting channel source and recording sink
//! - `crypto_fixtures` - deterministic Ed25519 keys
//! - `rate_fixtures` - currency codes, dates and rate histories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ft_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let cache = Arc::new(MemoryCacheStore::new());
//!     let signer = Arc::new(ScriptedSigner::new().with_script(["dup", "dup", "fresh"]));
//!     let manager = TokenLifecycleManager::new(cache.clone(), signer);
//!     // ...
//! }
//! ```

pub mod conversion;
pub mod crypto_fixtures;
pub mod memory_cache;
pub mod mock_rate_provider;
pub mod rate_fixtures;
pub mod scripted_signer;

pub use conversion::*;
pub use crypto_fixtures::*;
pub use memory_cache::*;
pub use mock_rate_provider::*;
pub use rate_fixtures::*;
pub use scripted_signer::*;
