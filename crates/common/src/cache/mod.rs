//! Key/value cache abstraction with per-key TTL.
//!
//! The cache is the source of truth for "is this issued token still usable"
//! and holds the grouped exchange-rate tables. Implementations must surface
//! an unreachable backend as [`CacheError::Unavailable`], which callers treat
//! as a failure mode distinct from "value absent" (`Ok(None)`).
//!
//! # Primitives
//!
//! - `set` / `get` / `remove` - plain operations, no cross-key guarantees
//! - `set_if_absent` - atomic reservation (token issuance collision check)
//! - `take` - atomic get-and-delete (single-use token consumption)
//!
//! [`CacheStoreExt`] layers JSON helpers on top of any store.

mod redis_store;

pub use redis_store::RedisCacheStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by cache operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The backing store could not be reached or rejected the command.
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be encoded or decoded.
    #[error("Cache serialization error: {0}")]
    Serialization(String),
}

/// Key/value store with per-key time-to-live.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Fetch the value under `key`; expired and missing keys are `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Delete `key`. Deleting a missing key succeeds.
    async fn remove(&self, key: &str) -> Result<(), CacheError>;

    /// Store `value` only if `key` does not exist. Returns `false` when the
    /// key was already present (nothing written).
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
        -> Result<bool, CacheError>;

    /// Atomically fetch and delete the value under `key`.
    async fn take(&self, key: &str) -> Result<Option<String>, CacheError>;
}

/// JSON helpers available on every [`CacheStore`].
#[async_trait]
pub trait CacheStoreExt: CacheStore {
    /// Serialize `value` as JSON and store it.
    async fn set_json<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError>
    where
        T: Serialize + Sync;

    /// Fetch and deserialize a JSON value.
    async fn get_json<T>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned + Send;
}

#[async_trait]
impl<S: CacheStore + ?Sized> CacheStoreExt for S {
    async fn set_json<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError>
    where
        T: Serialize + Sync,
    {
        let json = serde_json::to_string(value)
            .map_err(|e| CacheError::Serialization(format!("encode {key}: {e}")))?;
        self.set(key, &json, ttl).await
    }

    async fn get_json<T>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| CacheError::Serialization(format!("decode {key}: {e}"))),
            None => Ok(None),
        }
    }
}

/// Convert a TTL to whole milliseconds, never below 1ms.
///
/// Redis rejects `PX 0`, and a sub-millisecond TTL would otherwise round to it.
#[must_use]
pub fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis_floor() {
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::from_micros(300)), 1);
        assert_eq!(ttl_millis(Duration::from_secs(2)), 2000);
    }

    #[test]
    fn test_cache_error_messages() {
        let err = CacheError::Unavailable("connection refused".to_string());
        assert_eq!(err.to_string(), "Cache unavailable: connection refused");
    }
}
