//! In-memory `CacheStore` for tests.
//!
//! Entries expire on the tokio clock, so `tokio::time::pause()` and
//! `advance()` drive TTL expiry deterministically. `set_if_absent` and
//! `take` run under a single lock and are atomic, matching Redis
//! `SET NX` and `GETDEL`.
//!
//! # Example
//!
//! ```rust,ignore
//! use ft_test_utils::MemoryCacheStore;
//!
//! let cache = MemoryCacheStore::new();
//! cache.set("session:abc", "true", Duration::from_secs(60)).await?;
//!
//! // Simulate an outage
//! cache.set_unavailable(true);
//! assert!(cache.get("session:abc").await.is_err());
//! ```

use async_trait::async_trait;
use common::cache::{CacheError, CacheStore};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    entries: Mutex<HashMap<String, Entry>>,
    unavailable: AtomicBool,
    fail_next: AtomicUsize,
    operations: AtomicUsize,
}

/// In-memory cache with per-key TTL and failure injection.
///
/// Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    inner: Arc<Inner>,
}

impl MemoryCacheStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail with `CacheError::Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail the next `count` operations, then recover.
    pub fn fail_next(&self, count: usize) {
        self.inner.fail_next.store(count, Ordering::SeqCst);
    }

    /// Number of operations attempted so far (including failed ones).
    pub fn operation_count(&self) -> usize {
        self.inner.operations.load(Ordering::SeqCst)
    }

    /// Read a live value without counting an operation or injecting failures.
    pub fn peek(&self, key: &str) -> Option<String> {
        let entries = self.inner.entries.lock().unwrap();
        entries
            .get(key)
            .filter(|e| e.expires_at > Instant::now())
            .map(|e| e.value.clone())
    }

    /// Whether a live entry exists for `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.peek(key).is_some()
    }

    /// All live keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let entries = self.inner.entries.lock().unwrap();
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.expires_at > now)
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Remaining TTL of a live entry.
    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.inner.entries.lock().unwrap();
        entries
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.expires_at - now)
    }

    /// Insert directly, bypassing failure injection.
    pub fn seed(&self, key: &str, value: &str, ttl: Duration) {
        let mut entries = self.inner.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    fn check_available(&self, op: &str) -> Result<(), CacheError> {
        self.inner.operations.fetch_add(1, Ordering::SeqCst);

        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable(format!("{op}: injected outage")));
        }
        let consumed = self
            .inner
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            return Err(CacheError::Unavailable(format!("{op}: injected failure")));
        }
        Ok(())
    }

    fn live_value(entries: &mut HashMap<String, Entry>, key: &str) -> Option<String> {
        match entries.get(key) {
            Some(e) if e.expires_at > Instant::now() => Some(e.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.check_available("set")?;
        self.seed(key, value, ttl);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check_available("get")?;
        let mut entries = self.inner.entries.lock().unwrap();
        Ok(Self::live_value(&mut entries, key))
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.check_available("remove")?;
        self.inner.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        self.check_available("set_if_absent")?;
        let mut entries = self.inner.entries.lock().unwrap();
        if Self::live_value(&mut entries, key).is_some() {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(true)
    }

    async fn take(&self, key: &str) -> Result<Option<String>, CacheError> {
        self.check_available("take")?;
        let mut entries = self.inner.entries.lock().unwrap();
        let value = Self::live_value(&mut entries, key);
        entries.remove(key);
        Ok(value)
    }
}
