//! Redis-backed [`CacheStore`].
//!
//! # Connection Pattern
//!
//! The redis-rs `MultiplexedConnection` is cheap to clone and safe to use
//! concurrently, so every operation clones it instead of sharing it behind a
//! lock. Redis serializes commands per key; no in-process locking is needed.
//!
//! # Commands
//!
//! - `set` -> `SET key value PX ttl`
//! - `set_if_absent` -> `SET key value NX PX ttl`
//! - `take` -> `GETDEL key` (Redis 6.2+)

use super::{ttl_millis, CacheError, CacheStore};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tracing::{error, instrument, warn};

/// Cache store over a multiplexed Redis connection.
///
/// Cheaply cloneable; clone it into each task rather than wrapping it in a mutex.
#[derive(Clone)]
pub struct RedisCacheStore {
    connection: MultiplexedConnection,
}

impl RedisCacheStore {
    /// Open a client and establish the multiplexed connection.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Unavailable` if the URL is invalid or the server
    /// cannot be reached.
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = Client::open(redis_url).map_err(|e| {
            // Do NOT log redis_url; it may contain credentials.
            error!(target: "common.cache", error = %e, "Failed to open Redis client");
            CacheError::Unavailable(format!("Failed to open Redis client: {e}"))
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                error!(target: "common.cache", error = %e, "Failed to connect to Redis");
                CacheError::Unavailable(format!("Failed to connect to Redis: {e}"))
            })?;

        Ok(Self { connection })
    }

    /// Wrap an already-established connection.
    #[must_use]
    pub fn from_connection(connection: MultiplexedConnection) -> Self {
        Self { connection }
    }
}

fn unavailable(operation: &'static str, e: &redis::RedisError) -> CacheError {
    warn!(
        target: "common.cache",
        operation = operation,
        error = %e,
        "Redis command failed"
    );
    CacheError::Unavailable(format!("{operation} failed: {e}"))
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    #[instrument(skip_all)]
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable("set", &e))?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();
        conn.get(key).await.map_err(|e| unavailable("get", &e))
    }

    #[instrument(skip_all)]
    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let _: i64 = conn.del(key).await.map_err(|e| unavailable("remove", &e))?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, CacheError> {
        let mut conn = self.connection.clone();
        // Reply is "OK" when written, nil when the key already existed.
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable("set_if_absent", &e))?;
        Ok(reply.is_some())
    }

    #[instrument(skip_all)]
    async fn take(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();
        redis::cmd("GETDEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable("take", &e))
    }
}
