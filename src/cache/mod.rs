pub mod memory;
pub mod redis_store;

use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::error::WeatherError;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

/// How long an upstream payload stays cached.
pub const CACHE_TTL: Duration = Duration::from_secs(3600);

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Minimal key-value contract shared by the response cache and the rate limiter.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes `value` in one step, expiring it after `ttl`.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Increments the counter at `key`. A new counter expires after `ttl`;
    /// incrementing an existing one leaves its expiry untouched.
    async fn incr(&self, key: &str, ttl: Duration) -> Result<u64, StoreError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

pub struct CachedFetcher {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl CachedFetcher {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_ttl(store, CACHE_TTL)
    }

    pub fn with_ttl(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Returns the cached payload for `key`, or runs `fetch` and caches its
    /// body. Only a body that parses as JSON is ever written.
    ///
    /// The store is best effort: a failed lookup counts as a miss and a
    /// failed write still returns the fetched payload.
    pub async fn fetch_or_cache<F, Fut>(
        &self,
        key: &str,
        fetch: F,
    ) -> Result<(Value, CacheStatus), WeatherError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, WeatherError>>,
    {
        match self.store.get(key).await {
            Ok(Some(cached)) => match serde_json::from_str(&cached) {
                Ok(payload) => {
                    tracing::info!("Cache hit: data retrieved from store");
                    return Ok((payload, CacheStatus::Hit));
                }
                Err(e) => tracing::warn!("Ignoring unreadable cache entry {}: {}", key, e),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!("Cache lookup failed, going upstream: {}", e),
        }

        let body = fetch().await?;
        let payload: Value = serde_json::from_str(&body).map_err(|e| {
            WeatherError::Unexpected(format!("upstream returned invalid JSON: {}", e))
        })?;

        if let Err(e) = self.store.set_ex(key, &body, self.ttl).await {
            tracing::warn!("Failed to cache upstream response: {}", e);
        }

        tracing::info!("Cache miss: fetched data from the weather API");
        Ok((payload, CacheStatus::Miss))
    }
}
