use async_trait::async_trait;
use moka::{future::Cache, Expiry};
use std::time::{Duration, Instant};

use super::{KvStore, StoreError};

#[derive(Clone, Debug)]
struct StoredValue {
    data: String,
    /// `None` keeps whatever expiry the entry already has.
    ttl: Option<Duration>,
}

struct PerEntryTtl;

impl Expiry<String, StoredValue> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &StoredValue,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &StoredValue,
        _updated_at: Instant,
        duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl.or(duration_until_expiry)
    }
}

/// In-process store used when no Redis host is configured. Entries expire
/// individually, mirroring `SET ... EX`.
///
/// Counters live in their own cache so a burst of payload writes can never
/// evict them and reset a client's quota.
#[derive(Clone)]
pub struct MemoryStore {
    values: Cache<String, StoredValue>,
    counters: Cache<String, StoredValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(10_000, 100_000)
    }

    pub fn with_capacity(max_values: u64, max_counters: u64) -> Self {
        Self {
            values: build_cache(max_values),
            counters: build_cache(max_counters),
        }
    }

    #[cfg(test)]
    async fn run_pending_tasks(&self) {
        self.values.run_pending_tasks().await;
        self.counters.run_pending_tasks().await;
    }
}

fn build_cache(max_capacity: u64) -> Cache<String, StoredValue> {
    Cache::builder()
        .max_capacity(max_capacity)
        .expire_after(PerEntryTtl)
        .build()
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.values.get(key).await.map(|value| value.data))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        self.values
            .insert(
                key.to_string(),
                StoredValue {
                    data: value.to_string(),
                    ttl: Some(ttl),
                },
            )
            .await;
        Ok(())
    }

    async fn incr(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        let entry = self
            .counters
            .entry(key.to_string())
            .and_upsert_with(|existing| {
                let next = match existing {
                    Some(entry) => StoredValue {
                        data: (entry.value().data.parse::<u64>().unwrap_or(0) + 1).to_string(),
                        ttl: None,
                    },
                    None => StoredValue {
                        data: "1".to_string(),
                        ttl: Some(ttl),
                    },
                };
                std::future::ready(next)
            })
            .await;

        Ok(entry.into_value().data.parse().unwrap_or(1))
    }
}
