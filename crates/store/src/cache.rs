//! Key-value cache with per-entry TTL.

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use serde_json::Value;
use std::time::{Duration, Instant};

/// Maximum cache entries.
const CACHE_MAX_CAPACITY: u64 = 10_000;

/// Short-lived key-value cache.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;

    /// Stores `value` under `key` until `ttl` elapses.
    async fn set(&self, key: &str, value: Value, ttl: Duration);

    async fn delete(&self, key: &str);
}

#[derive(Clone)]
struct Entry {
    value: Value,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with.
struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process cache backed by moka.
#[derive(Clone)]
pub struct MokaCache {
    inner: Cache<String, Entry>,
}

impl MokaCache {
    pub fn new() -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(CACHE_MAX_CAPACITY)
                .expire_after(EntryExpiry)
                .build(),
        }
    }
}

impl Default for MokaCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueCache for MokaCache {
    async fn get(&self, key: &str) -> Option<Value> {
        self.inner.get(key).await.map(|entry| entry.value)
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) {
        self.inner.insert(key.to_string(), Entry { value, ttl }).await;
    }

    async fn delete(&self, key: &str) {
        self.inner.invalidate(key).await;
    }
}
