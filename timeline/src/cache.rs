//! Compute-if-absent caching of timeline payloads.
//!
//! The store is treated as best-effort: read and write failures are logged
//! and counted, and the request proceeds as if the entry was missing.

use async_trait::async_trait;
use moka::Expiry;
use moka::sync::Cache;
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::counter;
use std::future::Future;
use std::time::{Duration, Instant};

use crate::metrics_defs::{CACHE_ERROR, CACHE_HIT, CACHE_MISS};

#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),

    #[error("cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Key-value store holding JSON text with a per-entry time to live.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;
}

#[derive(Clone)]
struct CacheEntry {
    value: String,
    ttl: Duration,
}

struct EntryTtl;

impl Expiry<String, CacheEntry> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process store bounded by entry count.
pub struct MemoryStore {
    cache: Cache<String, CacheEntry>,
}

impl MemoryStore {
    pub fn new(max_entries: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(EntryTtl)
            .build();

        MemoryStore { cache }
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.cache.get(key).map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        self.cache.insert(key.to_string(), CacheEntry { value, ttl });
        Ok(())
    }
}

/// Store used when caching is disabled; every lookup misses.
pub struct NoopStore;

#[async_trait]
impl CacheStore for NoopStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }
}

#[derive(Debug, PartialEq)]
pub struct Cached<T> {
    pub data: T,
    pub from_cache: bool,
}

/// Returns the live entry under `key`, or runs `producer` and stores its
/// result for `ttl`.
///
/// A producer error is returned as is and nothing is stored, so the next call
/// runs the producer again. Concurrent misses on the same key may each run
/// the producer.
pub async fn with_cache<T, E, F, Fut>(
    store: &dyn CacheStore,
    key: &str,
    ttl: Duration,
    producer: F,
) -> Result<Cached<T>, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match store.get(key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(data) => {
                counter!(CACHE_HIT).increment(1);
                return Ok(Cached {
                    data,
                    from_cache: true,
                });
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding undecodable cache entry");
            }
        },
        Ok(None) => {}
        Err(e) => {
            counter!(CACHE_ERROR, "op" => "get").increment(1);
            tracing::warn!(key, error = %e, "cache read failed");
        }
    }

    counter!(CACHE_MISS).increment(1);
    let data = producer().await?;

    match serde_json::to_string(&data) {
        Ok(raw) => {
            if let Err(e) = store.set(key, raw, ttl).await {
                counter!(CACHE_ERROR, "op" => "set").increment(1);
                tracing::warn!(key, error = %e, "cache write failed");
            }
        }
        Err(e) => tracing::warn!(key, error = %e, "could not serialize value for cache"),
    }

    Ok(Cached {
        data,
        from_cache: false,
    })
}
