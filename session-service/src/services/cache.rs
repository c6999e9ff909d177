//! Read-through query cache with category-wide invalidation.
//!
//! Keys are namespaced `{category}:{rest}`; writers drop the whole category
//! after a mutation rather than tracking individual keys. Cache failures are
//! logged and absorbed here so reads degrade to storage instead of erroring.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use redis::{aio::ConnectionManager, Client};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

use super::metrics::{record_cache_eviction, record_cache_read};

pub const CATEGORY_PRINCIPALS: &str = "principals";
pub const CATEGORY_PROJECTS: &str = "projects";
pub const CATEGORY_TASKS: &str = "tasks";

/// Build a namespaced cache key
pub fn cache_key(category: &str, rest: &str) -> String {
    format!("{}:{}", category, rest)
}

#[async_trait]
pub trait QueryCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error>;
    async fn put(&self, key: &str, value: &str, ttl_seconds: i64) -> Result<(), anyhow::Error>;
    async fn evict_category(&self, category: &str) -> Result<(), anyhow::Error>;
}

#[derive(Clone)]
pub struct RedisCache {
    _client: Client,
    manager: ConnectionManager,
}

impl RedisCache {
    pub async fn new(redis_url: &str) -> Result<Self, anyhow::Error> {
        tracing::info!(url = %redis_url, "Connecting to Redis");
        let client = Client::open(redis_url.to_string())?;

        // Use ConnectionManager for automatic reconnection
        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");

        Ok(Self {
            _client: client,
            manager,
        })
    }
}

#[async_trait]
impl QueryCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read cache: {}", e))
    }

    async fn put(&self, key: &str, value: &str, ttl_seconds: i64) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to write cache: {}", e))
    }

    /// Walk the keyspace with SCAN and drop every key under the category.
    /// SCAN keeps the eviction incremental on a shared Redis.
    async fn evict_category(&self, category: &str) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        let pattern = format!("{}:*", category);
        let mut cursor: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to scan cache keys: {}", e))?;

            if !keys.is_empty() {
                redis::cmd("DEL")
                    .arg(&keys)
                    .query_async::<_, ()>(&mut conn)
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to drop cache keys: {}", e))?;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(())
    }
}

/// Process-local cache for tests and single-node runs
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueryCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, anyhow::Error> {
        let now = Utc::now();
        let mut entries = self
            .entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Cache mutex poisoned: {}", e))?;

        if let Some((value, expires_at)) = entries.get(key) {
            if now < *expires_at {
                return Ok(Some(value.clone()));
            }
        } else {
            return Ok(None);
        }

        // Lazy expiry: the stale entry goes on first read past its deadline
        entries.remove(key);
        Ok(None)
    }

    async fn put(&self, key: &str, value: &str, ttl_seconds: i64) -> Result<(), anyhow::Error> {
        let expires_at = Utc::now() + Duration::seconds(ttl_seconds);
        self.entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Cache mutex poisoned: {}", e))?
            .insert(key.to_string(), (value.to_string(), expires_at));
        Ok(())
    }

    async fn evict_category(&self, category: &str) -> Result<(), anyhow::Error> {
        let prefix = format!("{}:", category);
        self.entries
            .lock()
            .map_err(|e| anyhow::anyhow!("Cache mutex poisoned: {}", e))?
            .retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }
}

/// Cache that refuses every call; exercises the degraded-read path in tests
#[derive(Default)]
pub struct FailingCache;

impl FailingCache {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl QueryCache for FailingCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, anyhow::Error> {
        Err(anyhow::anyhow!("cache unavailable"))
    }

    async fn put(&self, _key: &str, _value: &str, _ttl_seconds: i64) -> Result<(), anyhow::Error> {
        Err(anyhow::anyhow!("cache unavailable"))
    }

    async fn evict_category(&self, _category: &str) -> Result<(), anyhow::Error> {
        Err(anyhow::anyhow!("cache unavailable"))
    }
}

fn category_of(key: &str) -> &str {
    key.split(':').next().unwrap_or(key)
}

/// Read and deserialize a cached value; any failure reads as a miss.
pub async fn read_json<T: DeserializeOwned>(cache: &dyn QueryCache, key: &str) -> Option<T> {
    let raw = match cache.get(key).await {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            record_cache_read(category_of(key), "miss");
            return None;
        }
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "cache read failed");
            record_cache_read(category_of(key), "error");
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => {
            record_cache_read(category_of(key), "hit");
            Some(value)
        }
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "cached payload failed to deserialize");
            record_cache_read(category_of(key), "error");
            None
        }
    }
}

/// Serialize and store a value; failures are logged and absorbed.
pub async fn write_json<T: Serialize>(
    cache: &dyn QueryCache,
    key: &str,
    value: &T,
    ttl_seconds: i64,
) {
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "cache payload failed to serialize");
            return;
        }
    };

    if let Err(e) = cache.put(key, &raw, ttl_seconds).await {
        tracing::warn!(key = %key, error = %e, "cache write failed");
    }
}

/// Drop every cached entry under a category; failures are logged and absorbed.
pub async fn evict(cache: &dyn QueryCache, category: &str) {
    match cache.evict_category(category).await {
        Ok(()) => record_cache_eviction(category),
        Err(e) => {
            tracing::warn!(category = %category, error = %e, "cache eviction failed");
        }
    }
}
