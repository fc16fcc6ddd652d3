// src/cache.rs

//! Cache stores for discovery documents and key sets.
//!
//! The relying party never owns a process-wide cache. A [`CacheStore`] is handed to
//! the [`ConfigBuilder`](crate::config::ConfigBuilder) and every component reads and
//! writes through it, which lets several providers share one backend (or tests use
//! a throwaway in-memory one).

use crate::error::Result;
#[cfg(feature = "redis-cache")]
use crate::error::NilaOidcError;
use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Prefix shared by every key this crate writes.
pub const CACHE_KEY_PREFIX: &str = "nila-oidc-rp";

/// Tag of the cached discovery document.
pub const CONFIGURATION_TAG: &str = "configuration";

/// Tag of the cached JSON Web Key Set.
pub const JWKS_TAG: &str = "jwks";

/// A key/value store with per-entry expiry.
///
/// Implementations must be safe to share between tasks; concurrent `set`s for the
/// same key are last-writer-wins.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the cached value, or `None` on a miss or after expiry.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Stores `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;
}

/// Derives the cache key for `tag` from the metadata URL.
///
/// The URL is hashed so that keys stay short and backend-safe while two providers
/// pointed at different metadata URLs never collide.
pub fn cache_key(metadata_url: &str, tag: &str) -> String {
    let digest = Sha256::digest(metadata_url.as_bytes());
    format!("{CACHE_KEY_PREFIX}||{digest:x}||{tag}")
}

#[derive(Clone)]
struct CachedEntry {
    value: Arc<Value>,
    ttl: Duration,
}

/// Expires every entry after the TTL it was stored with.
struct PerEntryTtl;

impl Expiry<String, CachedEntry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process [`CacheStore`] backed by `moka`.
#[derive(Clone)]
pub struct MemoryCacheStore {
    entries: Cache<String, CachedEntry>,
}

impl MemoryCacheStore {
    /// Creates a store holding at most `max_capacity` entries.
    pub fn new(max_capacity: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        // Two entries per provider; plenty of headroom for shared use.
        Self::new(1_000)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self
            .entries
            .get(key)
            .await
            .map(|entry| entry.value.as_ref().clone()))
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        self.entries
            .insert(
                key.to_string(),
                CachedEntry {
                    value: Arc::new(value),
                    ttl,
                },
            )
            .await;
        Ok(())
    }
}

/// [`CacheStore`] backed by Redis, for sharing discovery data between processes.
#[cfg(feature = "redis-cache")]
#[derive(Clone)]
pub struct RedisCacheStore {
    client: redis::Client,
}

#[cfg(feature = "redis-cache")]
impl RedisCacheStore {
    /// Opens a client for `redis_url` (e.g. `redis://127.0.0.1/`). No connection is made yet.
    pub fn open(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| NilaOidcError::cache_backend("cannot open redis client", e))?;
        Ok(Self { client })
    }

    pub fn from_client(client: redis::Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| NilaOidcError::cache_backend("cannot connect to redis", e))
    }
}

#[cfg(feature = "redis-cache")]
#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        use redis::AsyncCommands;

        let mut conn = self.connection().await?;
        let raw: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| NilaOidcError::cache_backend(format!("redis GET {key} failed"), e))?;

        raw.map(|json| {
            serde_json::from_str(&json).map_err(|e| {
                NilaOidcError::cache_backend(format!("cached value under {key} is not JSON"), e)
            })
        })
        .transpose()
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        use redis::AsyncCommands;

        // Redis rejects a zero expiry; an entry that expires immediately is simply not stored.
        let ttl_secs = ttl.as_secs();
        if ttl_secs == 0 {
            return Ok(());
        }

        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value.to_string(), ttl_secs)
            .await
            .map_err(|e| NilaOidcError::cache_backend(format!("redis SET {key} failed"), e))
    }
}
