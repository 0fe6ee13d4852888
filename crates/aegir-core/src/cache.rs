//! Distributed cache capability with an in-memory TTL implementation.
//!
//! The engine only requires key-level operations: set-with-expiry, get, and
//! delete, over namespaced string keys. Production deployments plug in a
//! shared store (Redis, Memcached); [`InMemoryCache`] serves tests and
//! single-node setups.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::RwLock;

/// Failures of the distributed cache capability.
///
/// These are transport faults, not protocol rejections; callers decide
/// whether to degrade or propagate.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing store could not be reached or answered abnormally.
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// External key-value store used for request correlation entries.
///
/// Keys are namespaced strings (`"<purpose>:" + identifier`). No cross-key
/// transaction is required; every entry is independently expendable.
#[async_trait]
pub trait DistributedCache: Send + Sync {
    /// Fetch a value by key. Expired or missing entries read as `None`.
    async fn get_string(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Store a value under a key with the given time-to-live.
    async fn set_string(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Delete a key. Removing an absent key succeeds (idempotent).
    async fn remove(&self, key: &str) -> Result<(), CacheError>;
}

/// Internal entry wrapping a value with its expiry stamp.
#[derive(Debug, Clone)]
struct CachedEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// In-memory TTL cache.
///
/// Expired entries are evicted lazily on read; a read past the expiry stamp
/// behaves exactly like a miss.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, CachedEntry>>,
}

impl InMemoryCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub async fn live_count(&self) -> usize {
        let now = Utc::now();
        let entries = self.entries.read().await;
        entries.values().filter(|e| e.expires_at > now).count()
    }
}

#[async_trait]
impl DistributedCache for InMemoryCache {
    async fn get_string(&self, key: &str) -> Result<Option<String>, CacheError> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) if Utc::now() < entry.expires_at => {
                tracing::debug!(key, "cache hit");
                Ok(Some(entry.value.clone()))
            }
            Some(_) => {
                tracing::debug!(key, "cache entry expired");
                Ok(None)
            }
            None => {
                tracing::debug!(key, "cache miss");
                Ok(None)
            }
        }
    }

    async fn set_string(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let entry = CachedEntry {
            value: value.to_string(),
            expires_at: Utc::now() + ttl,
        };
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = InMemoryCache::new();
        cache
            .set_string("oidc:test:abc", "payload", Duration::minutes(5))
            .await
            .unwrap();

        let value = cache.get_string("oidc:test:abc").await.unwrap();
        assert_eq!(value.as_deref(), Some("payload"));
    }

    #[tokio::test]
    async fn test_miss_reads_as_none() {
        let cache = InMemoryCache::new();
        assert!(cache.get_string("absent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_entry_reads_as_none() {
        let cache = InMemoryCache::new();
        cache
            .set_string("k", "v", Duration::milliseconds(-1))
            .await
            .unwrap();

        assert!(cache.get_string("k").await.unwrap().is_none());
        assert_eq!(cache.live_count().await, 0);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let cache = InMemoryCache::new();
        cache
            .set_string("k", "v", Duration::minutes(5))
            .await
            .unwrap();

        cache.remove("k").await.unwrap();
        // Second removal of the same key must not error.
        cache.remove("k").await.unwrap();
        assert!(cache.get_string("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let cache = InMemoryCache::new();
        cache
            .set_string("k", "v1", Duration::minutes(5))
            .await
            .unwrap();
        cache
            .set_string("k", "v2", Duration::minutes(5))
            .await
            .unwrap();

        assert_eq!(cache.get_string("k").await.unwrap().as_deref(), Some("v2"));
    }
}
