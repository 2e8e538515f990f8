//! In-memory cache implementation using moka

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use moka::Expiry;

use crate::domain::cache::{Cache, GlobPattern, KeyFilter};
use crate::domain::DomainError;

/// Configuration for in-memory cache
#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    /// Maximum number of entries
    pub max_capacity: u64,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

impl InMemoryCacheConfig {
    /// Sets the maximum number of entries
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }
}

/// Cache entry stored in moka
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Serialized JSON value
    data: String,
    ttl: Duration,
}

/// Expires each entry after its own TTL, restarting the clock on overwrite
struct EntryExpiry;

impl Expiry<String, CacheEntry> for EntryExpiry {
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

/// Thread-safe in-memory cache implementation using moka
///
/// Used when no Redis is configured (local development) and in tests.
/// Eviction is LRU-like once `max_capacity` is reached.
#[derive(Debug)]
pub struct InMemoryCache {
    cache: MokaCache<String, CacheEntry>,
    config: InMemoryCacheConfig,
}

impl InMemoryCache {
    /// Creates a new in-memory cache with default configuration
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    /// Creates a new in-memory cache with the given configuration
    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        let cache = MokaCache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(EntryExpiry)
            .build();

        Self { cache, config }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        Ok(self.cache.get(key).await.map(|entry| entry.data))
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        let entry = CacheEntry {
            data: value.to_string(),
            ttl,
        };

        self.cache.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.cache.remove(key).await.is_some())
    }

    async fn delete_matching(
        &self,
        pattern: &str,
        filter: &KeyFilter<'_>,
    ) -> Result<usize, DomainError> {
        let glob = GlobPattern::new(pattern)?;

        self.cache.run_pending_tasks().await;

        let keys_to_delete: Vec<String> = self
            .cache
            .iter()
            .filter(|(k, _)| glob.matches(k.as_str()) && filter(k.as_str()))
            .map(|(k, _)| k.to_string())
            .collect();

        let mut deleted = 0;

        for key in keys_to_delete {
            if self.cache.remove(&key).await.is_some() {
                deleted += 1;
            }
        }

        Ok(deleted)
    }

    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.cache.get(key).await.is_some())
    }

    async fn clear(&self) -> Result<(), DomainError> {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        Ok(())
    }

    async fn size(&self) -> Result<usize, DomainError> {
        self.cache.run_pending_tasks().await;
        Ok(self.cache.entry_count() as usize)
    }

    async fn ping(&self) -> Result<(), DomainError> {
        Ok(())
    }

    async fn info(&self) -> Result<String, DomainError> {
        self.cache.run_pending_tasks().await;

        Ok(format!(
            "# Memory\r\nbackend:in_memory\r\nentries:{}\r\nweighted_size:{}\r\nmax_capacity:{}\r\n",
            self.cache.entry_count(),
            self.cache.weighted_size(),
            self.config.max_capacity
        ))
    }

    fn backend_name(&self) -> &'static str {
        "in_memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cache::CacheExt;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = InMemoryCache::new();

        cache
            .set("key1", &"value1", Duration::from_secs(60))
            .await
            .unwrap();

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert_eq!(result, Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let cache = InMemoryCache::new();

        let result: Option<String> = cache.get("missing").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let cache = InMemoryCache::new();

        cache
            .set("key1", &"value1", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(cache.delete("key1").await.unwrap());
        assert!(!cache.delete("key1").await.unwrap());

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_exists() {
        let cache = InMemoryCache::new();

        cache
            .set("key1", &"value1", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(cache.exists("key1").await.unwrap());
        assert!(!cache.exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let cache = InMemoryCache::new();

        cache
            .set("short", &"value1", Duration::from_millis(50))
            .await
            .unwrap();
        cache
            .set("long", &"value2", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(cache.exists("short").await.unwrap());

        tokio::time::sleep(Duration::from_millis(150)).await;

        let short: Option<String> = cache.get("short").await.unwrap();
        let long: Option<String> = cache.get("long").await.unwrap();
        assert!(short.is_none());
        assert_eq!(long, Some("value2".to_string()));
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let cache = InMemoryCache::new();

        cache
            .set("key1", &"old", Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set("key1", &"new", Duration::from_secs(60))
            .await
            .unwrap();

        let result: Option<String> = cache.get("key1").await.unwrap();
        assert_eq!(result, Some("new".to_string()));
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = InMemoryCache::new();

        cache
            .set("key1", &"value1", Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set("key2", &"value2", Duration::from_secs(60))
            .await
            .unwrap();

        cache.clear().await.unwrap();

        assert_eq!(cache.size().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_pattern() {
        let cache = InMemoryCache::new();

        for key in [
            "GET:anonymous:/api/products",
            "GET:u1:/api/products?page=2",
            "GET:u1:/api/orders",
        ] {
            cache.set(key, &"data", Duration::from_secs(60)).await.unwrap();
        }

        let deleted = cache.delete_pattern("GET:*:/api/products*").await.unwrap();
        assert_eq!(deleted, 2);

        assert_eq!(cache.size().await.unwrap(), 1);
        assert!(cache.exists("GET:u1:/api/orders").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_matching_skips_filtered_keys() {
        let cache = InMemoryCache::new();

        for key in ["GET:u1:/api/orders", "GET:u2:/api/search?at=10:u1:x"] {
            cache.set(key, &"data", Duration::from_secs(60)).await.unwrap();
        }

        let deleted = cache
            .delete_matching("*:u1:*", &|key: &str| key.starts_with("GET:u1:"))
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        assert!(cache.exists("GET:u2:/api/search?at=10:u1:x").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_pattern_invalid() {
        let cache = InMemoryCache::new();

        let result = cache.delete_pattern("broken[").await;
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_info_reports_entries() {
        let cache = InMemoryCache::with_config(InMemoryCacheConfig::default().with_max_capacity(100));

        cache.set("key1", &1, Duration::from_secs(60)).await.unwrap();

        let info = cache.info().await.unwrap();
        assert!(info.contains("backend:in_memory"));
        assert!(info.contains("entries:1"));
        assert!(info.contains("max_capacity:100"));
        assert_eq!(cache.backend_name(), "in_memory");
    }
}
