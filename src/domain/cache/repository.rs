//! Cache trait definition

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::domain::DomainError;

/// Predicate applied to every key a pattern delete finds, before it is removed
pub type KeyFilter<'a> = dyn Fn(&str) -> bool + Send + Sync + 'a;

/// Generic key-value store with TTL support
///
/// Values travel as JSON text so the trait stays dyn-compatible.
/// Use [`CacheExt`] for typed get/set.
#[async_trait]
pub trait Cache: Send + Sync + Debug {
    /// Gets a raw JSON value from the cache
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError>;

    /// Sets a raw JSON value in the cache with a TTL
    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError>;

    /// Deletes a value from the cache
    async fn delete(&self, key: &str) -> Result<bool, DomainError>;

    /// Deletes every key matching a glob pattern, returning how many were removed
    async fn delete_pattern(&self, pattern: &str) -> Result<usize, DomainError> {
        self.delete_matching(pattern, &|_: &str| true).await
    }

    /// Deletes keys matching a glob pattern for which `filter` returns true
    ///
    /// The glob narrows the scan; `filter` sees each candidate key (without
    /// any backend prefix) and has the final say.
    async fn delete_matching(
        &self,
        pattern: &str,
        filter: &KeyFilter<'_>,
    ) -> Result<usize, DomainError>;

    /// Checks if a key exists in the cache
    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.get_raw(key).await?.is_some())
    }

    /// Clears all entries from the cache
    async fn clear(&self) -> Result<(), DomainError>;

    /// Returns approximate number of entries in the cache
    async fn size(&self) -> Result<usize, DomainError>;

    /// Round-trips to the store to prove it is reachable
    async fn ping(&self) -> Result<(), DomainError>;

    /// Raw backend diagnostics (Redis `INFO`, in-memory summary)
    async fn info(&self) -> Result<String, DomainError>;

    /// Short backend name for logs and stats
    fn backend_name(&self) -> &'static str;
}

/// Extension trait providing typed get/set operations
pub trait CacheExt: Cache {
    /// Gets a typed value from the cache
    fn get<'a, V>(
        &'a self,
        key: &'a str,
    ) -> impl std::future::Future<Output = Result<Option<V>, DomainError>> + Send
    where
        V: DeserializeOwned + Send,
    {
        async move {
            match self.get_raw(key).await? {
                Some(data) => {
                    let value: V = serde_json::from_str(&data).map_err(|e| {
                        DomainError::serialization(format!(
                            "Failed to deserialize cache value: {}",
                            e
                        ))
                    })?;
                    Ok(Some(value))
                }
                None => Ok(None),
            }
        }
    }

    /// Sets a typed value in the cache with a TTL
    fn set<'a, V>(
        &'a self,
        key: &'a str,
        value: &'a V,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), DomainError>> + Send
    where
        V: Serialize + Send + Sync + ?Sized,
    {
        async move {
            let data = serde_json::to_string(value).map_err(|e| {
                DomainError::serialization(format!("Failed to serialize cache value: {}", e))
            })?;
            self.set_raw(key, &data, ttl).await
        }
    }
}

// Blanket implementation for all types implementing Cache
impl<T: Cache + ?Sized> CacheExt for T {}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use crate::domain::cache::GlobPattern;

    #[derive(Debug, Clone)]
    enum Failure {
        Store(String),
        Connection(String),
    }

    /// Mock cache for testing
    ///
    /// Failures can be switched on and off while a test runs, and call
    /// counters show whether an operation reached the store at all.
    #[derive(Debug, Default)]
    pub struct MockCache {
        entries: Mutex<HashMap<String, (String, Duration)>>,
        failure: Mutex<Option<Failure>>,
        gets: AtomicUsize,
        sets: AtomicUsize,
        deletes: AtomicUsize,
    }

    impl MockCache {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_raw_entry(self, key: &str, value: &str) -> Self {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value.to_string(), Duration::from_secs(300)));
            self
        }

        pub fn with_error(self, error: impl Into<String>) -> Self {
            self.fail_with(error);
            self
        }

        pub fn fail_with(&self, error: impl Into<String>) {
            *self.failure.lock().unwrap() = Some(Failure::Store(error.into()));
        }

        pub fn fail_with_connection_error(&self) {
            *self.failure.lock().unwrap() =
                Some(Failure::Connection("Connection refused".to_string()));
        }

        pub fn recover(&self) {
            *self.failure.lock().unwrap() = None;
        }

        pub fn keys(&self) -> Vec<String> {
            let mut keys: Vec<String> = self.entries.lock().unwrap().keys().cloned().collect();
            keys.sort();
            keys
        }

        pub fn raw(&self, key: &str) -> Option<String> {
            self.entries.lock().unwrap().get(key).map(|(v, _)| v.clone())
        }

        pub fn ttl_of(&self, key: &str) -> Option<Duration> {
            self.entries.lock().unwrap().get(key).map(|(_, ttl)| *ttl)
        }

        pub fn get_calls(&self) -> usize {
            self.gets.load(Ordering::SeqCst)
        }

        pub fn set_calls(&self) -> usize {
            self.sets.load(Ordering::SeqCst)
        }

        pub fn delete_calls(&self) -> usize {
            self.deletes.load(Ordering::SeqCst)
        }

        fn check_error(&self) -> Result<(), DomainError> {
            match self.failure.lock().unwrap().clone() {
                Some(Failure::Store(message)) => Err(DomainError::cache(message)),
                Some(Failure::Connection(message)) => Err(DomainError::connection(message)),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl Cache for MockCache {
        async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.check_error()?;

            Ok(self.raw(key))
        }

        async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
            self.sets.fetch_add(1, Ordering::SeqCst);
            self.check_error()?;
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value.to_string(), ttl));
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<bool, DomainError> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            self.check_error()?;
            Ok(self.entries.lock().unwrap().remove(key).is_some())
        }

        async fn delete_matching(
            &self,
            pattern: &str,
            filter: &KeyFilter<'_>,
        ) -> Result<usize, DomainError> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            self.check_error()?;

            let glob = GlobPattern::new(pattern)?;
            let mut entries = self.entries.lock().unwrap();
            let before = entries.len();
            entries.retain(|k, _| !(glob.matches(k) && filter(k.as_str())));

            Ok(before - entries.len())
        }

        async fn clear(&self) -> Result<(), DomainError> {
            self.check_error()?;
            self.entries.lock().unwrap().clear();
            Ok(())
        }

        async fn size(&self) -> Result<usize, DomainError> {
            self.check_error()?;
            Ok(self.entries.lock().unwrap().len())
        }

        async fn ping(&self) -> Result<(), DomainError> {
            self.check_error()
        }

        async fn info(&self) -> Result<String, DomainError> {
            self.check_error()?;
            Ok(format!("mock_keys:{}", self.entries.lock().unwrap().len()))
        }

        fn backend_name(&self) -> &'static str {
            "mock"
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_cache_set_get() {
            let cache = MockCache::new();
            cache
                .set("key1", &"value1", Duration::from_secs(60))
                .await
                .unwrap();

            let result: Option<String> = cache.get("key1").await.unwrap();
            assert_eq!(result, Some("value1".to_string()));
            assert_eq!(cache.ttl_of("key1"), Some(Duration::from_secs(60)));
        }

        #[tokio::test]
        async fn test_mock_cache_with_error() {
            let cache = MockCache::new().with_error("Test error");

            let result: Result<Option<String>, _> = cache.get("key").await;
            assert!(result.is_err());

            cache.recover();
            let result: Option<String> = cache.get("key").await.unwrap();
            assert!(result.is_none());
        }

        #[tokio::test]
        async fn test_mock_cache_delete_pattern() {
            let cache = MockCache::new()
                .with_raw_entry("user:1:profile", "1")
                .with_raw_entry("user:2:profile", "2")
                .with_raw_entry("other:key", "3");

            let deleted = cache.delete_pattern("user:*:profile").await.unwrap();
            assert_eq!(deleted, 2);
            assert_eq!(cache.keys(), vec!["other:key".to_string()]);
        }

        #[tokio::test]
        async fn test_mock_cache_delete_matching_applies_filter() {
            let cache = MockCache::new()
                .with_raw_entry("user:1:profile", "1")
                .with_raw_entry("user:2:profile", "2");

            let deleted = cache
                .delete_matching("user:*", &|key: &str| key.starts_with("user:2:"))
                .await
                .unwrap();
            assert_eq!(deleted, 1);
            assert_eq!(cache.keys(), vec!["user:1:profile".to_string()]);
        }

        #[tokio::test]
        async fn test_get_rejects_malformed_json() {
            let cache = MockCache::new().with_raw_entry("broken", "{not json");

            let result: Result<Option<serde_json::Value>, _> = cache.get("broken").await;
            assert!(matches!(result, Err(DomainError::Serialization { .. })));
        }
    }
}
