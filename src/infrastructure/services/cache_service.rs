//! Shared response cache service
//!
//! One `CacheService` is built at startup and handed to every consumer
//! (middleware, admin endpoints, business logic invalidating after writes).
//! It owns the backend handle and a `connected` flag that every operation
//! consults first. The cache is strictly an optimization: no method returns
//! an error, failures are logged and degrade to a miss or a no-op.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::domain::cache::{is_pattern, Cache, CacheExt, KeySelector};
use crate::domain::DomainError;
use crate::infrastructure::cache::{CacheConfig, CacheFactory, CacheType};
use crate::infrastructure::observability::{record_cache_error, set_cache_connected};

/// Default TTL for cached responses (5 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default delay between background connection probes
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Where the backend handle comes from on (re)connect
enum BackendSource {
    Configured(CacheConfig),
    Provided(Arc<dyn Cache>),
}

impl BackendSource {
    async fn open(&self) -> Result<Arc<dyn Cache>, DomainError> {
        match self {
            Self::Configured(config) => CacheFactory::new().create(config).await,
            Self::Provided(cache) => Ok(Arc::clone(cache)),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Configured(config) => match config.cache_type {
                CacheType::Redis => {
                    format!("redis {}", config.redis.display_addr())
                }
                other => other.to_string(),
            },
            Self::Provided(cache) => cache.backend_name().to_string(),
        }
    }
}

/// State shared with the background health probe
struct Shared {
    source: BackendSource,
    backend: RwLock<Option<Arc<dyn Cache>>>,
    connected: AtomicBool,
}

impl Shared {
    fn mark(&self, connected: bool) {
        let previous = self.connected.swap(connected, Ordering::SeqCst);
        set_cache_connected(connected);

        match (previous, connected) {
            (false, true) => info!(backend = %self.source.describe(), "Cache connected"),
            (true, false) => {
                warn!(backend = %self.source.describe(), "Cache connection lost, bypassing cache")
            }
            _ => {}
        }
    }

    /// Opens the backend and proves it answers; returns the resulting connection state
    async fn establish(&self) -> bool {
        let cache = match self.source.open().await {
            Ok(cache) => cache,
            Err(e) => {
                warn!(backend = %self.source.describe(), error = %e, "Failed to open cache backend");
                self.mark(false);
                return false;
            }
        };

        let reachable = match cache.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!(backend = %self.source.describe(), error = %e, "Cache backend did not answer ping");
                false
            }
        };

        *self.backend.write().await = Some(cache);
        self.mark(reachable);
        reachable
    }

    async fn probe(&self) {
        let backend = self.backend.read().await.clone();

        match backend {
            None => {
                self.establish().await;
            }
            Some(cache) => match cache.ping().await {
                Ok(()) => self.mark(true),
                Err(e) => {
                    debug!(error = %e, "Cache health probe failed");
                    self.mark(false);
                }
            },
        }
    }
}

/// Connection status and backend diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entries: Option<usize>,
    /// Raw backend diagnostics (Redis `INFO` output)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// Fail-open handle over the configured cache backend
pub struct CacheService {
    shared: Arc<Shared>,
    default_ttl: Duration,
    health_check_interval: Duration,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("backend", &self.shared.source.describe())
            .field("connected", &self.is_connected())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl CacheService {
    /// Creates a service that builds its backend from configuration on `connect`
    pub fn new(config: CacheConfig) -> Self {
        Self::from_source(BackendSource::Configured(config))
    }

    /// Creates a service over an already constructed backend
    pub fn with_backend(cache: Arc<dyn Cache>) -> Self {
        Self::from_source(BackendSource::Provided(cache))
    }

    fn from_source(source: BackendSource) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                backend: RwLock::new(None),
                connected: AtomicBool::new(false),
            }),
            default_ttl: DEFAULT_TTL,
            health_check_interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            monitor: Mutex::new(None),
        }
    }

    /// Sets the TTL used when `set` is called without one
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Sets the delay between background connection probes
    pub fn with_health_check_interval(mut self, interval: Duration) -> Self {
        self.health_check_interval = interval;
        self
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Connects to the backend and starts the health probe
    ///
    /// Never fails: an unreachable store leaves the service in pass-through
    /// mode and the probe keeps trying to bring it back.
    pub async fn connect(&self) {
        if self.shared.establish().await {
            info!(backend = %self.shared.source.describe(), "Cache service ready");
        } else {
            warn!(
                backend = %self.shared.source.describe(),
                "Cache unavailable, requests will bypass the cache"
            );
        }

        self.start_health_monitor();
    }

    /// Stops the health probe and drops the backend handle
    pub async fn disconnect(&self) {
        self.stop_health_monitor();
        self.shared.backend.write().await.take();
        self.shared.mark(false);
        info!("Cache service disconnected");
    }

    /// Returns the cached value for `key`, or `None` on miss, disconnection or any error
    pub async fn get<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned + Send,
    {
        let cache = self.backend().await?;

        let result: Result<Option<T>, DomainError> = cache.get(key).await;

        match result {
            Ok(Some(value)) => {
                debug!(key = %key, "Cache hit");
                Some(value)
            }
            Ok(None) => {
                debug!(key = %key, "Cache miss");
                None
            }
            Err(e) => {
                self.handle_error("get", key, &e);
                None
            }
        }
    }

    /// Stores `value` under `key`; `None` TTL means the service default
    ///
    /// Returns whether the value reached the store.
    pub async fn set<T>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool
    where
        T: Serialize + Send + Sync + ?Sized,
    {
        let Some(cache) = self.backend().await else {
            warn!(key = %key, "Cache not connected, skipping set");
            return false;
        };

        let ttl = ttl.unwrap_or(self.default_ttl);

        match cache.set(key, value, ttl).await {
            Ok(()) => {
                debug!(key = %key, ttl_secs = ttl.as_secs(), "Cached value");
                true
            }
            Err(e) => {
                self.handle_error("set", key, &e);
                false
            }
        }
    }

    /// Returns the stored text for `key` untouched, or `None` on miss, disconnection or error
    pub async fn get_raw(&self, key: &str) -> Option<String> {
        let cache = self.backend().await?;

        match cache.get_raw(key).await {
            Ok(value) => {
                debug!(key = %key, hit = value.is_some(), "Cache lookup");
                value
            }
            Err(e) => {
                self.handle_error("get", key, &e);
                None
            }
        }
    }

    /// Stores `value` verbatim under `key`; `None` TTL means the service default
    pub async fn set_raw(&self, key: &str, value: &str, ttl: Option<Duration>) -> bool {
        let Some(cache) = self.backend().await else {
            warn!(key = %key, "Cache not connected, skipping set");
            return false;
        };

        let ttl = ttl.unwrap_or(self.default_ttl);

        match cache.set_raw(key, value, ttl).await {
            Ok(()) => {
                debug!(key = %key, ttl_secs = ttl.as_secs(), bytes = value.len(), "Cached value");
                true
            }
            Err(e) => {
                self.handle_error("set", key, &e);
                false
            }
        }
    }

    /// Deletes every response key picked by `selector`, returning how many went
    pub async fn del_selected(&self, selector: &KeySelector) -> usize {
        let pattern = selector.pattern();

        let Some(cache) = self.backend().await else {
            debug!(pattern = %pattern, "Cache not connected, skipping delete");
            return 0;
        };

        match cache
            .delete_matching(&pattern, &|key: &str| selector.matches(key))
            .await
        {
            Ok(deleted) => {
                debug!(pattern = %pattern, deleted, "Deleted cache entries");
                deleted
            }
            Err(e) => {
                self.handle_error("del", &pattern, &e);
                0
            }
        }
    }

    /// Deletes `key`, or every key matching it when it contains `*`
    ///
    /// Returns the number of deleted entries.
    pub async fn del(&self, key: &str) -> usize {
        let Some(cache) = self.backend().await else {
            debug!(key = %key, "Cache not connected, skipping delete");
            return 0;
        };

        let result = if is_pattern(key) {
            cache.delete_pattern(key).await
        } else {
            cache.delete(key).await.map(usize::from)
        };

        match result {
            Ok(deleted) => {
                debug!(key = %key, deleted, "Deleted cache entries");
                deleted
            }
            Err(e) => {
                self.handle_error("del", key, &e);
                0
            }
        }
    }

    /// Flushes the whole store
    pub async fn clear(&self) -> bool {
        let Some(cache) = self.backend().await else {
            warn!("Cache not connected, skipping clear");
            return false;
        };

        match cache.clear().await {
            Ok(()) => {
                info!(backend = cache.backend_name(), "Cache cleared");
                true
            }
            Err(e) => {
                self.handle_error("clear", "*", &e);
                false
            }
        }
    }

    /// Connection status plus backend diagnostics when connected
    pub async fn get_stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            connected: false,
            backend: None,
            entries: None,
            info: None,
            checked_at: Utc::now(),
        };

        let Some(cache) = self.backend().await else {
            return stats;
        };

        stats.connected = true;
        stats.backend = Some(cache.backend_name().to_string());

        match cache.size().await {
            Ok(size) => stats.entries = Some(size),
            Err(e) => self.handle_error("stats", "*", &e),
        }

        match cache.info().await {
            Ok(info) => stats.info = Some(info),
            Err(e) => self.handle_error("stats", "*", &e),
        }

        stats.connected = self.is_connected();
        stats
    }

    async fn backend(&self) -> Option<Arc<dyn Cache>> {
        if !self.is_connected() {
            return None;
        }

        self.shared.backend.read().await.clone()
    }

    fn handle_error(&self, operation: &'static str, key: &str, error: &DomainError) {
        record_cache_error(operation);

        if error.is_connection() {
            warn!(op = operation, key = %key, error = %error, "Cache store unreachable");
            self.shared.mark(false);
        } else {
            warn!(op = operation, key = %key, error = %error, "Cache operation failed");
        }
    }

    fn start_health_monitor(&self) {
        let Ok(mut monitor) = self.monitor.lock() else {
            return;
        };

        if monitor.is_some() {
            return;
        }

        let shared = Arc::clone(&self.shared);
        let interval = self.health_check_interval;

        *monitor = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                shared.probe().await;
            }
        }));
    }

    fn stop_health_monitor(&self) {
        if let Ok(mut monitor) = self.monitor.lock() {
            if let Some(handle) = monitor.take() {
                handle.abort();
            }
        }
    }
}

impl Drop for CacheService {
    fn drop(&mut self) {
        self.stop_health_monitor();
    }
}
