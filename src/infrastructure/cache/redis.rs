//! Redis cache implementation

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{
    AsyncCommands, Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo, RedisError,
};

use crate::domain::cache::{Cache, KeyFilter};
use crate::domain::DomainError;

/// Keys fetched per `SCAN` round trip when resolving a pattern
const SCAN_BATCH: usize = 100;

/// Configuration for Redis cache
#[derive(Clone)]
pub struct RedisCacheConfig {
    /// Full connection URL; takes precedence over host/port/password
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: i64,
    /// Key prefix for namespacing
    pub key_prefix: Option<String>,
    /// Connection timeout
    pub connection_timeout: Duration,
    /// Per-command response timeout
    pub response_timeout: Duration,
}

impl fmt::Debug for RedisCacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCacheConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("db", &self.db)
            .field("key_prefix", &self.key_prefix)
            .field("connection_timeout", &self.connection_timeout)
            .field("response_timeout", &self.response_timeout)
            .finish()
    }
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            db: 0,
            key_prefix: None,
            connection_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(2),
        }
    }
}

impl RedisCacheConfig {
    /// Creates a new configuration for the given host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Creates a new configuration from a connection URL
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Sets the password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the logical database
    pub fn with_db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }

    /// Sets the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Sets the connection timeout
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Sets the per-command response timeout
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    fn client(&self) -> Result<Client, DomainError> {
        let client = match &self.url {
            Some(url) => Client::open(url.as_str()),
            None => Client::open(ConnectionInfo {
                addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
                redis: RedisConnectionInfo {
                    db: self.db,
                    password: self.password.clone(),
                    ..Default::default()
                },
            }),
        };

        client.map_err(|e| {
            DomainError::configuration(format!("Failed to create Redis client: {}", e))
        })
    }

    /// Address for log lines, never including credentials
    pub fn display_addr(&self) -> String {
        match &self.url {
            Some(_) => "<url>".to_string(),
            None => format!("{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

/// Redis cache implementation
///
/// `ConnectionManager` multiplexes one connection across tasks and
/// reconnects on its own after the server drops it.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    config: RedisCacheConfig,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisCache {
    /// Creates a new Redis cache connection
    pub async fn new(config: RedisCacheConfig) -> Result<Self, DomainError> {
        let client = config.client()?;

        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(config.connection_timeout)
            .set_response_timeout(config.response_timeout)
            .set_number_of_retries(2);

        let connection = ConnectionManager::new_with_config(client, manager_config)
            .await
            .map_err(|e| store_error("Failed to connect to Redis", e))?;

        Ok(Self { connection, config })
    }

    fn prefix_key(&self, key: &str) -> String {
        match &self.config.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }

    /// One `SCAN MATCH` round trip, returning the next cursor and a batch of keys
    async fn scan_batch(
        &self,
        conn: &mut ConnectionManager,
        cursor: u64,
        pattern: &str,
    ) -> Result<(u64, Vec<String>), DomainError> {
        redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(SCAN_BATCH)
            .query_async(conn)
            .await
            .map_err(|e| {
                store_error(format!("Failed to scan keys with pattern '{}'", pattern), e)
            })
    }

    async fn count_keys(&self, pattern: &str) -> Result<usize, DomainError> {
        let mut conn = self.connection.clone();
        let mut cursor = 0u64;
        let mut count = 0usize;

        loop {
            let (next_cursor, keys) = self.scan_batch(&mut conn, cursor, pattern).await?;
            count += keys.len();
            cursor = next_cursor;

            if cursor == 0 {
                break;
            }
        }

        Ok(count)
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let result: Option<String> = conn
            .get(&prefixed_key)
            .await
            .map_err(|e| store_error(format!("Failed to get key '{}'", key), e))?;

        Ok(result)
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let ttl_secs = ttl.as_secs().max(1);

        let _: () = conn
            .set_ex(&prefixed_key, value, ttl_secs)
            .await
            .map_err(|e| store_error(format!("Failed to set key '{}'", key), e))?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let deleted: i64 = conn
            .del(&prefixed_key)
            .await
            .map_err(|e| store_error(format!("Failed to delete key '{}'", key), e))?;

        Ok(deleted > 0)
    }

    async fn delete_matching(
        &self,
        pattern: &str,
        filter: &KeyFilter<'_>,
    ) -> Result<usize, DomainError> {
        let prefixed_pattern = self.prefix_key(pattern);
        let mut conn = self.connection.clone();
        let mut cursor = 0u64;
        let mut total_deleted = 0usize;

        // Delete each batch before fetching the next
        loop {
            let (next_cursor, keys) = self
                .scan_batch(&mut conn, cursor, &prefixed_pattern)
                .await?;

            let prefix = self.config.key_prefix.as_deref();
            let doomed: Vec<String> = keys
                .into_iter()
                .filter(|key| filter(unprefixed(prefix, key)))
                .collect();

            if !doomed.is_empty() {
                let deleted: i64 = conn
                    .del(&doomed)
                    .await
                    .map_err(|e| store_error("Failed to delete keys", e))?;
                total_deleted += deleted.max(0) as usize;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(total_deleted)
    }

    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let exists: bool = conn.exists(&prefixed_key).await.map_err(|e| {
            store_error(format!("Failed to check existence of key '{}'", key), e)
        })?;

        Ok(exists)
    }

    async fn clear(&self) -> Result<(), DomainError> {
        // With a prefix only our namespace goes; without one the whole database is flushed
        match &self.config.key_prefix {
            Some(_) => {
                self.delete_pattern("*").await?;
            }
            None => {
                let mut conn = self.connection.clone();
                redis::cmd("FLUSHDB")
                    .query_async::<()>(&mut conn)
                    .await
                    .map_err(|e| store_error("Failed to flush database", e))?;
            }
        }

        Ok(())
    }

    async fn size(&self) -> Result<usize, DomainError> {
        match &self.config.key_prefix {
            Some(_) => self.count_keys(&self.prefix_key("*")).await,
            None => {
                let mut conn = self.connection.clone();
                let size: usize = redis::cmd("DBSIZE")
                    .query_async(&mut conn)
                    .await
                    .map_err(|e| store_error("Failed to get database size", e))?;
                Ok(size)
            }
        }
    }

    async fn ping(&self) -> Result<(), DomainError> {
        let mut conn = self.connection.clone();

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("Failed to ping Redis", e))?;

        Ok(())
    }

    async fn info(&self) -> Result<String, DomainError> {
        let mut conn = self.connection.clone();

        let info: String = redis::cmd("INFO")
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("Failed to read server info", e))?;

        Ok(info)
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

/// Key as callers wrote it, without the namespace prefix
fn unprefixed<'a>(prefix: Option<&str>, key: &'a str) -> &'a str {
    prefix
        .and_then(|prefix| key.strip_prefix(prefix))
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(key)
}

/// Maps a Redis error, keeping connection failures distinguishable from command failures
fn store_error(context: impl fmt::Display, err: RedisError) -> DomainError {
    let message = format!("{}: {}", context, err);

    if err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_timeout()
        || err.is_io_error()
    {
        DomainError::connection(message)
    } else {
        DomainError::cache(message)
    }
}
