use std::time::Duration;

use serde::Deserialize;

use crate::domain::DomainError;
use crate::infrastructure::cache::{CacheConfig, CacheType, RedisCacheConfig};
use crate::infrastructure::observability::MetricsConfig;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

/// Admin API access
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Token admin callers must present; the admin API is closed without one
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Response cache settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub backend: CacheType,
    /// Full connection URL; carries its own credentials and database, so it
    /// cannot be combined with `password` or `db`
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: Option<i64>,
    pub key_prefix: Option<String>,
    pub default_ttl_secs: u64,
    pub connection_timeout_secs: u64,
    pub health_check_interval_secs: u64,
    /// Entry limit for the in-memory backend
    pub max_capacity: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            backend: CacheType::Redis,
            url: None,
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            db: None,
            key_prefix: None,
            default_ttl_secs: 300,
            connection_timeout_secs: 5,
            health_check_interval_secs: 10,
            max_capacity: 10_000,
        }
    }
}

impl CacheSettings {
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs.max(1))
    }

    /// Backend configuration for the cache factory
    pub fn to_cache_config(&self) -> CacheConfig {
        let mut redis = match &self.url {
            Some(url) => RedisCacheConfig::from_url(url.clone()),
            None => {
                let mut redis = RedisCacheConfig::new(self.host.clone(), self.port);
                if let Some(password) = &self.password {
                    redis = redis.with_password(password.clone());
                }
                if let Some(db) = self.db {
                    redis = redis.with_db(db);
                }
                redis
            }
        };

        if let Some(prefix) = &self.key_prefix {
            redis = redis.with_key_prefix(prefix.clone());
        }

        let config = CacheConfig {
            cache_type: self.backend,
            redis,
            max_capacity: self.max_capacity,
        };

        config.with_connection_timeout(Duration::from_secs(self.connection_timeout_secs))
    }

    /// Rejects settings that would otherwise be silently ignored
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.url.is_some() && (self.password.is_some() || self.db.is_some()) {
            return Err(DomainError::configuration(
                "Redis URL cannot be combined with a separate password or db; \
                 put them in the URL (redis://:password@host:port/db) or drop the URL",
            ));
        }

        Ok(())
    }

    /// Applies the `REDIS_*` and `CACHE_BACKEND` variables on top of file settings
    fn apply_env<F>(&mut self, var: F) -> Result<(), DomainError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = var("CACHE_BACKEND") {
            self.backend = backend.parse()?;
        }
        if let Some(url) = var("REDIS_URL") {
            self.url = Some(url);
        }
        if let Some(host) = var("REDIS_HOST") {
            self.host = host;
        }
        if let Some(port) = var("REDIS_PORT") {
            self.port = port.parse().map_err(|_| {
                DomainError::configuration(format!("REDIS_PORT is not a valid port: {}", port))
            })?;
        }
        if let Some(password) = var("REDIS_PASSWORD") {
            self.password = Some(password);
        }
        if let Some(db) = var("REDIS_DB") {
            self.db = Some(db.parse().map_err(|_| {
                DomainError::configuration(format!("REDIS_DB is not a number: {}", db))
            })?);
        }

        Ok(())
    }
}

impl AppConfig {
    /// Loads `config/default`, `config/local`, `APP__*` variables, then the legacy
    /// `REDIS_*` and `ADMIN_TOKEN` variables
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        let mut app: AppConfig = config.try_deserialize()?;
        app.cache
            .apply_env(var)
            .and_then(|()| app.cache.validate())
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;

        if let Some(token) = var("ADMIN_TOKEN") {
            app.admin.token = Some(token);
        }

        Ok(app)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.cache.backend, CacheType::Redis);
        assert_eq!(config.cache.default_ttl(), Duration::from_secs(300));
        assert_eq!(config.cache.health_check_interval(), Duration::from_secs(10));
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_deserialize_partial_cache_section() {
        let config: AppConfig = serde_json::from_str(
            r#"{"cache": {"backend": "in_memory", "default_ttl_secs": 60}}"#,
        )
        .unwrap();

        assert_eq!(config.cache.backend, CacheType::InMemory);
        assert_eq!(config.cache.default_ttl_secs, 60);
        assert_eq!(config.cache.port, 6379);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_legacy_env_overrides() {
        let mut settings = CacheSettings::default();
        settings
            .apply_env(env(&[
                ("REDIS_HOST", "redis.indulink.internal"),
                ("REDIS_PORT", "6380"),
                ("REDIS_PASSWORD", "hunter2"),
                ("REDIS_DB", "3"),
            ]))
            .unwrap();

        let config = settings.to_cache_config();
        assert_eq!(config.redis.host, "redis.indulink.internal");
        assert_eq!(config.redis.port, 6380);
        assert_eq!(config.redis.password.as_deref(), Some("hunter2"));
        assert_eq!(config.redis.db, 3);
        assert_eq!(config.redis.connection_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_redis_url_and_backend_override() {
        let mut settings = CacheSettings::default();
        settings
            .apply_env(env(&[
                ("REDIS_URL", "redis://cache:6379/1"),
                ("CACHE_BACKEND", "memory"),
            ]))
            .unwrap();

        let config = settings.to_cache_config();
        assert_eq!(config.cache_type, CacheType::InMemory);
        assert_eq!(config.redis.url.as_deref(), Some("redis://cache:6379/1"));
    }

    #[test]
    fn test_url_with_password_or_db_is_rejected() {
        let mut settings = CacheSettings::default();
        settings
            .apply_env(env(&[("REDIS_URL", "redis://cache:6379/1"), ("REDIS_DB", "4")]))
            .unwrap();
        assert!(matches!(
            settings.validate(),
            Err(DomainError::Configuration { .. })
        ));

        let settings = CacheSettings {
            url: Some("redis://cache:6379".to_string()),
            password: Some("hunter2".to_string()),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_host_settings_with_password_and_db_are_valid() {
        let settings = CacheSettings {
            password: Some("hunter2".to_string()),
            db: Some(2),
            ..Default::default()
        };
        assert!(settings.validate().is_ok());

        let url_only = CacheSettings {
            url: Some("redis://:hunter2@cache:6379/2".to_string()),
            ..Default::default()
        };
        assert!(url_only.validate().is_ok());
        assert_eq!(url_only.to_cache_config().redis.db, 0);
    }

    #[test]
    fn test_admin_token_deserializes() {
        let config: AppConfig =
            serde_json::from_str(r#"{"admin": {"token": "s3cret"}}"#).unwrap();
        assert_eq!(config.admin.token.as_deref(), Some("s3cret"));
        assert!(AppConfig::default().admin.token.is_none());
    }

    #[test]
    fn test_invalid_env_values() {
        let mut settings = CacheSettings::default();
        assert!(settings.apply_env(env(&[("REDIS_PORT", "abc")])).is_err());
        assert!(settings.apply_env(env(&[("REDIS_DB", "x")])).is_err());
        assert!(settings.apply_env(env(&[("CACHE_BACKEND", "memcached")])).is_err());
    }

    #[test]
    fn test_health_check_interval_floor() {
        let settings = CacheSettings {
            health_check_interval_secs: 0,
            ..Default::default()
        };

        assert_eq!(settings.health_check_interval(), Duration::from_secs(1));
    }
}
