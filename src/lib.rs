//! Indulink response cache
//!
//! Read-through caching of JSON API responses keyed by method, user and URL,
//! with explicit invalidation by key, user or endpoint. A Redis (or in-memory)
//! store sits behind a fail-open `CacheService`: when the store is down,
//! requests are served uncached.

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use api::catalog::ProductCatalog;
use api::state::AppState;
use infrastructure::services::CacheService;

/// Builds the shared cache service from configuration and connects it
///
/// Never fails on an unreachable store; the service starts degraded and the
/// health probe reconnects it.
pub async fn create_cache_service(config: &AppConfig) -> Arc<CacheService> {
    let service = CacheService::new(config.cache.to_cache_config())
        .with_default_ttl(config.cache.default_ttl())
        .with_health_check_interval(config.cache.health_check_interval());

    service.connect().await;
    Arc::new(service)
}

/// Creates application state with all services wired
pub async fn create_app_state(config: &AppConfig) -> AppState {
    let cache = create_cache_service(config).await;
    let catalog = Arc::new(ProductCatalog::seeded().await);

    AppState::new(cache, catalog).with_admin_token(config.admin.token.as_deref())
}
