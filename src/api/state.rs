//! Application state for shared services

use std::sync::Arc;

use super::catalog::ProductCatalog;
use super::middleware::CachePolicy;
use crate::infrastructure::services::CacheService;

/// Services shared by every handler
#[derive(Debug, Clone)]
pub struct AppState {
    pub cache: Arc<CacheService>,
    pub catalog: Arc<ProductCatalog>,
    /// Token required by the admin API; `None` closes it
    pub admin_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(cache: Arc<CacheService>, catalog: Arc<ProductCatalog>) -> Self {
        Self {
            cache,
            catalog,
            admin_token: None,
        }
    }

    /// Opens the admin API to callers presenting `token`; blank tokens keep it closed
    pub fn with_admin_token(mut self, token: Option<&str>) -> Self {
        self.admin_token = token
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(Arc::from);
        self
    }

    /// Caching policy for routes using the service default TTL
    pub fn cache_policy(&self) -> CachePolicy {
        CachePolicy::new(Arc::clone(&self.cache))
    }
}
