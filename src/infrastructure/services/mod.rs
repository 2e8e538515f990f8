//! Infrastructure services

mod cache_service;

pub use cache_service::{CacheService, CacheStats, DEFAULT_HEALTH_CHECK_INTERVAL, DEFAULT_TTL};
