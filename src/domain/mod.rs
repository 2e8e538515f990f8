//! Domain layer - Cache keys, patterns and the store abstraction

pub mod cache;
pub mod error;

pub use cache::{Cache, CacheExt, GlobPattern, ResponseCacheKey};
pub use error::DomainError;
