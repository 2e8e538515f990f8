//! Cache domain - key-value store abstraction and response cache keys

mod key;
mod pattern;
mod repository;

pub use key::{endpoint_pattern, user_pattern, KeySelector, ResponseCacheKey, ANONYMOUS_USER};
pub use pattern::{escape_glob, is_pattern, GlobPattern};
pub use repository::{Cache, CacheExt, KeyFilter};

#[cfg(test)]
pub use repository::mock::MockCache;
