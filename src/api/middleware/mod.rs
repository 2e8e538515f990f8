//! API middleware components

pub mod admin_auth;
pub mod cache;
pub mod logging;
pub mod metrics;

pub use admin_auth::{RequireAdmin, ADMIN_TOKEN_HEADER};
pub use cache::{
    cache_response, invalidate_cache, invalidate_endpoint_cache, invalidate_user_cache,
    AuthenticatedUser, CachePolicy,
};
pub use logging::logging_middleware;
pub use metrics::metrics_middleware;
