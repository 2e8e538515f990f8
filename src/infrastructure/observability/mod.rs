//! Observability infrastructure - Metrics

mod config;
mod metrics;

pub use config::MetricsConfig;
pub use metrics::{
    create_metrics_router, init_metrics, record_cache_bypass, record_cache_error,
    record_cache_invalidation, record_cache_lookup, record_cache_store, record_http_request,
    set_cache_connected, PrometheusMetrics,
};
