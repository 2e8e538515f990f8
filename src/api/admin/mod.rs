//! Admin API endpoints

pub mod cache;

use axum::{
    routing::{delete, get, post},
    Router,
};

use super::state::AppState;

/// Create admin API router
pub fn create_admin_router() -> Router<AppState> {
    Router::new()
        .route("/cache", delete(cache::clear_cache))
        .route("/cache/stats", get(cache::get_stats))
        .route("/cache/invalidate", post(cache::invalidate))
}
