//! Cache administration endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{
    invalidate_cache, invalidate_endpoint_cache, invalidate_user_cache, RequireAdmin,
};
use crate::api::state::AppState;
use crate::api::types::ApiError;
use crate::domain::cache::{endpoint_pattern, user_pattern};
use crate::infrastructure::services::CacheStats;

/// Invalidation target; exactly one field must be set
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InvalidateRequest {
    pub pattern: Option<String>,
    pub user_id: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub success: bool,
    pub pattern: String,
    pub deleted: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub success: bool,
}

enum Target {
    Pattern(String),
    User(String),
    Endpoint(String),
}

impl InvalidateRequest {
    fn target(self) -> Result<Target, ApiError> {
        let target = match (self.pattern, self.user_id, self.endpoint) {
            (Some(pattern), None, None) => Target::Pattern(pattern),
            (None, Some(user_id), None) => Target::User(user_id),
            (None, None, Some(endpoint)) => Target::Endpoint(endpoint),
            _ => {
                return Err(ApiError::bad_request(
                    "Provide exactly one of 'pattern', 'user_id' or 'endpoint'",
                ))
            }
        };

        let value = match &target {
            Target::Pattern(v) | Target::User(v) | Target::Endpoint(v) => v,
        };
        if value.trim().is_empty() {
            return Err(ApiError::bad_request("Invalidation target must not be empty"));
        }

        Ok(target)
    }
}

/// GET /admin/cache/stats
pub async fn get_stats(_admin: RequireAdmin, State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.get_stats().await)
}

/// DELETE /admin/cache
pub async fn clear_cache(
    _admin: RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<ClearResponse>, ApiError> {
    if state.cache.clear().await {
        Ok(Json(ClearResponse { success: true }))
    } else {
        Err(ApiError::unavailable("Cache is not available"))
    }
}

/// POST /admin/cache/invalidate
pub async fn invalidate(
    _admin: RequireAdmin,
    State(state): State<AppState>,
    payload: Result<Json<InvalidateRequest>, JsonRejection>,
) -> Result<Json<InvalidateResponse>, ApiError> {
    let Json(request) = payload?;

    let (pattern, deleted) = match request.target()? {
        Target::Pattern(pattern) => {
            let deleted = invalidate_cache(&state.cache, &pattern).await;
            (pattern, deleted)
        }
        Target::User(user_id) => {
            let deleted = invalidate_user_cache(&state.cache, &user_id).await;
            (user_pattern(&user_id), deleted)
        }
        Target::Endpoint(endpoint) => {
            let deleted = invalidate_endpoint_cache(&state.cache, &endpoint).await;
            (endpoint_pattern(&endpoint), deleted)
        }
    };

    Ok(Json(InvalidateResponse {
        success: true,
        pattern,
        deleted,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: &str) -> InvalidateRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_target_requires_exactly_one_field() {
        assert!(request(r#"{}"#).target().is_err());
        assert!(request(r#"{"pattern": "*", "user_id": "u1"}"#).target().is_err());
        assert!(matches!(
            request(r#"{"user_id": "u1"}"#).target(),
            Ok(Target::User(id)) if id == "u1"
        ));
        assert!(matches!(
            request(r#"{"endpoint": "/api/products"}"#).target(),
            Ok(Target::Endpoint(_))
        ));
    }

    #[test]
    fn test_target_rejects_blank_values() {
        assert!(request(r#"{"pattern": "  "}"#).target().is_err());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: Result<InvalidateRequest, _> = serde_json::from_str(r#"{"key": "x"}"#);
        assert!(result.is_err());
    }
}
