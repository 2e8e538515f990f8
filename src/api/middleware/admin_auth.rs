//! Admin authentication
//!
//! Admin routes take the configured token as `Authorization: Bearer <token>`
//! or `X-Admin-Token: <token>`. With no token configured the admin API
//! refuses every request.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use tracing::{debug, warn};

use crate::api::state::AppState;
use crate::api::types::ApiError;

/// Alternative header carrying the admin token
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Extractor that requires the admin token
#[derive(Debug, Clone, Copy)]
pub struct RequireAdmin;

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.admin_token.as_deref() else {
            return Err(ApiError::forbidden(
                "Admin API is disabled. Set ADMIN_TOKEN to enable it",
            ));
        };

        match presented_token(&parts.headers) {
            Some(token) if tokens_match(token, expected) => {
                debug!(path = %parts.uri.path(), "Admin access granted");
                Ok(RequireAdmin)
            }
            Some(_) => {
                warn!(path = %parts.uri.path(), "Rejected admin request with invalid token");
                Err(ApiError::unauthorized("Invalid admin token"))
            }
            None => Err(ApiError::unauthorized(
                "Admin access required. Provide Authorization: Bearer <token> or X-Admin-Token",
            )),
        }
    }
}

fn presented_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    bearer
        .or_else(|| {
            headers
                .get(ADMIN_TOKEN_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
        })
        .filter(|token| !token.is_empty())
}

/// Compares without returning early on the first differing byte
fn tokens_match(presented: &str, expected: &str) -> bool {
    let (a, b) = (presented.as_bytes(), expected.as_bytes());

    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
