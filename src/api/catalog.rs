//! Product catalog routes
//!
//! A small in-process catalog mounted behind the response cache so the
//! read-through and invalidation paths can be exercised end to end.

use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use super::middleware::{cache_response, invalidate_endpoint_cache};
use super::state::AppState;
use super::types::ApiError;

/// Route prefix the catalog is mounted under
pub const PRODUCTS_ENDPOINT: &str = "/api/products";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub category: String,
    pub price: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
    pub price: f64,
}

fn default_category() -> String {
    "general".to_string()
}

/// `{"success": true, "data": ...}` envelope
#[derive(Debug, Clone, Serialize)]
pub struct DataResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// In-process product store
#[derive(Debug)]
pub struct ProductCatalog {
    products: RwLock<Vec<Product>>,
    next_id: AtomicU64,
}

impl Default for ProductCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl ProductCatalog {
    pub fn new() -> Self {
        Self {
            products: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Catalog preloaded with a few building materials
    pub async fn seeded() -> Self {
        let catalog = Self::new();
        for (name, category, price) in [
            ("Portland Cement 50kg", "cement", 9.5),
            ("Steel Rebar 12mm", "steel", 14.25),
            ("Red Clay Brick", "masonry", 0.35),
        ] {
            catalog
                .create(CreateProductRequest {
                    name: name.to_string(),
                    category: category.to_string(),
                    price,
                })
                .await;
        }
        catalog
    }

    pub async fn list(&self) -> Vec<Product> {
        self.products.read().await.clone()
    }

    pub async fn get(&self, id: u64) -> Option<Product> {
        self.products.read().await.iter().find(|p| p.id == id).cloned()
    }

    pub async fn create(&self, request: CreateProductRequest) -> Product {
        let product = Product {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name: request.name,
            category: request.category,
            price: request.price,
            created_at: Utc::now(),
        };

        self.products.write().await.push(product.clone());
        product
    }
}

/// Catalog router; GET routes go through the response cache
pub fn create_catalog_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/{id}", get(get_product))
        .route_layer(from_fn_with_state(state.cache_policy(), cache_response))
}

async fn list_products(State(state): State<AppState>) -> Json<DataResponse<Vec<Product>>> {
    Json(DataResponse::new(state.catalog.list().await))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<DataResponse<Product>>, ApiError> {
    state
        .catalog
        .get(id)
        .await
        .map(|product| Json(DataResponse::new(product)))
        .ok_or_else(|| ApiError::not_found(format!("Product {} not found", id)))
}

async fn create_product(
    State(state): State<AppState>,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DataResponse<Product>>), ApiError> {
    let Json(request) = payload?;

    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request("Product name must not be empty"));
    }
    if !request.price.is_finite() || request.price < 0.0 {
        return Err(ApiError::bad_request("Product price must be a non-negative number"));
    }

    let product = state.catalog.create(request).await;
    info!(product_id = product.id, "Product created");

    invalidate_endpoint_cache(&state.cache, PRODUCTS_ENDPOINT).await;

    Ok((StatusCode::CREATED, Json(DataResponse::new(product))))
}
