use axum::{
    extract::{Path, State},
    Json,
};

use crate::api::{parse_id, state::AppState};
use crate::db::{Product, ProductRepository};
use crate::error::AppError;

/// GET /api/products
pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<Vec<Product>>, AppError> {
    Ok(Json(ProductRepository::list(&state.db).await?))
}

/// GET /api/products/{id}
pub async fn get_product(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Json<Product>, AppError> {
    let id = parse_id("product id", Some(&raw_id))?;

    let product = ProductRepository::get_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Product {} not found", id)))?;

    Ok(Json(product))
}
