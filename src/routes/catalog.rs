//! Product Catalog Endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::Actor;
use crate::db::{LedgerStore, Product};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AddProductRequest {
    pub name: String,
    pub price: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct ProductAvailability {
    pub is_active: bool,
}

/// POST /api/products
pub async fn add_product<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Json(req): Json<AddProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state
        .ledger
        .catalog
        .add_product(&actor, &req.name, req.price)
        .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// GET /api/products/:id
pub async fn get_product<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Path(product_id): Path<i64>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.ledger.catalog.product(product_id).await?))
}

/// PATCH /api/products/:id
pub async fn set_availability<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(product_id): Path<i64>,
    Json(req): Json<ProductAvailability>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(
        state
            .ledger
            .catalog
            .set_product_active(&actor, product_id, req.is_active)
            .await?,
    ))
}
