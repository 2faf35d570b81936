//! Stop Point Endpoints (관리자)

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::Actor;
use crate::db::{LedgerStore, StopPoint};
use crate::error::ApiError;
use crate::services::{StopPointBatch, StopPointChange};
use crate::AppState;

// ============ Request Types ============

#[derive(Debug, Deserialize)]
pub struct StopPointEntry {
    pub point: i32,
    pub required_balance: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct AddStopPointsRequest {
    pub entries: Vec<StopPointEntry>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStopPointRequest {
    pub point: Option<i32>,
    pub required_balance: Option<Decimal>,
    pub order: Option<i32>,
}

// ============ Handlers ============

/// GET /api/users/:id/stop-points
pub async fn list<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<StopPoint>>, ApiError> {
    Ok(Json(state.ledger.gate.stop_points(&actor, user_id).await?))
}

/// POST /api/users/:id/stop-points
pub async fn add<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(user_id): Path<i64>,
    Json(req): Json<AddStopPointsRequest>,
) -> Result<Json<StopPointBatch>, ApiError> {
    if req.entries.is_empty() {
        return Err(ApiError::BadRequest("At least one stop point is required".to_string()));
    }
    let entries: Vec<(i32, Decimal)> = req
        .entries
        .iter()
        .map(|e| (e.point, e.required_balance))
        .collect();

    Ok(Json(
        state.ledger.gate.add_stop_points(&actor, user_id, &entries).await?,
    ))
}

/// PATCH /api/users/:id/stop-points/:stop_point_id
pub async fn update<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path((user_id, stop_point_id)): Path<(i64, i64)>,
    Json(req): Json<UpdateStopPointRequest>,
) -> Result<Json<StopPoint>, ApiError> {
    let change = StopPointChange {
        point: req.point,
        required_balance: req.required_balance,
        order: req.order,
    };
    Ok(Json(
        state
            .ledger
            .gate
            .update_stop_point(&actor, user_id, stop_point_id, change)
            .await?,
    ))
}

/// POST /api/users/:id/stop-points/:stop_point_id/approve
pub async fn approve<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path((user_id, stop_point_id)): Path<(i64, i64)>,
) -> Result<Json<StopPoint>, ApiError> {
    Ok(Json(
        state
            .ledger
            .gate
            .approve_stop_point(&actor, user_id, stop_point_id)
            .await?,
    ))
}

/// POST /api/users/:id/stop-points/:stop_point_id/reject
pub async fn reject<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path((user_id, stop_point_id)): Path<(i64, i64)>,
) -> Result<Json<StopPoint>, ApiError> {
    Ok(Json(
        state
            .ledger
            .gate
            .reject_stop_point(&actor, user_id, stop_point_id)
            .await?,
    ))
}

/// POST /api/users/:id/stop-points/reset
pub async fn reset<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(user_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state
        .ledger
        .gate
        .reset_stop_points_for_user(&actor, user_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
