//! Recharge Endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::Actor;
use crate::db::{LedgerStore, RechargeHistory, RechargeRequest, Voucher};
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AmountRequest {
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct VoucherRequest {
    /// 외부 저장소의 증빙 참조 (파일 경로, object key 등)
    pub reference: String,
}

/// POST /api/users/:id/recharges
pub async fn create<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(user_id): Path<i64>,
    Json(req): Json<AmountRequest>,
) -> Result<(StatusCode, Json<RechargeRequest>), ApiError> {
    let recharge = state
        .ledger
        .recharges
        .create_recharge_request(&actor, user_id, req.amount)
        .await?;
    Ok((StatusCode::CREATED, Json(recharge)))
}

/// GET /api/users/:id/recharges/history
pub async fn history<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<RechargeHistory>>, ApiError> {
    Ok(Json(
        state.ledger.recharges.recharge_history(&actor, user_id).await?,
    ))
}

/// PUT /api/recharges/:id/voucher
pub async fn attach_voucher<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(recharge_id): Path<i64>,
    Json(req): Json<VoucherRequest>,
) -> Result<Json<Voucher>, ApiError> {
    Ok(Json(
        state
            .ledger
            .recharges
            .attach_voucher(&actor, recharge_id, &req.reference)
            .await?,
    ))
}

/// PATCH /api/recharges/:id
pub async fn update_amount<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(recharge_id): Path<i64>,
    Json(req): Json<AmountRequest>,
) -> Result<Json<RechargeRequest>, ApiError> {
    Ok(Json(
        state
            .ledger
            .recharges
            .update_recharge_amount(&actor, recharge_id, req.amount)
            .await?,
    ))
}

/// POST /api/recharges/:id/approve
pub async fn approve<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(recharge_id): Path<i64>,
) -> Result<Json<RechargeRequest>, ApiError> {
    Ok(Json(
        state.ledger.recharges.approve_recharge(&actor, recharge_id).await?,
    ))
}

/// POST /api/recharges/:id/reject
pub async fn reject<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(recharge_id): Path<i64>,
) -> Result<Json<RechargeRequest>, ApiError> {
    Ok(Json(
        state.ledger.recharges.reject_recharge(&actor, recharge_id).await?,
    ))
}
