//! Withdrawal Endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::Actor;
use crate::db::{LedgerStore, PayoutAddress, Withdrawal};
use crate::error::ApiError;
use crate::types::Network;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct BindAddressRequest {
    pub address: String,
    pub network: Network,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    /// 없으면 최소 잔액을 제외한 전액
    pub amount: Option<Decimal>,
    pub network: Option<Network>,
}

/// PUT /api/users/:id/payout-address
pub async fn bind_address<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(user_id): Path<i64>,
    Json(req): Json<BindAddressRequest>,
) -> Result<(StatusCode, Json<PayoutAddress>), ApiError> {
    let bound = state
        .ledger
        .withdrawals
        .bind_payout_address(&actor, user_id, &req.address, req.network)
        .await?;
    Ok((StatusCode::CREATED, Json(bound)))
}

/// GET /api/users/:id/payout-address
pub async fn get_address<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(user_id): Path<i64>,
) -> Result<Json<PayoutAddress>, ApiError> {
    state
        .ledger
        .withdrawals
        .payout_address(&actor, user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Payout address".to_string()))
}

/// POST /api/users/:id/withdrawals
pub async fn request<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(user_id): Path<i64>,
    Json(req): Json<WithdrawRequest>,
) -> Result<(StatusCode, Json<Withdrawal>), ApiError> {
    let withdrawal = state
        .ledger
        .withdrawals
        .request_withdrawal(&actor, user_id, req.amount, req.network)
        .await?;
    Ok((StatusCode::CREATED, Json(withdrawal)))
}

/// GET /api/users/:id/withdrawals
pub async fn list<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<Withdrawal>>, ApiError> {
    Ok(Json(state.ledger.withdrawals.withdrawals(&actor, user_id).await?))
}

/// POST /api/withdrawals/:id/approve
pub async fn approve<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(withdrawal_id): Path<i64>,
) -> Result<Json<Withdrawal>, ApiError> {
    Ok(Json(
        state
            .ledger
            .withdrawals
            .approve_withdrawal(&actor, withdrawal_id)
            .await?,
    ))
}

/// POST /api/withdrawals/:id/reject
pub async fn reject<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(withdrawal_id): Path<i64>,
) -> Result<Json<Withdrawal>, ApiError> {
    Ok(Json(
        state
            .ledger
            .withdrawals
            .reject_withdrawal(&actor, withdrawal_id)
            .await?,
    ))
}
