//! Account Endpoints
//!
//! 가입, 운영 계정 생성, 2단계 삭제

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use super::Actor;
use crate::db::{Account, LedgerStore};
use crate::error::ApiError;
use crate::services::Registration;
use crate::types::Role;
use crate::AppState;

// ============ Request Types ============

#[derive(Debug, Deserialize)]
pub struct CreateStaffRequest {
    pub username: String,
    pub role: Role,
}

// ============ Handlers ============

/// POST /api/accounts/register
///
/// 세션 계층 이전 단계이므로 actor 없음
pub async fn register<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Json(req): Json<Registration>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    let account = state.ledger.accounts.register_user(req).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// POST /api/accounts/staff
pub async fn create_staff<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Json(req): Json<CreateStaffRequest>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    let account = state
        .ledger
        .accounts
        .create_staff(&actor, &req.username, req.role)
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// GET /api/accounts/:id
pub async fn get_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(account_id): Path<i64>,
) -> Result<Json<Account>, ApiError> {
    Ok(Json(state.ledger.accounts.account(&actor, account_id).await?))
}

/// POST /api/accounts/:id/anonymize
pub async fn anonymize_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(account_id): Path<i64>,
) -> Result<Json<Account>, ApiError> {
    Ok(Json(
        state.ledger.accounts.anonymize_account(&actor, account_id).await?,
    ))
}

/// DELETE /api/accounts/:id
pub async fn remove_account<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(account_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.ledger.accounts.remove_account(&actor, account_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
