//! Wallet & Commission Endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::Actor;
use crate::db::{Commission, CommissionSetting, LedgerStore, Wallet};
use crate::error::ApiError;
use crate::services::{CommissionSummary, SettingChange};
use crate::types::BalanceField;
use crate::AppState;

// ============ Request/Response Types ============

/// 지갑 응답 (available_total 포함)
#[derive(Debug, Serialize)]
pub struct WalletResponse {
    #[serde(flatten)]
    pub wallet: Wallet,
    pub available_total: Decimal,
}

impl From<Wallet> for WalletResponse {
    fn from(wallet: Wallet) -> Self {
        let available_total = wallet.available_total();
        Self { wallet, available_total }
    }
}

/// 관리자 입출금
#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub field: BalanceField,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct DebitResponse {
    pub debited: bool,
    pub wallet: WalletResponse,
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    /// YYYY-MM-DD (기본값: 오늘, UTC)
    pub day: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct TotalResponse {
    pub user_id: i64,
    pub total_commission: Decimal,
}

/// 커미션 설정 변경 (지정한 항목만)
#[derive(Debug, Deserialize)]
pub struct SettingUpdate {
    pub product_rate: Option<Decimal>,
    pub referral_rate: Option<Decimal>,
    pub daily_task_limit: Option<i32>,
}

// ============ Handlers ============

/// GET /api/users/:id/wallet
pub async fn get_wallet<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(user_id): Path<i64>,
) -> Result<Json<WalletResponse>, ApiError> {
    let wallet = state.ledger.wallets.wallet(&actor, user_id).await?;
    Ok(Json(wallet.into()))
}

/// POST /api/users/:id/wallet/credit
pub async fn credit<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(user_id): Path<i64>,
    Json(req): Json<AdjustRequest>,
) -> Result<Json<WalletResponse>, ApiError> {
    let wallet = state
        .ledger
        .wallets
        .credit(&actor, user_id, req.field, req.amount)
        .await?;
    Ok(Json(wallet.into()))
}

/// POST /api/users/:id/wallet/debit
///
/// 잔액 부족은 에러가 아님 (`debited: false`)
pub async fn debit<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(user_id): Path<i64>,
    Json(req): Json<AdjustRequest>,
) -> Result<Json<DebitResponse>, ApiError> {
    let debited = state
        .ledger
        .wallets
        .debit(&actor, user_id, req.field, req.amount)
        .await?;
    let wallet = state.ledger.wallets.wallet(&actor, user_id).await?;
    Ok(Json(DebitResponse {
        debited,
        wallet: wallet.into(),
    }))
}

/// GET /api/users/:id/commissions
pub async fn commissions<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<Commission>>, ApiError> {
    Ok(Json(state.ledger.commissions.commissions(&actor, user_id).await?))
}

/// GET /api/users/:id/commissions/total
pub async fn total_commission<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(user_id): Path<i64>,
) -> Result<Json<TotalResponse>, ApiError> {
    let total_commission = state
        .ledger
        .commissions
        .total_commission(&actor, user_id)
        .await?;
    Ok(Json(TotalResponse { user_id, total_commission }))
}

/// GET /api/users/:id/commissions/summary?day=YYYY-MM-DD
pub async fn commission_summary<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(user_id): Path<i64>,
    Query(query): Query<SummaryQuery>,
) -> Result<Json<CommissionSummary>, ApiError> {
    let day = query.day.unwrap_or_else(|| chrono::Utc::now().date_naive());
    Ok(Json(
        state
            .ledger
            .commissions
            .commission_summary(&actor, user_id, day)
            .await?,
    ))
}

/// GET /api/users/:id/commission-setting
pub async fn get_commission_setting<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(user_id): Path<i64>,
) -> Result<Json<CommissionSetting>, ApiError> {
    Ok(Json(
        state.ledger.commissions.commission_setting(&actor, user_id).await?,
    ))
}

/// PUT /api/users/:id/commission-setting
pub async fn update_commission_setting<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(user_id): Path<i64>,
    Json(req): Json<SettingUpdate>,
) -> Result<Json<CommissionSetting>, ApiError> {
    let change = SettingChange {
        product_rate: req.product_rate,
        referral_rate: req.referral_rate,
        daily_task_limit: req.daily_task_limit,
    };
    Ok(Json(
        state
            .ledger
            .commissions
            .update_settings(&actor, user_id, change)
            .await?,
    ))
}
