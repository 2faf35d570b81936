//! Task Endpoints
//!
//! 작업 배정/완료. 정책 거절(한도, 게이트, 잔액 부족)은 200 + `status` 필드로 응답

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::Actor;
use crate::db::LedgerStore;
use crate::error::ApiError;
use crate::services::authz::require_self_or_staff;
use crate::services::{GateDecision, NextTask, TaskOutcome, TaskProgress};
use crate::AppState;

// ============ Request/Response Types ============

#[derive(Debug, Deserialize)]
pub struct GateQuery {
    pub next: i32,
}

#[derive(Debug, Serialize)]
pub struct GateResponse {
    pub user_id: i64,
    pub next_task_number: i32,
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============ Handlers ============

/// POST /api/users/:id/tasks/next
pub async fn next_task<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(user_id): Path<i64>,
) -> Result<Json<NextTask>, ApiError> {
    Ok(Json(
        state.ledger.tasks.get_next_product_for_user(&actor, user_id).await?,
    ))
}

/// POST /api/users/:id/tasks/:product_id/complete
pub async fn complete_task<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path((user_id, product_id)): Path<(i64, i64)>,
) -> Result<Json<TaskOutcome>, ApiError> {
    Ok(Json(
        state
            .ledger
            .tasks
            .complete_product_task(&actor, user_id, product_id)
            .await?,
    ))
}

/// GET /api/users/:id/tasks/progress
pub async fn task_progress<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(user_id): Path<i64>,
) -> Result<Json<TaskProgress>, ApiError> {
    Ok(Json(state.ledger.tasks.task_progress(&actor, user_id).await?))
}

/// GET /api/users/:id/gate?next=N
pub async fn gate_check<S: LedgerStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(user_id): Path<i64>,
    Query(query): Query<GateQuery>,
) -> Result<Json<GateResponse>, ApiError> {
    require_self_or_staff(&actor, user_id)?;

    let decision = state.ledger.gate.is_task_allowed(user_id, query.next).await?;
    let (allowed, message) = match decision {
        GateDecision::Allowed => (true, None),
        GateDecision::Denied(denial) => (false, Some(denial.to_string())),
    };

    Ok(Json(GateResponse {
        user_id,
        next_task_number: query.next,
        allowed,
        message,
    }))
}
