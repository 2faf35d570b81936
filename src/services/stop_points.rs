//! Task Gate (Stop Points)
//!
//! 작업 순번마다 다음 작업을 시도할 수 있는지 판단
//!
//! # Gate rules
//!
//! ```text
//! is_stopped?
//!   yes → last_cleared.order 이후 첫 StopPoint (order 순)
//!           있음 → 거절 (point, required_balance 안내)
//!           없음 → 거절 ("contact support", warn 로그)
//!   no  → point >= next 인 가장 앞의 pending StopPoint
//!           point == next → 거절 (승인 또는 충전 필요)
//!           그 외 → 허용
//! ```
//!
//! 판단 자체(`decide`)는 순수 함수, 저장소 접근은 `evaluate`에서만

use std::fmt;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::LedgerPolicy;
use crate::db::{Account, LedgerStore, LedgerTx, StopPoint, StopPointProgress};
use crate::error::LedgerError;
use crate::services::accounts::load_account;
use crate::services::authz::{require, require_self_or_staff, Capability};
use crate::services::wallet::validate_amount;
use crate::types::ReviewStatus;

// ============ Decision ============

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Allowed,
    Denied(GateDenial),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allowed)
    }
}

/// 거절 사유
#[derive(Debug, Clone, PartialEq)]
pub enum GateDenial {
    /// 정지 상태, 다음 StopPoint에서 충전 필요
    StoppedAt { point: i32, required_balance: Decimal },
    /// 정지 상태인데 해당하는 StopPoint가 없음 (데이터 이상)
    StoppedWithoutRule,
    /// 이번 순번에 pending StopPoint
    PendingApproval { point: i32 },
}

impl fmt::Display for GateDenial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateDenial::StoppedAt { point, required_balance } => write!(
                f,
                "User is stopped at task {}. Recharge of {} required.",
                point, required_balance
            ),
            GateDenial::StoppedWithoutRule => f.write_str(
                "User is stopped, but no specific rule found. Please contact support.",
            ),
            GateDenial::PendingApproval { point } => {
                write!(f, "StopPoint at task {} requires approval or recharge.", point)
            }
        }
    }
}

/// 게이트 판단 (points는 임의 순서)
pub fn decide(progress: &StopPointProgress, points: &[StopPoint], next_task_number: i32) -> GateDecision {
    if progress.is_stopped {
        let cleared_order = progress
            .last_cleared
            .and_then(|id| points.iter().find(|sp| sp.id == id))
            .map_or(0, |sp| sp.order);

        let blocking = points
            .iter()
            .filter(|sp| sp.order > cleared_order)
            .min_by_key(|sp| (sp.order, sp.id));

        return GateDecision::Denied(match blocking {
            Some(sp) => GateDenial::StoppedAt {
                point: sp.point,
                required_balance: sp.required_balance,
            },
            None => GateDenial::StoppedWithoutRule,
        });
    }

    let pending = points
        .iter()
        .filter(|sp| sp.status == ReviewStatus::Pending && sp.point >= next_task_number)
        .min_by_key(|sp| sp.point);

    match pending {
        Some(sp) if sp.point == next_task_number => {
            GateDecision::Denied(GateDenial::PendingApproval { point: sp.point })
        }
        _ => GateDecision::Allowed,
    }
}

/// 트랜잭션 안에서 게이트 판단
pub async fn evaluate<T: LedgerTx>(
    tx: &mut T,
    user_id: i64,
    next_task_number: i32,
) -> Result<GateDecision, LedgerError> {
    let progress = tx.lock_progress(user_id).await?;
    let points = tx.stop_points(user_id).await?;

    let decision = decide(&progress, &points, next_task_number);
    if decision == GateDecision::Denied(GateDenial::StoppedWithoutRule) {
        tracing::warn!(
            user_id,
            last_cleared = ?progress.last_cleared,
            "User is stopped but no blocking stop point exists"
        );
    }
    Ok(decision)
}

// ============ Admin Types ============

/// 추가되지 않은 StopPoint 입력
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedStopPoint {
    pub point: i32,
    pub required_balance: Decimal,
    pub reason: String,
}

/// add_stop_points 결과
#[derive(Debug, Clone, Serialize)]
pub struct StopPointBatch {
    pub added: Vec<StopPoint>,
    pub skipped: Vec<SkippedStopPoint>,
}

/// update_stop_point 입력 (None = 유지)
#[derive(Debug, Clone, Default)]
pub struct StopPointChange {
    pub point: Option<i32>,
    pub required_balance: Option<Decimal>,
    pub order: Option<i32>,
}

fn check_point_range(point: i32, daily_limit: i32) -> Result<(), String> {
    if (1..=daily_limit).contains(&point) {
        Ok(())
    } else {
        Err(format!("Stop point must be between 1 and {}", daily_limit))
    }
}

// ============ Service ============

pub struct TaskGate<S: LedgerStore> {
    store: Arc<S>,
    policy: LedgerPolicy,
}

impl<S: LedgerStore> TaskGate<S> {
    pub fn new(store: Arc<S>, policy: LedgerPolicy) -> Self {
        Self { store, policy }
    }

    /// 다음 작업(next_task_number) 허용 여부
    pub async fn is_task_allowed(
        &self,
        user_id: i64,
        next_task_number: i32,
    ) -> Result<GateDecision, LedgerError> {
        let mut tx = self.store.begin().await?;
        load_account(&mut tx, user_id).await?;
        let decision = evaluate(&mut tx, user_id, next_task_number).await?;
        tx.commit().await?;
        Ok(decision)
    }

    /// point 순 목록
    pub async fn stop_points(&self, actor: &Account, user_id: i64) -> Result<Vec<StopPoint>, LedgerError> {
        require_self_or_staff(actor, user_id)?;

        let mut tx = self.store.begin().await?;
        load_account(&mut tx, user_id).await?;
        let points = tx.stop_points(user_id).await?;
        tx.commit().await?;
        Ok(points)
    }

    /// StopPoint 여러 개 추가
    ///
    /// 범위 밖 / 음수 금액 / 중복은 건너뛰고 skipped로 반환
    pub async fn add_stop_points(
        &self,
        actor: &Account,
        user_id: i64,
        entries: &[(i32, Decimal)],
    ) -> Result<StopPointBatch, LedgerError> {
        require(actor, Capability::ManageStopPoints)?;

        let mut tx = self.store.begin().await?;
        load_account(&mut tx, user_id).await?;
        let daily_limit = tx
            .commission_setting(user_id, self.policy.default_daily_task_limit)
            .await?
            .daily_task_limit;
        let mut existing = tx.stop_points(user_id).await?;
        let mut next_order = existing.iter().map(|sp| sp.order).max().unwrap_or(0) + 1;

        let mut batch = StopPointBatch { added: Vec::new(), skipped: Vec::new() };
        for &(point, required_balance) in entries {
            let checked = check_point_range(point, daily_limit)
                .and_then(|_| validate_amount(required_balance).map_err(|e| e.to_string()))
                .and_then(|balance| {
                    if existing.iter().any(|sp| sp.point == point) {
                        Err(format!("Stop point {} already exists", point))
                    } else {
                        Ok(balance)
                    }
                });

            match checked {
                Ok(balance) => {
                    let created = tx
                        .insert_stop_point(user_id, point, balance, next_order)
                        .await?;
                    next_order += 1;
                    existing.push(created.clone());
                    batch.added.push(created);
                }
                Err(reason) => batch.skipped.push(SkippedStopPoint {
                    point,
                    required_balance,
                    reason,
                }),
            }
        }
        tx.commit().await?;

        tracing::info!(
            user_id,
            added = batch.added.len(),
            skipped = batch.skipped.len(),
            by = actor.id,
            "Stop points added"
        );
        Ok(batch)
    }

    /// StopPoint 수정 (point 중복 검사는 자기 자신 제외)
    pub async fn update_stop_point(
        &self,
        actor: &Account,
        user_id: i64,
        stop_point_id: i64,
        change: StopPointChange,
    ) -> Result<StopPoint, LedgerError> {
        require(actor, Capability::ManageStopPoints)?;

        let mut tx = self.store.begin().await?;
        let mut stop_point = self.owned_stop_point(&mut tx, user_id, stop_point_id).await?;

        if let Some(point) = change.point {
            let daily_limit = tx
                .commission_setting(user_id, self.policy.default_daily_task_limit)
                .await?
                .daily_task_limit;
            check_point_range(point, daily_limit).map_err(LedgerError::Validation)?;

            let duplicate = tx
                .stop_points(user_id)
                .await?
                .iter()
                .any(|sp| sp.point == point && sp.id != stop_point.id);
            if duplicate {
                return Err(LedgerError::conflict(
                    "Another stop point with this number already exists.",
                ));
            }
            stop_point.point = point;
        }
        if let Some(required_balance) = change.required_balance {
            stop_point.required_balance = validate_amount(required_balance)?;
        }
        if let Some(order) = change.order {
            if order < 1 {
                return Err(LedgerError::validation("Stop point order must be at least 1"));
            }
            stop_point.order = order;
        }

        tx.save_stop_point(&stop_point).await?;
        tx.commit().await?;

        tracing::info!(user_id, stop_point_id, point = stop_point.point, by = actor.id, "Stop point updated");
        Ok(stop_point)
    }

    /// 승인: is_stopped 해제, last_cleared 갱신
    pub async fn approve_stop_point(
        &self,
        actor: &Account,
        user_id: i64,
        stop_point_id: i64,
    ) -> Result<StopPoint, LedgerError> {
        self.review(actor, user_id, stop_point_id, ReviewStatus::Approved).await
    }

    /// 거절: 사용자 정지
    pub async fn reject_stop_point(
        &self,
        actor: &Account,
        user_id: i64,
        stop_point_id: i64,
    ) -> Result<StopPoint, LedgerError> {
        self.review(actor, user_id, stop_point_id, ReviewStatus::Rejected).await
    }

    async fn review(
        &self,
        actor: &Account,
        user_id: i64,
        stop_point_id: i64,
        status: ReviewStatus,
    ) -> Result<StopPoint, LedgerError> {
        require(actor, Capability::ManageStopPoints)?;

        // 잠금 순서: progress → stop point (reset과 동일)
        let mut tx = self.store.begin().await?;
        load_account(&mut tx, user_id).await?;
        let mut progress = tx.lock_progress(user_id).await?;
        let mut stop_point = self.owned_stop_point(&mut tx, user_id, stop_point_id).await?;

        stop_point.status = status;
        match status {
            ReviewStatus::Approved => {
                progress.is_stopped = false;
                progress.last_cleared = Some(stop_point.id);
            }
            _ => progress.is_stopped = true,
        }

        tx.save_stop_point(&stop_point).await?;
        tx.save_progress(&progress).await?;
        tx.commit().await?;

        tracing::info!(user_id, stop_point_id, %status, by = actor.id, "Stop point reviewed");
        Ok(stop_point)
    }

    /// 전체 초기화: StopPoint 삭제, pending 충전 금액 0, 진행 상태 초기화
    pub async fn reset_stop_points_for_user(&self, actor: &Account, user_id: i64) -> Result<(), LedgerError> {
        require(actor, Capability::ManageStopPoints)?;

        let mut tx = self.store.begin().await?;
        load_account(&mut tx, user_id).await?;
        let mut progress = tx.lock_progress(user_id).await?;
        let removed = tx.delete_stop_points(user_id).await?;
        let zeroed = tx.zero_pending_recharges(user_id).await?;

        progress.is_stopped = false;
        progress.last_cleared = None;
        tx.save_progress(&progress).await?;
        tx.commit().await?;

        tracing::info!(user_id, removed, zeroed, by = actor.id, "Stop points reset");
        Ok(())
    }

    async fn owned_stop_point(
        &self,
        tx: &mut S::Tx,
        user_id: i64,
        stop_point_id: i64,
    ) -> Result<StopPoint, LedgerError> {
        load_account(tx, user_id).await?;
        tx.lock_stop_point(stop_point_id)
            .await?
            .filter(|sp| sp.user_id == user_id)
            .ok_or_else(|| LedgerError::not_found(format!("Stop point {}", stop_point_id)))
    }
}
