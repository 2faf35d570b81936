//! Task Orchestrator
//!
//! 작업 배정과 완료 처리
//!
//! # Task lifecycle
//!
//! ```text
//! unassigned ──get_next_product_for_user──▶ assigned ──complete_product_task──▶ completed
//! ```
//!
//! 작업 완료는 하나의 트랜잭션:
//! 1. 게이트 재검증 (task_number 기준)
//! 2. current_balance에서 상품 가격 차감
//! 3. 본인 커미션 credit (+ self 원장 행)
//! 4. 작업 완료 표시
//! 5. 추천인이 있으면 추천 커미션 (멱등)
//!
//! 같은 사용자 요청은 사용자 지갑 행 잠금으로 직렬화

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::LedgerPolicy;
use crate::db::{Account, LedgerStore, LedgerTx, NewCommission, Product, UserProductTask};
use crate::error::LedgerError;
use crate::services::accounts::load_account;
use crate::services::authz::require_self_or_staff;
use crate::services::catalog::load_product;
use crate::services::commission::{apply_referral_in, product_commission_in};
use crate::services::stop_points::{evaluate, GateDecision};
use crate::services::{Denial, DenialReason};
use crate::types::{BalanceField, CommissionType, Role};

/// 다음 작업 배정 결과
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NextTask {
    Assigned {
        task: UserProductTask,
        product: Product,
    },
    Unavailable(Denial),
}

/// 작업 완료 결과
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed(CommissionBreakdown),
    Denied(Denial),
}

/// 작업 완료로 발생한 커미션
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommissionBreakdown {
    pub product_commission: Decimal,
    /// 추천인에게 지급된 금액 (추천인 없으면 0)
    pub referral_commission: Decimal,
}

/// 작업 진행 현황
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskProgress {
    pub completed: i64,
    pub assigned: i64,
    pub daily_task_limit: i32,
    /// 다음 배정 시 부여될 순번
    pub next_task_number: i64,
}

pub struct TaskOrchestrator<S: LedgerStore> {
    store: Arc<S>,
    policy: LedgerPolicy,
}

impl<S: LedgerStore> TaskOrchestrator<S> {
    pub fn new(store: Arc<S>, policy: LedgerPolicy) -> Self {
        Self { store, policy }
    }

    /// 다음 작업 배정
    ///
    /// 미완료 작업이 있으면 그 작업을 그대로 반환
    pub async fn get_next_product_for_user(
        &self,
        actor: &Account,
        user_id: i64,
    ) -> Result<NextTask, LedgerError> {
        require_self_or_staff(actor, user_id)?;

        let mut tx = self.store.begin().await?;
        load_account(&mut tx, user_id).await?;
        tx.lock_wallet(user_id).await?;

        let tasks = tx.tasks(user_id).await?;
        if let Some(open) = tasks.iter().find(|t| !t.is_completed) {
            let product = load_product(&mut tx, open.product_id).await?;
            let task = open.clone();
            tx.commit().await?;
            return Ok(NextTask::Assigned { task, product });
        }

        let daily_limit = tx
            .commission_setting(user_id, self.policy.default_daily_task_limit)
            .await?
            .daily_task_limit;
        let count = tasks.len() as i64;
        if count >= i64::from(daily_limit) {
            return Ok(NextTask::Unavailable(Denial::new(
                DenialReason::Exhausted,
                format!("Daily task limit of {} reached.", daily_limit),
            )));
        }

        let next = (count + 1) as i32;
        if let GateDecision::Denied(denial) = evaluate(&mut tx, user_id, next).await? {
            return Ok(NextTask::Unavailable(Denial::new(
                DenialReason::Gated,
                denial.to_string(),
            )));
        }

        let Some(product) = tx.first_unassigned_product(user_id).await? else {
            return Ok(NextTask::Unavailable(Denial::new(
                DenialReason::Exhausted,
                "No products available.",
            )));
        };

        let task = tx.insert_task(user_id, product.id, next).await?;
        tx.commit().await?;

        tracing::info!(user_id, product_id = product.id, task_number = next, "Task assigned");
        Ok(NextTask::Assigned { task, product })
    }

    /// 작업 완료 처리
    pub async fn complete_product_task(
        &self,
        actor: &Account,
        user_id: i64,
        product_id: i64,
    ) -> Result<TaskOutcome, LedgerError> {
        require_self_or_staff(actor, user_id)?;

        let mut tx = self.store.begin().await?;
        let user = load_account(&mut tx, user_id).await?;
        let mut wallet = tx.lock_wallet(user_id).await?;

        let mut task = tx
            .lock_open_task(user_id, product_id)
            .await?
            .ok_or_else(|| LedgerError::conflict("Task already completed or does not exist."))?;
        let product = load_product(&mut tx, product_id).await?;

        let task_number = match task.task_number {
            Some(number) => number,
            None => {
                let completed = tx.tasks(user_id).await?.iter().filter(|t| t.is_completed).count();
                completed as i32 + 1
            }
        };
        if let GateDecision::Denied(denial) = evaluate(&mut tx, user_id, task_number).await? {
            return Ok(TaskOutcome::Denied(Denial::new(
                DenialReason::Gated,
                denial.to_string(),
            )));
        }

        if !wallet.debit(BalanceField::CurrentBalance, product.price)? {
            tracing::info!(user_id, product_id, price = %product.price, "Task completion refused: insufficient funds");
            return Ok(TaskOutcome::Denied(Denial::new(
                DenialReason::InsufficientFunds,
                format!(
                    "Insufficient balance. Required {}, available {}.",
                    product.price, wallet.current_balance
                ),
            )));
        }

        let product_commission = product_commission_in(&mut tx, user_id, &product, &self.policy).await?;
        wallet.credit(BalanceField::ProductCommission, product_commission)?;
        tx.save_wallet(&wallet).await?;
        if product_commission > Decimal::ZERO {
            tx.insert_commission(&NewCommission {
                user_id,
                product_id: product.id,
                product_name: product.name.clone(),
                amount: product_commission,
                commission_type: CommissionType::SelfEarned,
                triggered_by: user_id,
            })
            .await?;
        }

        task.is_completed = true;
        task.completed_at = Some(Utc::now());
        tx.save_task(&task).await?;

        let referral_commission = match self.referrer_of(&mut tx, &user).await? {
            Some(referrer) => {
                apply_referral_in(&mut tx, &referrer, &user, &product, &self.policy).await?
            }
            None => Decimal::ZERO,
        };

        tx.commit().await?;

        tracing::info!(
            user_id,
            product_id,
            task_number,
            %product_commission,
            %referral_commission,
            "Task completed"
        );
        Ok(TaskOutcome::Completed(CommissionBreakdown {
            product_commission,
            referral_commission,
        }))
    }

    /// 작업 진행 현황
    pub async fn task_progress(&self, actor: &Account, user_id: i64) -> Result<TaskProgress, LedgerError> {
        require_self_or_staff(actor, user_id)?;

        let mut tx = self.store.begin().await?;
        load_account(&mut tx, user_id).await?;
        let tasks = tx.tasks(user_id).await?;
        let daily_task_limit = tx
            .commission_setting(user_id, self.policy.default_daily_task_limit)
            .await?
            .daily_task_limit;
        tx.commit().await?;

        let completed = tasks.iter().filter(|t| t.is_completed).count() as i64;
        Ok(TaskProgress {
            completed,
            assigned: tasks.len() as i64 - completed,
            daily_task_limit,
            next_task_number: tasks.len() as i64 + 1,
        })
    }

    /// 활성 상태이고 role이 user인 추천인만
    async fn referrer_of(&self, tx: &mut S::Tx, user: &Account) -> Result<Option<Account>, LedgerError> {
        let Some(referrer_id) = user.referred_by else {
            return Ok(None);
        };
        Ok(tx
            .account(referrer_id)
            .await?
            .filter(|a| a.is_active && a.role == Role::User))
    }
}
