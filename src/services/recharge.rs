//! Recharge Workflow
//!
//! ```text
//! create (pending) ──attach_voucher──▶ pending ──approve──▶ approved (current_balance += amount)
//!                                              └─reject───▶ rejected
//! ```
//!
//! 승인/거절 시 RechargeHistory 기록, 증빙(voucher) 분리

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::db::{Account, LedgerStore, LedgerTx, RechargeHistory, RechargeRequest, Voucher};
use crate::error::LedgerError;
use crate::services::accounts::load_account;
use crate::services::authz::{require, require_self_or_staff, Capability};
use crate::services::wallet::validate_amount;
use crate::types::{BalanceField, ReviewStatus};

fn positive_amount(amount: Decimal) -> Result<Decimal, LedgerError> {
    let amount = validate_amount(amount)?;
    if amount.is_zero() {
        return Err(LedgerError::validation("Recharge amount must be greater than zero"));
    }
    Ok(amount)
}

pub struct RechargeWorkflow<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> RechargeWorkflow<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// 충전 요청 생성
    pub async fn create_recharge_request(
        &self,
        actor: &Account,
        user_id: i64,
        amount: Decimal,
    ) -> Result<RechargeRequest, LedgerError> {
        require_self_or_staff(actor, user_id)?;
        let amount = positive_amount(amount)?;

        let mut tx = self.store.begin().await?;
        load_account(&mut tx, user_id).await?;
        let recharge = tx.insert_recharge(user_id, amount).await?;
        tx.commit().await?;

        tracing::info!(recharge_id = recharge.id, user_id, %amount, "Recharge requested");
        Ok(recharge)
    }

    /// 증빙 첨부 (기존 증빙은 교체)
    pub async fn attach_voucher(
        &self,
        actor: &Account,
        recharge_id: i64,
        reference: &str,
    ) -> Result<Voucher, LedgerError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(LedgerError::validation("Voucher reference is required"));
        }

        let mut tx = self.store.begin().await?;
        let recharge = self.pending(&mut tx, recharge_id).await?;
        require_self_or_staff(actor, recharge.user_id)?;

        let voucher = tx.upsert_voucher(recharge_id, reference).await?;
        tx.commit().await?;

        tracing::info!(recharge_id, "Voucher attached");
        Ok(voucher)
    }

    /// 승인: current_balance (와 cumulative_total) 증가
    pub async fn approve_recharge(&self, actor: &Account, recharge_id: i64) -> Result<RechargeRequest, LedgerError> {
        self.review(actor, recharge_id, ReviewStatus::Approved).await
    }

    /// 거절: 잔액 변화 없음
    pub async fn reject_recharge(&self, actor: &Account, recharge_id: i64) -> Result<RechargeRequest, LedgerError> {
        self.review(actor, recharge_id, ReviewStatus::Rejected).await
    }

    /// 대기 중 요청 금액 수정 (관리자)
    pub async fn update_recharge_amount(
        &self,
        actor: &Account,
        recharge_id: i64,
        amount: Decimal,
    ) -> Result<RechargeRequest, LedgerError> {
        require(actor, Capability::ReviewRecharges)?;
        let amount = positive_amount(amount)?;

        let mut tx = self.store.begin().await?;
        let mut recharge = self.pending(&mut tx, recharge_id).await?;
        recharge.amount = amount;
        tx.save_recharge(&recharge).await?;
        tx.commit().await?;

        tracing::info!(recharge_id, %amount, by = actor.id, "Recharge amount updated");
        Ok(recharge)
    }

    /// 최신순 처리 이력
    pub async fn recharge_history(
        &self,
        actor: &Account,
        user_id: i64,
    ) -> Result<Vec<RechargeHistory>, LedgerError> {
        require_self_or_staff(actor, user_id)?;

        let mut tx = self.store.begin().await?;
        load_account(&mut tx, user_id).await?;
        let history = tx.recharge_history(user_id).await?;
        tx.commit().await?;
        Ok(history)
    }

    async fn review(
        &self,
        actor: &Account,
        recharge_id: i64,
        status: ReviewStatus,
    ) -> Result<RechargeRequest, LedgerError> {
        require(actor, Capability::ReviewRecharges)?;

        let mut tx = self.store.begin().await?;
        let mut recharge = self.pending(&mut tx, recharge_id).await?;

        if status == ReviewStatus::Approved {
            let mut wallet = tx.lock_wallet(recharge.user_id).await?;
            wallet.credit(BalanceField::CurrentBalance, recharge.amount)?;
            tx.save_wallet(&wallet).await?;
        }

        recharge.status = status;
        recharge.processed_at = Some(Utc::now());
        tx.save_recharge(&recharge).await?;
        tx.insert_recharge_history(&recharge, status).await?;
        tx.delete_voucher(recharge_id).await?;
        tx.commit().await?;

        tracing::info!(
            recharge_id,
            user_id = recharge.user_id,
            amount = %recharge.amount,
            %status,
            by = actor.id,
            "Recharge reviewed"
        );
        Ok(recharge)
    }

    /// 대기 중 요청 잠금 (처리된 요청이면 Conflict)
    async fn pending(&self, tx: &mut S::Tx, recharge_id: i64) -> Result<RechargeRequest, LedgerError> {
        let recharge = tx
            .lock_recharge(recharge_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("Recharge request {}", recharge_id)))?;
        if recharge.status != ReviewStatus::Pending {
            return Err(LedgerError::conflict("Recharge already processed"));
        }
        Ok(recharge)
    }
}
