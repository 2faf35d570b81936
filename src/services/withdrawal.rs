//! Withdrawal Workflow
//!
//! ```text
//! bind_payout_address (일일 한도만큼 작업 완료 후, 1회)
//!   └─ request_withdrawal ─ current_balance 즉시 차감 ─▶ pending
//!                                                         ├─ approve → approved (종료)
//!                                                         └─ reject  → rejected (환불)
//! ```
//!
//! 출금 후 최소 잔액(`withdrawal_min_leftover`)은 남겨야 함

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use crate::config::LedgerPolicy;
use crate::db::{Account, LedgerStore, LedgerTx, PayoutAddress, Withdrawal};
use crate::error::LedgerError;
use crate::services::accounts::load_account;
use crate::services::authz::{require, require_self_or_staff, Capability};
use crate::services::wallet::validate_amount;
use crate::types::{BalanceField, Network, ReviewStatus};

pub struct WithdrawalWorkflow<S: LedgerStore> {
    store: Arc<S>,
    policy: LedgerPolicy,
}

impl<S: LedgerStore> WithdrawalWorkflow<S> {
    pub fn new(store: Arc<S>, policy: LedgerPolicy) -> Self {
        Self { store, policy }
    }

    /// 출금 주소 등록 (변경 불가, 주소는 전역 unique)
    pub async fn bind_payout_address(
        &self,
        actor: &Account,
        user_id: i64,
        address: &str,
        network: Network,
    ) -> Result<PayoutAddress, LedgerError> {
        require_self_or_staff(actor, user_id)?;

        let address = address.trim();
        if address.is_empty() {
            return Err(LedgerError::validation("Wallet address is required."));
        }

        let mut tx = self.store.begin().await?;
        load_account(&mut tx, user_id).await?;

        let daily_limit = tx
            .commission_setting(user_id, self.policy.default_daily_task_limit)
            .await?
            .daily_task_limit;
        let completed = tx.tasks(user_id).await?.iter().filter(|t| t.is_completed).count();
        if (completed as i64) < i64::from(daily_limit) {
            return Err(LedgerError::validation(format!(
                "You must complete all {} tasks before binding your wallet. Completed: {}",
                daily_limit, completed
            )));
        }

        if let Some(existing) = tx.payout_address(user_id).await? {
            return Err(LedgerError::conflict(format!(
                "Wallet already bound: {} on {}.",
                existing.address, existing.network
            )));
        }
        if tx.payout_address_in_use(address).await? {
            return Err(LedgerError::conflict(
                "This wallet address is already linked to another account.",
            ));
        }

        let bound = tx.insert_payout_address(user_id, address, network).await?;
        tx.commit().await?;

        tracing::info!(user_id, %network, "Payout address bound");
        Ok(bound)
    }

    pub async fn payout_address(
        &self,
        actor: &Account,
        user_id: i64,
    ) -> Result<Option<PayoutAddress>, LedgerError> {
        require_self_or_staff(actor, user_id)?;

        let mut tx = self.store.begin().await?;
        load_account(&mut tx, user_id).await?;
        let address = tx.payout_address(user_id).await?;
        tx.commit().await?;
        Ok(address)
    }

    /// 출금 요청
    ///
    /// amount가 없으면 최소 잔액을 제외한 전액. network가 없으면 등록된 주소의 network
    pub async fn request_withdrawal(
        &self,
        actor: &Account,
        user_id: i64,
        amount: Option<Decimal>,
        network: Option<Network>,
    ) -> Result<Withdrawal, LedgerError> {
        require_self_or_staff(actor, user_id)?;

        let mut tx = self.store.begin().await?;
        load_account(&mut tx, user_id).await?;
        let address = tx.payout_address(user_id).await?.ok_or_else(|| {
            LedgerError::validation("You must bind your wallet before making a withdrawal.")
        })?;

        let mut wallet = tx.lock_wallet(user_id).await?;
        let leftover = self.policy.withdrawal_min_leftover;
        let amount = match amount {
            Some(amount) => validate_amount(amount)?,
            None => wallet.current_balance - leftover,
        };
        if amount <= Decimal::ZERO || wallet.current_balance - amount < leftover {
            return Err(LedgerError::validation(format!(
                "Insufficient balance. Minimum {} must remain.",
                leftover
            )));
        }
        if !wallet.debit(BalanceField::CurrentBalance, amount)? {
            return Err(LedgerError::validation("Insufficient balance."));
        }
        tx.save_wallet(&wallet).await?;

        let network = network.unwrap_or(address.network);
        let withdrawal = tx.insert_withdrawal(user_id, amount, network).await?;
        tx.commit().await?;

        tracing::info!(withdrawal_id = withdrawal.id, user_id, %amount, %network, "Withdrawal requested");
        Ok(withdrawal)
    }

    /// 승인 (자금은 요청 시 이미 차감됨)
    pub async fn approve_withdrawal(&self, actor: &Account, withdrawal_id: i64) -> Result<Withdrawal, LedgerError> {
        self.review(actor, withdrawal_id, ReviewStatus::Approved).await
    }

    /// 거절 → current_balance 환불 (cumulative_total 변화 없음)
    pub async fn reject_withdrawal(&self, actor: &Account, withdrawal_id: i64) -> Result<Withdrawal, LedgerError> {
        self.review(actor, withdrawal_id, ReviewStatus::Rejected).await
    }

    /// 최신순 출금 내역
    pub async fn withdrawals(&self, actor: &Account, user_id: i64) -> Result<Vec<Withdrawal>, LedgerError> {
        require_self_or_staff(actor, user_id)?;

        let mut tx = self.store.begin().await?;
        load_account(&mut tx, user_id).await?;
        let rows = tx.withdrawals(user_id).await?;
        tx.commit().await?;
        Ok(rows)
    }

    async fn review(
        &self,
        actor: &Account,
        withdrawal_id: i64,
        status: ReviewStatus,
    ) -> Result<Withdrawal, LedgerError> {
        require(actor, Capability::ReviewWithdrawals)?;

        let mut tx = self.store.begin().await?;
        let mut withdrawal = tx
            .lock_withdrawal(withdrawal_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("Withdrawal {}", withdrawal_id)))?;
        if withdrawal.status != ReviewStatus::Pending {
            return Err(LedgerError::conflict("Withdrawal already processed"));
        }

        if status == ReviewStatus::Rejected {
            let mut wallet = tx.lock_wallet(withdrawal.user_id).await?;
            wallet.refund(withdrawal.amount)?;
            tx.save_wallet(&wallet).await?;
        }

        withdrawal.status = status;
        withdrawal.processed_at = Some(Utc::now());
        tx.save_withdrawal(&withdrawal).await?;
        tx.commit().await?;

        tracing::info!(
            withdrawal_id,
            user_id = withdrawal.user_id,
            amount = %withdrawal.amount,
            %status,
            by = actor.id,
            "Withdrawal reviewed"
        );
        Ok(withdrawal)
    }
}
