//! Wallet Ledger
//!
//! 사용자 지갑의 네 가지 잔액 필드와 변경 규칙
//!
//! ```text
//! current_balance      ← 충전 승인(+), 작업 구매(-), 출금 요청(-), 출금 거절 환불(+)
//! product_commission   ← 본인 작업 커미션(+)
//! referral_commission  ← 추천 커미션(+)
//! cumulative_total     ← 위 세 필드에 대한 credit과 같은 금액만큼(+), 감소 없음
//! ```
//!
//! - 커미션은 current_balance를 건드리지 않음
//! - 출금 거절 환불은 수익이 아니므로 cumulative_total 변화 없음
//! - 모든 변경은 지갑 행 잠금 후 하나의 트랜잭션에서 수행

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::db::{Account, LedgerStore, LedgerTx, Wallet};
use crate::error::LedgerError;
use crate::services::accounts::load_account;
use crate::services::authz::{require, require_self_or_staff, Capability};
use crate::types::{quantize, BalanceField};

/// 금액 검증 (음수 거절) 후 원장 정밀도로 양자화
pub fn validate_amount(amount: Decimal) -> Result<Decimal, LedgerError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(LedgerError::validation(format!(
            "Amount must not be negative: {}",
            amount
        )));
    }
    Ok(quantize(amount))
}

// ============ Balance Arithmetic ============

impl Wallet {
    pub fn balance(&self, field: BalanceField) -> Decimal {
        match field {
            BalanceField::CurrentBalance => self.current_balance,
            BalanceField::ProductCommission => self.product_commission,
            BalanceField::ReferralCommission => self.referral_commission,
        }
    }

    fn slot(&mut self, field: BalanceField) -> &mut Decimal {
        match field {
            BalanceField::CurrentBalance => &mut self.current_balance,
            BalanceField::ProductCommission => &mut self.product_commission,
            BalanceField::ReferralCommission => &mut self.referral_commission,
        }
    }

    /// 입금. cumulative_total도 같은 금액만큼 증가
    pub fn credit(&mut self, field: BalanceField, amount: Decimal) -> Result<(), LedgerError> {
        let amount = validate_amount(amount)?;
        if amount.is_zero() {
            return Ok(());
        }

        *self.slot(field) += amount;
        self.cumulative_total += amount;
        Ok(())
    }

    /// 출금. 잔액 부족이면 false (변경 없음)
    ///
    /// cumulative_total은 변경하지 않음
    pub fn debit(&mut self, field: BalanceField, amount: Decimal) -> Result<bool, LedgerError> {
        let amount = validate_amount(amount)?;
        let slot = self.slot(field);
        if *slot < amount {
            return Ok(false);
        }

        *slot -= amount;
        Ok(true)
    }

    /// 거절된 출금 환불 (current_balance만 복구)
    pub fn refund(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        let amount = validate_amount(amount)?;
        self.current_balance += amount;
        Ok(())
    }

    /// current + product + referral
    pub fn available_total(&self) -> Decimal {
        self.current_balance + self.product_commission + self.referral_commission
    }
}

// ============ Service ============

/// 지갑 조회 및 관리자 직접 입출금
pub struct WalletLedger<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> WalletLedger<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// 지갑 조회 (없으면 생성)
    pub async fn wallet(&self, actor: &Account, user_id: i64) -> Result<Wallet, LedgerError> {
        require_self_or_staff(actor, user_id)?;

        let mut tx = self.store.begin().await?;
        load_account(&mut tx, user_id).await?;
        let wallet = tx.lock_wallet(user_id).await?;
        tx.commit().await?;
        Ok(wallet)
    }

    pub async fn available_total(&self, actor: &Account, user_id: i64) -> Result<Decimal, LedgerError> {
        Ok(self.wallet(actor, user_id).await?.available_total())
    }

    /// 관리자 입금
    pub async fn credit(
        &self,
        actor: &Account,
        user_id: i64,
        field: BalanceField,
        amount: Decimal,
    ) -> Result<Wallet, LedgerError> {
        require(actor, Capability::AdjustWallets)?;

        let mut tx = self.store.begin().await?;
        load_account(&mut tx, user_id).await?;
        let mut wallet = tx.lock_wallet(user_id).await?;
        wallet.credit(field, amount)?;
        tx.save_wallet(&wallet).await?;
        tx.commit().await?;

        tracing::info!(user_id, %field, %amount, by = actor.id, "Wallet credited");
        Ok(wallet)
    }

    /// 관리자 출금. 잔액 부족이면 false
    pub async fn debit(
        &self,
        actor: &Account,
        user_id: i64,
        field: BalanceField,
        amount: Decimal,
    ) -> Result<bool, LedgerError> {
        require(actor, Capability::AdjustWallets)?;

        let mut tx = self.store.begin().await?;
        load_account(&mut tx, user_id).await?;
        let mut wallet = tx.lock_wallet(user_id).await?;
        if !wallet.debit(field, amount)? {
            tracing::info!(user_id, %field, %amount, "Debit refused: insufficient balance");
            return Ok(false);
        }
        tx.save_wallet(&wallet).await?;
        tx.commit().await?;

        tracing::info!(user_id, %field, %amount, by = actor.id, "Wallet debited");
        Ok(true)
    }
}
