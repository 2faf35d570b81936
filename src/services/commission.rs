//! Commission Engine
//!
//! 상품/추천 커미션 계산, 원장 행 기록, 추천 커미션 멱등성
//!
//! # Referral idempotency
//!
//! (referrer, product_id, triggered_by) 조합당 추천 커미션은 정확히 1번
//!
//! ```text
//! lock referrer wallet (FOR UPDATE)   ← 같은 추천인에 대한 동시 요청 직렬화
//!   └─ 기존 referral 행 있음 → 저장된 금액 반환 (지갑 변경 없음)
//!   └─ 없음 → 자격 확인 → credit referral_commission → 행 기록
//! ```
//!
//! 저장소 레벨에서는 partial unique index가 마지막 방어선

use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::config::LedgerPolicy;
use crate::db::{
    Account, Commission, CommissionSetting, LedgerStore, LedgerTx, NewCommission, Product,
};
use crate::error::LedgerError;
use crate::services::accounts::load_account;
use crate::services::authz::{require, require_self_or_staff, Capability};
use crate::services::catalog::load_product;
use crate::types::{percent_of, quantize, BalanceField, CommissionType, Role};

/// 하루 커미션 요약
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommissionSummary {
    pub day: NaiveDate,
    pub product_commission: Decimal,
    pub referral_commission: Decimal,
    pub total: Decimal,
}

/// 커미션 설정 일괄 변경 (지정한 항목만)
#[derive(Debug, Clone, Default)]
pub struct SettingChange {
    pub product_rate: Option<Decimal>,
    pub referral_rate: Option<Decimal>,
    pub daily_task_limit: Option<i32>,
}

// ============ Transaction Helpers ============

/// 본인 작업 커미션 = round(price * product_rate / 100)
pub async fn product_commission_in<T: LedgerTx>(
    tx: &mut T,
    user_id: i64,
    product: &Product,
    policy: &LedgerPolicy,
) -> Result<Decimal, LedgerError> {
    let setting = tx
        .commission_setting(user_id, policy.default_daily_task_limit)
        .await?;
    Ok(percent_of(product.price, setting.product_rate))
}

/// 추천 커미션 적용 (멱등)
///
/// 이미 적용된 조합이면 저장된 금액을 그대로 반환
/// 자격 없음 (비활성 추천인, 역할이 user가 아님, 비율 0 이하) → 0, 행 없음
pub async fn apply_referral_in<T: LedgerTx>(
    tx: &mut T,
    referrer: &Account,
    referred: &Account,
    product: &Product,
    policy: &LedgerPolicy,
) -> Result<Decimal, LedgerError> {
    let mut wallet = tx.lock_wallet(referrer.id).await?;

    if let Some(existing) = tx
        .find_referral_commission(referrer.id, product.id, referred.id)
        .await?
    {
        tracing::debug!(
            referrer = referrer.id,
            referred = referred.id,
            product = product.id,
            "Referral commission already applied"
        );
        return Ok(existing.amount);
    }

    if !referrer.is_active || referrer.role != Role::User || referred.role != Role::User {
        return Ok(Decimal::ZERO);
    }

    let setting = tx
        .commission_setting(referrer.id, policy.default_daily_task_limit)
        .await?;
    if setting.referral_rate <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }

    let amount = percent_of(product.price, setting.referral_rate);
    if amount.is_zero() {
        return Ok(Decimal::ZERO);
    }

    wallet.credit(BalanceField::ReferralCommission, amount)?;
    tx.save_wallet(&wallet).await?;
    tx.insert_commission(&NewCommission {
        user_id: referrer.id,
        product_id: product.id,
        product_name: product.name.clone(),
        amount,
        commission_type: CommissionType::Referral,
        triggered_by: referred.id,
    })
    .await?;

    tracing::info!(
        referrer = referrer.id,
        referred = referred.id,
        product = product.id,
        %amount,
        "Referral commission credited"
    );
    Ok(amount)
}

fn validate_rate(rate: Decimal) -> Result<Decimal, LedgerError> {
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err(LedgerError::validation("Commission rate must be between 0 and 100"));
    }
    Ok(quantize(rate))
}

fn validate_daily_limit(limit: i32) -> Result<i32, LedgerError> {
    if limit < 1 {
        return Err(LedgerError::validation("Daily task limit must be at least 1"));
    }
    Ok(limit)
}

// ============ Service ============

pub struct CommissionEngine<S: LedgerStore> {
    store: Arc<S>,
    policy: LedgerPolicy,
}

impl<S: LedgerStore> CommissionEngine<S> {
    pub fn new(store: Arc<S>, policy: LedgerPolicy) -> Self {
        Self { store, policy }
    }

    pub async fn compute_product_commission(
        &self,
        user_id: i64,
        product_id: i64,
    ) -> Result<Decimal, LedgerError> {
        let mut tx = self.store.begin().await?;
        load_account(&mut tx, user_id).await?;
        let product = load_product(&mut tx, product_id).await?;
        let amount = product_commission_in(&mut tx, user_id, &product, &self.policy).await?;
        tx.commit().await?;
        Ok(amount)
    }

    /// 추천 커미션 적용 (단독 트랜잭션)
    pub async fn apply_referral(
        &self,
        referrer_id: i64,
        referred_id: i64,
        product_id: i64,
    ) -> Result<Decimal, LedgerError> {
        let mut tx = self.store.begin().await?;
        let referrer = load_account(&mut tx, referrer_id).await?;
        let referred = load_account(&mut tx, referred_id).await?;
        let product = load_product(&mut tx, product_id).await?;

        let amount = apply_referral_in(&mut tx, &referrer, &referred, &product, &self.policy).await?;
        tx.commit().await?;
        Ok(amount)
    }

    /// 커미션 원장 합계 (self + referral)
    pub async fn total_commission(&self, actor: &Account, user_id: i64) -> Result<Decimal, LedgerError> {
        let rows = self.commissions(actor, user_id).await?;
        Ok(rows.iter().map(|c| c.amount).sum())
    }

    /// 하루(UTC) 커미션 요약
    pub async fn commission_summary(
        &self,
        actor: &Account,
        user_id: i64,
        day: NaiveDate,
    ) -> Result<CommissionSummary, LedgerError> {
        require_self_or_staff(actor, user_id)?;

        let midnight = day
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| LedgerError::validation(format!("Invalid day: {}", day)))?;
        let start = Utc.from_utc_datetime(&midnight);
        let end = start + Duration::days(1);

        let mut tx = self.store.begin().await?;
        load_account(&mut tx, user_id).await?;
        let rows = tx.commissions(user_id, Some(start)).await?;
        tx.commit().await?;

        let sum_of = |kind: CommissionType| -> Decimal {
            rows.iter()
                .filter(|c| c.created_at < end && c.commission_type == kind)
                .map(|c| c.amount)
                .sum()
        };
        let product_commission = sum_of(CommissionType::SelfEarned);
        let referral_commission = sum_of(CommissionType::Referral);

        Ok(CommissionSummary {
            day,
            product_commission,
            referral_commission,
            total: product_commission + referral_commission,
        })
    }

    /// 최신순 커미션 이력
    pub async fn commissions(&self, actor: &Account, user_id: i64) -> Result<Vec<Commission>, LedgerError> {
        require_self_or_staff(actor, user_id)?;

        let mut tx = self.store.begin().await?;
        load_account(&mut tx, user_id).await?;
        let rows = tx.commissions(user_id, None).await?;
        tx.commit().await?;
        Ok(rows)
    }

    pub async fn commission_setting(
        &self,
        actor: &Account,
        user_id: i64,
    ) -> Result<CommissionSetting, LedgerError> {
        require_self_or_staff(actor, user_id)?;

        let mut tx = self.store.begin().await?;
        load_account(&mut tx, user_id).await?;
        let setting = tx
            .commission_setting(user_id, self.policy.default_daily_task_limit)
            .await?;
        tx.commit().await?;
        Ok(setting)
    }

    pub async fn set_product_rate(
        &self,
        actor: &Account,
        user_id: i64,
        rate: Decimal,
    ) -> Result<CommissionSetting, LedgerError> {
        let rate = validate_rate(rate)?;
        self.update_setting(actor, user_id, |s| s.product_rate = rate).await
    }

    pub async fn set_referral_rate(
        &self,
        actor: &Account,
        user_id: i64,
        rate: Decimal,
    ) -> Result<CommissionSetting, LedgerError> {
        let rate = validate_rate(rate)?;
        self.update_setting(actor, user_id, |s| s.referral_rate = rate).await
    }

    pub async fn set_daily_task_limit(
        &self,
        actor: &Account,
        user_id: i64,
        limit: i32,
    ) -> Result<CommissionSetting, LedgerError> {
        let limit = validate_daily_limit(limit)?;
        self.update_setting(actor, user_id, |s| s.daily_task_limit = limit).await
    }

    /// 여러 항목을 한 트랜잭션으로 변경
    ///
    /// 하나라도 잘못된 값이면 아무것도 바뀌지 않음
    pub async fn update_settings(
        &self,
        actor: &Account,
        user_id: i64,
        change: SettingChange,
    ) -> Result<CommissionSetting, LedgerError> {
        let product_rate = change.product_rate.map(validate_rate).transpose()?;
        let referral_rate = change.referral_rate.map(validate_rate).transpose()?;
        let daily_task_limit = change.daily_task_limit.map(validate_daily_limit).transpose()?;

        self.update_setting(actor, user_id, |s| {
            if let Some(rate) = product_rate {
                s.product_rate = rate;
            }
            if let Some(rate) = referral_rate {
                s.referral_rate = rate;
            }
            if let Some(limit) = daily_task_limit {
                s.daily_task_limit = limit;
            }
        })
        .await
    }

    async fn update_setting(
        &self,
        actor: &Account,
        user_id: i64,
        apply: impl FnOnce(&mut CommissionSetting) + Send,
    ) -> Result<CommissionSetting, LedgerError> {
        require(actor, Capability::ManageCommissionSettings)?;

        let mut tx = self.store.begin().await?;
        load_account(&mut tx, user_id).await?;
        let mut setting = tx
            .commission_setting(user_id, self.policy.default_daily_task_limit)
            .await?;
        apply(&mut setting);
        tx.save_commission_setting(&setting).await?;
        tx.commit().await?;

        tracing::info!(
            user_id,
            product_rate = %setting.product_rate,
            referral_rate = %setting.referral_rate,
            daily_task_limit = setting.daily_task_limit,
            by = actor.id,
            "Commission setting updated"
        );
        Ok(setting)
    }
}
