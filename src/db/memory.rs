//! In-memory `LedgerStore` (테스트용)
//!
//! 트랜잭션 = 전체 상태 잠금 + 작업 사본
//! - begin: 상태 Mutex 획득 (동시 트랜잭션은 대기 → serializable)
//! - commit: 사본을 상태에 반영
//! - drop: 사본 폐기 (롤백)
//!
//! FK 동작(CASCADE / SET NULL)은 migrations의 스키마와 동일하게 흉내냄

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::models::*;
use super::repository::{LedgerStore, LedgerTx, StoreResult};
use crate::types::{CommissionType, Network, ReviewStatus};

#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    next_id: i64,
    pub accounts: Vec<Account>,
    pub wallets: HashMap<i64, Wallet>,
    pub settings: HashMap<i64, CommissionSetting>,
    pub commissions: Vec<Commission>,
    pub products: Vec<Product>,
    pub tasks: Vec<UserProductTask>,
    pub stop_points: Vec<StopPoint>,
    pub progress: HashMap<i64, StopPointProgress>,
    pub recharges: Vec<RechargeRequest>,
    pub vouchers: Vec<Voucher>,
    pub recharge_history: Vec<RechargeHistory>,
    pub payout_addresses: Vec<PayoutAddress>,
    pub withdrawals: Vec<Withdrawal>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 커밋된 상태 스냅샷 (검증용)
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

#[async_trait]
impl LedgerStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> StoreResult<MemoryTx> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(MemoryTx { guard, work })
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

fn replace<T: Clone>(rows: &mut [T], row: &T, same: impl Fn(&T) -> bool) {
    if let Some(slot) = rows.iter_mut().find(|r| same(r)) {
        *slot = row.clone();
    }
}

#[async_trait]
impl LedgerTx for MemoryTx {
    // ============ Accounts ============

    async fn account(&mut self, id: i64) -> StoreResult<Option<Account>> {
        Ok(self.work.accounts.iter().find(|a| a.id == id).cloned())
    }

    async fn lock_account_by_referral_code(&mut self, code: &str) -> StoreResult<Option<Account>> {
        Ok(self
            .work
            .accounts
            .iter()
            .find(|a| a.referral_code.as_deref() == Some(code))
            .cloned())
    }

    async fn username_taken(&mut self, username: &str) -> StoreResult<bool> {
        Ok(self.work.accounts.iter().any(|a| a.username == username))
    }

    async fn phone_taken(&mut self, phone: &str) -> StoreResult<bool> {
        Ok(self.work.accounts.iter().any(|a| a.phone.as_deref() == Some(phone)))
    }

    async fn referral_code_taken(&mut self, code: &str) -> StoreResult<bool> {
        Ok(self.work.accounts.iter().any(|a| a.referral_code.as_deref() == Some(code)))
    }

    async fn count_referrals(&mut self, referrer_id: i64) -> StoreResult<i64> {
        Ok(self
            .work
            .accounts
            .iter()
            .filter(|a| a.referred_by == Some(referrer_id))
            .count() as i64)
    }

    async fn insert_account(&mut self, account: &NewAccount) -> StoreResult<Account> {
        let created = Account {
            id: self.work.next_id(),
            username: account.username.clone(),
            phone: account.phone.clone(),
            role: account.role,
            referral_code: account.referral_code.clone(),
            referred_by: account.referred_by,
            is_active: true,
            created_at: Utc::now(),
        };
        self.work.accounts.push(created.clone());
        Ok(created)
    }

    async fn save_account(&mut self, account: &Account) -> StoreResult<()> {
        replace(&mut self.work.accounts, account, |a| a.id == account.id);
        Ok(())
    }

    async fn delete_account(&mut self, id: i64) -> StoreResult<()> {
        let state = &mut self.work;
        state.accounts.retain(|a| a.id != id);
        for account in state.accounts.iter_mut() {
            if account.referred_by == Some(id) {
                account.referred_by = None;
            }
        }
        state.wallets.remove(&id);
        state.settings.remove(&id);
        state.progress.remove(&id);
        state.commissions.retain(|c| c.user_id != id);
        for commission in state.commissions.iter_mut() {
            if commission.triggered_by == Some(id) {
                commission.triggered_by = None;
            }
        }
        state.tasks.retain(|t| t.user_id != id);
        state.stop_points.retain(|s| s.user_id != id);
        let recharge_ids: Vec<i64> = state
            .recharges
            .iter()
            .filter(|r| r.user_id == id)
            .map(|r| r.id)
            .collect();
        state.vouchers.retain(|v| !recharge_ids.contains(&v.recharge_request_id));
        state.recharges.retain(|r| r.user_id != id);
        state.recharge_history.retain(|h| h.user_id != id);
        state.payout_addresses.retain(|p| p.user_id != id);
        state.withdrawals.retain(|w| w.user_id != id);
        Ok(())
    }

    // ============ Wallets ============

    async fn lock_wallet(&mut self, user_id: i64) -> StoreResult<Wallet> {
        Ok(self
            .work
            .wallets
            .entry(user_id)
            .or_insert_with(|| Wallet::empty(user_id))
            .clone())
    }

    async fn save_wallet(&mut self, wallet: &Wallet) -> StoreResult<()> {
        let mut saved = wallet.clone();
        saved.updated_at = Utc::now();
        self.work.wallets.insert(wallet.user_id, saved);
        Ok(())
    }

    // ============ Commission ============

    async fn commission_setting(
        &mut self,
        user_id: i64,
        default_daily_limit: i32,
    ) -> StoreResult<CommissionSetting> {
        Ok(self
            .work
            .settings
            .entry(user_id)
            .or_insert_with(|| CommissionSetting {
                user_id,
                product_rate: Decimal::ZERO,
                referral_rate: Decimal::ZERO,
                daily_task_limit: default_daily_limit,
                updated_at: Utc::now(),
            })
            .clone())
    }

    async fn save_commission_setting(&mut self, setting: &CommissionSetting) -> StoreResult<()> {
        let mut saved = setting.clone();
        saved.updated_at = Utc::now();
        self.work.settings.insert(setting.user_id, saved);
        Ok(())
    }

    async fn find_referral_commission(
        &mut self,
        referrer_id: i64,
        product_id: i64,
        triggered_by: i64,
    ) -> StoreResult<Option<Commission>> {
        Ok(self
            .work
            .commissions
            .iter()
            .find(|c| {
                c.user_id == referrer_id
                    && c.product_id == product_id
                    && c.triggered_by == Some(triggered_by)
                    && c.commission_type == CommissionType::Referral
            })
            .cloned())
    }

    async fn insert_commission(&mut self, commission: &NewCommission) -> StoreResult<Commission> {
        let created = Commission {
            id: self.work.next_id(),
            user_id: commission.user_id,
            product_id: commission.product_id,
            product_name: commission.product_name.clone(),
            amount: commission.amount,
            commission_type: commission.commission_type,
            triggered_by: Some(commission.triggered_by),
            created_at: Utc::now(),
        };
        self.work.commissions.push(created.clone());
        Ok(created)
    }

    async fn commissions(
        &mut self,
        user_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<Commission>> {
        let mut rows: Vec<Commission> = self
            .work
            .commissions
            .iter()
            .filter(|c| c.user_id == user_id)
            .filter(|c| since.map_or(true, |since| c.created_at >= since))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    // ============ Catalog ============

    async fn product(&mut self, id: i64) -> StoreResult<Option<Product>> {
        Ok(self.work.products.iter().find(|p| p.id == id).cloned())
    }

    async fn first_unassigned_product(&mut self, user_id: i64) -> StoreResult<Option<Product>> {
        let tasks = &self.work.tasks;
        let mut candidates: Vec<&Product> = self
            .work
            .products
            .iter()
            .filter(|p| p.is_active)
            .filter(|p| !tasks.iter().any(|t| t.user_id == user_id && t.product_id == p.id))
            .collect();
        candidates.sort_by_key(|p| p.id);
        Ok(candidates.first().map(|p| (*p).clone()))
    }

    async fn insert_product(&mut self, name: &str, price: Decimal) -> StoreResult<Product> {
        let product = Product {
            id: self.work.next_id(),
            name: name.to_string(),
            price,
            is_active: true,
            created_at: Utc::now(),
        };
        self.work.products.push(product.clone());
        Ok(product)
    }

    async fn save_product(&mut self, product: &Product) -> StoreResult<()> {
        replace(&mut self.work.products, product, |p| p.id == product.id);
        Ok(())
    }

    // ============ Tasks ============

    async fn tasks(&mut self, user_id: i64) -> StoreResult<Vec<UserProductTask>> {
        Ok(self.work.tasks.iter().filter(|t| t.user_id == user_id).cloned().collect())
    }

    async fn lock_open_task(
        &mut self,
        user_id: i64,
        product_id: i64,
    ) -> StoreResult<Option<UserProductTask>> {
        Ok(self
            .work
            .tasks
            .iter()
            .find(|t| t.user_id == user_id && t.product_id == product_id && !t.is_completed)
            .cloned())
    }

    async fn insert_task(
        &mut self,
        user_id: i64,
        product_id: i64,
        task_number: i32,
    ) -> StoreResult<UserProductTask> {
        let task = UserProductTask {
            id: self.work.next_id(),
            user_id,
            product_id,
            task_number: Some(task_number),
            is_completed: false,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.work.tasks.push(task.clone());
        Ok(task)
    }

    async fn save_task(&mut self, task: &UserProductTask) -> StoreResult<()> {
        replace(&mut self.work.tasks, task, |t| t.id == task.id);
        Ok(())
    }

    // ============ Stop Points ============

    async fn stop_points(&mut self, user_id: i64) -> StoreResult<Vec<StopPoint>> {
        let mut rows: Vec<StopPoint> = self
            .work
            .stop_points
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.point);
        Ok(rows)
    }

    async fn lock_stop_point(&mut self, id: i64) -> StoreResult<Option<StopPoint>> {
        Ok(self.work.stop_points.iter().find(|s| s.id == id).cloned())
    }

    async fn insert_stop_point(
        &mut self,
        user_id: i64,
        point: i32,
        required_balance: Decimal,
        order: i32,
    ) -> StoreResult<StopPoint> {
        let stop_point = StopPoint {
            id: self.work.next_id(),
            user_id,
            point,
            required_balance,
            status: ReviewStatus::Pending,
            order,
        };
        self.work.stop_points.push(stop_point.clone());
        Ok(stop_point)
    }

    async fn save_stop_point(&mut self, stop_point: &StopPoint) -> StoreResult<()> {
        replace(&mut self.work.stop_points, stop_point, |s| s.id == stop_point.id);
        Ok(())
    }

    async fn delete_stop_points(&mut self, user_id: i64) -> StoreResult<u64> {
        let state = &mut self.work;
        let removed: Vec<i64> = state
            .stop_points
            .iter()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.id)
            .collect();
        state.stop_points.retain(|s| s.user_id != user_id);
        for progress in state.progress.values_mut() {
            if progress.last_cleared.map_or(false, |id| removed.contains(&id)) {
                progress.last_cleared = None;
            }
        }
        Ok(removed.len() as u64)
    }

    async fn lock_progress(&mut self, user_id: i64) -> StoreResult<StopPointProgress> {
        Ok(self
            .work
            .progress
            .entry(user_id)
            .or_insert_with(|| StopPointProgress {
                user_id,
                last_cleared: None,
                is_stopped: false,
            })
            .clone())
    }

    async fn save_progress(&mut self, progress: &StopPointProgress) -> StoreResult<()> {
        self.work.progress.insert(progress.user_id, progress.clone());
        Ok(())
    }

    // ============ Recharge ============

    async fn insert_recharge(&mut self, user_id: i64, amount: Decimal) -> StoreResult<RechargeRequest> {
        let recharge = RechargeRequest {
            id: self.work.next_id(),
            user_id,
            amount,
            status: ReviewStatus::Pending,
            created_at: Utc::now(),
            processed_at: None,
        };
        self.work.recharges.push(recharge.clone());
        Ok(recharge)
    }

    async fn lock_recharge(&mut self, id: i64) -> StoreResult<Option<RechargeRequest>> {
        Ok(self.work.recharges.iter().find(|r| r.id == id).cloned())
    }

    async fn save_recharge(&mut self, recharge: &RechargeRequest) -> StoreResult<()> {
        replace(&mut self.work.recharges, recharge, |r| r.id == recharge.id);
        Ok(())
    }

    async fn zero_pending_recharges(&mut self, user_id: i64) -> StoreResult<u64> {
        let mut updated = 0;
        for recharge in self.work.recharges.iter_mut() {
            if recharge.user_id == user_id && recharge.status == ReviewStatus::Pending {
                recharge.amount = Decimal::ZERO;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn upsert_voucher(&mut self, recharge_id: i64, reference: &str) -> StoreResult<Voucher> {
        if let Some(voucher) = self
            .work
            .vouchers
            .iter_mut()
            .find(|v| v.recharge_request_id == recharge_id)
        {
            voucher.reference = reference.to_string();
            voucher.uploaded_at = Utc::now();
            return Ok(voucher.clone());
        }

        let voucher = Voucher {
            id: self.work.next_id(),
            recharge_request_id: recharge_id,
            reference: reference.to_string(),
            uploaded_at: Utc::now(),
        };
        self.work.vouchers.push(voucher.clone());
        Ok(voucher)
    }

    async fn delete_voucher(&mut self, recharge_id: i64) -> StoreResult<bool> {
        let before = self.work.vouchers.len();
        self.work.vouchers.retain(|v| v.recharge_request_id != recharge_id);
        Ok(self.work.vouchers.len() < before)
    }

    async fn insert_recharge_history(
        &mut self,
        recharge: &RechargeRequest,
        status: ReviewStatus,
    ) -> StoreResult<RechargeHistory> {
        let history = RechargeHistory {
            id: self.work.next_id(),
            user_id: recharge.user_id,
            recharge_request_id: Some(recharge.id),
            amount: recharge.amount,
            status,
            action_date: Utc::now(),
        };
        self.work.recharge_history.push(history.clone());
        Ok(history)
    }

    async fn recharge_history(&mut self, user_id: i64) -> StoreResult<Vec<RechargeHistory>> {
        let mut rows: Vec<RechargeHistory> = self
            .work
            .recharge_history
            .iter()
            .filter(|h| h.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.action_date.cmp(&a.action_date).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    // ============ Withdrawals ============

    async fn payout_address(&mut self, user_id: i64) -> StoreResult<Option<PayoutAddress>> {
        Ok(self
            .work
            .payout_addresses
            .iter()
            .find(|p| p.user_id == user_id)
            .cloned())
    }

    async fn payout_address_in_use(&mut self, address: &str) -> StoreResult<bool> {
        Ok(self.work.payout_addresses.iter().any(|p| p.address == address))
    }

    async fn insert_payout_address(
        &mut self,
        user_id: i64,
        address: &str,
        network: Network,
    ) -> StoreResult<PayoutAddress> {
        let created = PayoutAddress {
            user_id,
            address: address.to_string(),
            network,
            created_at: Utc::now(),
        };
        self.work.payout_addresses.push(created.clone());
        Ok(created)
    }

    async fn insert_withdrawal(
        &mut self,
        user_id: i64,
        amount: Decimal,
        network: Network,
    ) -> StoreResult<Withdrawal> {
        let withdrawal = Withdrawal {
            id: self.work.next_id(),
            user_id,
            amount,
            network,
            status: ReviewStatus::Pending,
            created_at: Utc::now(),
            processed_at: None,
        };
        self.work.withdrawals.push(withdrawal.clone());
        Ok(withdrawal)
    }

    async fn lock_withdrawal(&mut self, id: i64) -> StoreResult<Option<Withdrawal>> {
        Ok(self.work.withdrawals.iter().find(|w| w.id == id).cloned())
    }

    async fn save_withdrawal(&mut self, withdrawal: &Withdrawal) -> StoreResult<()> {
        replace(&mut self.work.withdrawals, withdrawal, |w| w.id == withdrawal.id);
        Ok(())
    }

    async fn withdrawals(&mut self, user_id: i64) -> StoreResult<Vec<Withdrawal>> {
        let mut rows: Vec<Withdrawal> = self
            .work
            .withdrawals
            .iter()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    // ============ Lifecycle ============

    async fn commit(self) -> StoreResult<()> {
        let MemoryTx { mut guard, work } = self;
        *guard = work;
        Ok(())
    }
}
