//! PostgreSQL `LedgerTx` implementation
//!
//! enum 컬럼은 TEXT로 저장하고 `as_str()`로 바인딩, `try_from`으로 읽음

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};

use super::models::*;
use super::repository::{LedgerTx, StoreResult};
use crate::types::{CommissionType, Network, ReviewStatus};

const ACCOUNT_COLUMNS: &str =
    "id, username, phone, role, referral_code, referred_by, is_active, created_at";
const WALLET_COLUMNS: &str =
    "user_id, current_balance, product_commission, referral_commission, cumulative_total, updated_at";
const COMMISSION_COLUMNS: &str =
    "id, user_id, product_id, product_name, amount, commission_type, triggered_by, created_at";
const PRODUCT_COLUMNS: &str = "id, name, price, is_active, created_at";
const TASK_COLUMNS: &str =
    "id, user_id, product_id, task_number, is_completed, created_at, completed_at";
const STOP_POINT_COLUMNS: &str = "id, user_id, point, required_balance, status, sort_order";
const RECHARGE_COLUMNS: &str = "id, user_id, amount, status, created_at, processed_at";
const WITHDRAWAL_COLUMNS: &str = "id, user_id, amount, network, status, created_at, processed_at";

/// 하나의 PostgreSQL 트랜잭션
///
/// commit 없이 drop되면 SQLx가 롤백
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl PgTx {
    pub(crate) fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl LedgerTx for PgTx {
    // ============ Accounts ============

    async fn account(&mut self, id: i64) -> StoreResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(account)
    }

    async fn lock_account_by_referral_code(&mut self, code: &str) -> StoreResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE referral_code = $1 FOR UPDATE"
        ))
        .bind(code)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(account)
    }

    async fn username_taken(&mut self, username: &str) -> StoreResult<bool> {
        let row: (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM accounts WHERE username = $1)")
                .bind(username)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(row.0)
    }

    async fn phone_taken(&mut self, phone: &str) -> StoreResult<bool> {
        let row: (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM accounts WHERE phone = $1)")
            .bind(phone)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row.0)
    }

    async fn referral_code_taken(&mut self, code: &str) -> StoreResult<bool> {
        let row: (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM accounts WHERE referral_code = $1)")
                .bind(code)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(row.0)
    }

    async fn count_referrals(&mut self, referrer_id: i64) -> StoreResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts WHERE referred_by = $1")
            .bind(referrer_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row.0)
    }

    async fn insert_account(&mut self, account: &NewAccount) -> StoreResult<Account> {
        let created = sqlx::query_as::<_, Account>(&format!(
            r#"
            INSERT INTO accounts (username, phone, role, referral_code, referred_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(&account.username)
        .bind(&account.phone)
        .bind(account.role.as_str())
        .bind(&account.referral_code)
        .bind(account.referred_by)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(created)
    }

    async fn save_account(&mut self, account: &Account) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET username = $2, phone = $3, referral_code = $4, referred_by = $5, is_active = $6
            WHERE id = $1
            "#,
        )
        .bind(account.id)
        .bind(&account.username)
        .bind(&account.phone)
        .bind(&account.referral_code)
        .bind(account.referred_by)
        .bind(account.is_active)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_account(&mut self, id: i64) -> StoreResult<()> {
        // FK: 소유 행 CASCADE, referred_by / triggered_by SET NULL
        sqlx::query("DELETE FROM accounts WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    // ============ Wallets ============

    async fn lock_wallet(&mut self, user_id: i64) -> StoreResult<Wallet> {
        sqlx::query("INSERT INTO wallets (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;

        let wallet = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1 FOR UPDATE"
        ))
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(wallet)
    }

    async fn save_wallet(&mut self, wallet: &Wallet) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE wallets
            SET current_balance = $2,
                product_commission = $3,
                referral_commission = $4,
                cumulative_total = $5,
                updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(wallet.user_id)
        .bind(wallet.current_balance)
        .bind(wallet.product_commission)
        .bind(wallet.referral_commission)
        .bind(wallet.cumulative_total)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    // ============ Commission ============

    async fn commission_setting(
        &mut self,
        user_id: i64,
        default_daily_limit: i32,
    ) -> StoreResult<CommissionSetting> {
        sqlx::query(
            r#"
            INSERT INTO commission_settings (user_id, daily_task_limit)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(default_daily_limit)
        .execute(&mut *self.tx)
        .await?;

        let setting = sqlx::query_as::<_, CommissionSetting>(
            r#"
            SELECT user_id, product_rate, referral_rate, daily_task_limit, updated_at
            FROM commission_settings
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(setting)
    }

    async fn save_commission_setting(&mut self, setting: &CommissionSetting) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE commission_settings
            SET product_rate = $2, referral_rate = $3, daily_task_limit = $4, updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(setting.user_id)
        .bind(setting.product_rate)
        .bind(setting.referral_rate)
        .bind(setting.daily_task_limit)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_referral_commission(
        &mut self,
        referrer_id: i64,
        product_id: i64,
        triggered_by: i64,
    ) -> StoreResult<Option<Commission>> {
        let commission = sqlx::query_as::<_, Commission>(&format!(
            r#"
            SELECT {COMMISSION_COLUMNS}
            FROM commissions
            WHERE user_id = $1 AND product_id = $2 AND triggered_by = $3
              AND commission_type = $4
            "#
        ))
        .bind(referrer_id)
        .bind(product_id)
        .bind(triggered_by)
        .bind(CommissionType::Referral.as_str())
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(commission)
    }

    async fn insert_commission(&mut self, commission: &NewCommission) -> StoreResult<Commission> {
        let created = sqlx::query_as::<_, Commission>(&format!(
            r#"
            INSERT INTO commissions (user_id, product_id, product_name, amount, commission_type, triggered_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {COMMISSION_COLUMNS}
            "#
        ))
        .bind(commission.user_id)
        .bind(commission.product_id)
        .bind(&commission.product_name)
        .bind(commission.amount)
        .bind(commission.commission_type.as_str())
        .bind(commission.triggered_by)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(created)
    }

    async fn commissions(
        &mut self,
        user_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<Commission>> {
        let rows = sqlx::query_as::<_, Commission>(&format!(
            r#"
            SELECT {COMMISSION_COLUMNS}
            FROM commissions
            WHERE user_id = $1 AND ($2::timestamptz IS NULL OR created_at >= $2)
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(user_id)
        .bind(since)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows)
    }

    // ============ Catalog ============

    async fn product(&mut self, id: i64) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(product)
    }

    async fn first_unassigned_product(&mut self, user_id: i64) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            r#"
            SELECT {PRODUCT_COLUMNS}
            FROM products p
            WHERE p.is_active
              AND NOT EXISTS (
                  SELECT 1 FROM user_product_tasks t
                  WHERE t.user_id = $1 AND t.product_id = p.id
              )
            ORDER BY p.id
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(product)
    }

    async fn insert_product(&mut self, name: &str, price: Decimal) -> StoreResult<Product> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products (name, price) VALUES ($1, $2) RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(name)
        .bind(price)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(product)
    }

    async fn save_product(&mut self, product: &Product) -> StoreResult<()> {
        sqlx::query("UPDATE products SET name = $2, price = $3, is_active = $4 WHERE id = $1")
            .bind(product.id)
            .bind(&product.name)
            .bind(product.price)
            .bind(product.is_active)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    // ============ Tasks ============

    async fn tasks(&mut self, user_id: i64) -> StoreResult<Vec<UserProductTask>> {
        let rows = sqlx::query_as::<_, UserProductTask>(&format!(
            "SELECT {TASK_COLUMNS} FROM user_product_tasks WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows)
    }

    async fn lock_open_task(
        &mut self,
        user_id: i64,
        product_id: i64,
    ) -> StoreResult<Option<UserProductTask>> {
        let task = sqlx::query_as::<_, UserProductTask>(&format!(
            r#"
            SELECT {TASK_COLUMNS}
            FROM user_product_tasks
            WHERE user_id = $1 AND product_id = $2 AND NOT is_completed
            ORDER BY id
            LIMIT 1
            FOR UPDATE
            "#
        ))
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(task)
    }

    async fn insert_task(
        &mut self,
        user_id: i64,
        product_id: i64,
        task_number: i32,
    ) -> StoreResult<UserProductTask> {
        let task = sqlx::query_as::<_, UserProductTask>(&format!(
            r#"
            INSERT INTO user_product_tasks (user_id, product_id, task_number)
            VALUES ($1, $2, $3)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(product_id)
        .bind(task_number)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(task)
    }

    async fn save_task(&mut self, task: &UserProductTask) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE user_product_tasks
            SET task_number = $2, is_completed = $3, completed_at = $4
            WHERE id = $1
            "#,
        )
        .bind(task.id)
        .bind(task.task_number)
        .bind(task.is_completed)
        .bind(task.completed_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    // ============ Stop Points ============

    async fn stop_points(&mut self, user_id: i64) -> StoreResult<Vec<StopPoint>> {
        let rows = sqlx::query_as::<_, StopPoint>(&format!(
            "SELECT {STOP_POINT_COLUMNS} FROM stop_points WHERE user_id = $1 ORDER BY point"
        ))
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows)
    }

    async fn lock_stop_point(&mut self, id: i64) -> StoreResult<Option<StopPoint>> {
        let stop_point = sqlx::query_as::<_, StopPoint>(&format!(
            "SELECT {STOP_POINT_COLUMNS} FROM stop_points WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(stop_point)
    }

    async fn insert_stop_point(
        &mut self,
        user_id: i64,
        point: i32,
        required_balance: Decimal,
        order: i32,
    ) -> StoreResult<StopPoint> {
        let stop_point = sqlx::query_as::<_, StopPoint>(&format!(
            r#"
            INSERT INTO stop_points (user_id, point, required_balance, status, sort_order)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {STOP_POINT_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(point)
        .bind(required_balance)
        .bind(ReviewStatus::Pending.as_str())
        .bind(order)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(stop_point)
    }

    async fn save_stop_point(&mut self, stop_point: &StopPoint) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE stop_points
            SET point = $2, required_balance = $3, status = $4, sort_order = $5
            WHERE id = $1
            "#,
        )
        .bind(stop_point.id)
        .bind(stop_point.point)
        .bind(stop_point.required_balance)
        .bind(stop_point.status.as_str())
        .bind(stop_point.order)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn delete_stop_points(&mut self, user_id: i64) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM stop_points WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn lock_progress(&mut self, user_id: i64) -> StoreResult<StopPointProgress> {
        sqlx::query(
            "INSERT INTO stop_point_progress (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user_id)
        .execute(&mut *self.tx)
        .await?;

        let progress = sqlx::query_as::<_, StopPointProgress>(
            r#"
            SELECT user_id, last_cleared, is_stopped
            FROM stop_point_progress
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(progress)
    }

    async fn save_progress(&mut self, progress: &StopPointProgress) -> StoreResult<()> {
        sqlx::query(
            "UPDATE stop_point_progress SET last_cleared = $2, is_stopped = $3 WHERE user_id = $1",
        )
        .bind(progress.user_id)
        .bind(progress.last_cleared)
        .bind(progress.is_stopped)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    // ============ Recharge ============

    async fn insert_recharge(&mut self, user_id: i64, amount: Decimal) -> StoreResult<RechargeRequest> {
        let recharge = sqlx::query_as::<_, RechargeRequest>(&format!(
            r#"
            INSERT INTO recharge_requests (user_id, amount, status)
            VALUES ($1, $2, $3)
            RETURNING {RECHARGE_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(amount)
        .bind(ReviewStatus::Pending.as_str())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(recharge)
    }

    async fn lock_recharge(&mut self, id: i64) -> StoreResult<Option<RechargeRequest>> {
        let recharge = sqlx::query_as::<_, RechargeRequest>(&format!(
            "SELECT {RECHARGE_COLUMNS} FROM recharge_requests WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(recharge)
    }

    async fn save_recharge(&mut self, recharge: &RechargeRequest) -> StoreResult<()> {
        sqlx::query(
            "UPDATE recharge_requests SET amount = $2, status = $3, processed_at = $4 WHERE id = $1",
        )
        .bind(recharge.id)
        .bind(recharge.amount)
        .bind(recharge.status.as_str())
        .bind(recharge.processed_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn zero_pending_recharges(&mut self, user_id: i64) -> StoreResult<u64> {
        let result = sqlx::query(
            "UPDATE recharge_requests SET amount = 0 WHERE user_id = $1 AND status = $2",
        )
        .bind(user_id)
        .bind(ReviewStatus::Pending.as_str())
        .execute(&mut *self.tx)
        .await?;

        Ok(result.rows_affected())
    }

    async fn upsert_voucher(&mut self, recharge_id: i64, reference: &str) -> StoreResult<Voucher> {
        let voucher = sqlx::query_as::<_, Voucher>(
            r#"
            INSERT INTO vouchers (recharge_request_id, reference)
            VALUES ($1, $2)
            ON CONFLICT (recharge_request_id)
            DO UPDATE SET reference = EXCLUDED.reference, uploaded_at = NOW()
            RETURNING id, recharge_request_id, reference, uploaded_at
            "#,
        )
        .bind(recharge_id)
        .bind(reference)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(voucher)
    }

    async fn delete_voucher(&mut self, recharge_id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM vouchers WHERE recharge_request_id = $1")
            .bind(recharge_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_recharge_history(
        &mut self,
        recharge: &RechargeRequest,
        status: ReviewStatus,
    ) -> StoreResult<RechargeHistory> {
        let history = sqlx::query_as::<_, RechargeHistory>(
            r#"
            INSERT INTO recharge_history (user_id, recharge_request_id, amount, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id, user_id, recharge_request_id, amount, status, action_date
            "#,
        )
        .bind(recharge.user_id)
        .bind(recharge.id)
        .bind(recharge.amount)
        .bind(status.as_str())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(history)
    }

    async fn recharge_history(&mut self, user_id: i64) -> StoreResult<Vec<RechargeHistory>> {
        let rows = sqlx::query_as::<_, RechargeHistory>(
            r#"
            SELECT id, user_id, recharge_request_id, amount, status, action_date
            FROM recharge_history
            WHERE user_id = $1
            ORDER BY action_date DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows)
    }

    // ============ Withdrawals ============

    async fn payout_address(&mut self, user_id: i64) -> StoreResult<Option<PayoutAddress>> {
        let address = sqlx::query_as::<_, PayoutAddress>(
            "SELECT user_id, address, network, created_at FROM payout_addresses WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(address)
    }

    async fn payout_address_in_use(&mut self, address: &str) -> StoreResult<bool> {
        let row: (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM payout_addresses WHERE address = $1)")
                .bind(address)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(row.0)
    }

    async fn insert_payout_address(
        &mut self,
        user_id: i64,
        address: &str,
        network: Network,
    ) -> StoreResult<PayoutAddress> {
        let created = sqlx::query_as::<_, PayoutAddress>(
            r#"
            INSERT INTO payout_addresses (user_id, address, network)
            VALUES ($1, $2, $3)
            RETURNING user_id, address, network, created_at
            "#,
        )
        .bind(user_id)
        .bind(address)
        .bind(network.as_str())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(created)
    }

    async fn insert_withdrawal(
        &mut self,
        user_id: i64,
        amount: Decimal,
        network: Network,
    ) -> StoreResult<Withdrawal> {
        let withdrawal = sqlx::query_as::<_, Withdrawal>(&format!(
            r#"
            INSERT INTO withdrawals (user_id, amount, network, status)
            VALUES ($1, $2, $3, $4)
            RETURNING {WITHDRAWAL_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(amount)
        .bind(network.as_str())
        .bind(ReviewStatus::Pending.as_str())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(withdrawal)
    }

    async fn lock_withdrawal(&mut self, id: i64) -> StoreResult<Option<Withdrawal>> {
        let withdrawal = sqlx::query_as::<_, Withdrawal>(&format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(withdrawal)
    }

    async fn save_withdrawal(&mut self, withdrawal: &Withdrawal) -> StoreResult<()> {
        sqlx::query("UPDATE withdrawals SET status = $2, processed_at = $3 WHERE id = $1")
            .bind(withdrawal.id)
            .bind(withdrawal.status.as_str())
            .bind(withdrawal.processed_at)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn withdrawals(&mut self, user_id: i64) -> StoreResult<Vec<Withdrawal>> {
        let rows = sqlx::query_as::<_, Withdrawal>(&format!(
            "SELECT {WITHDRAWAL_COLUMNS} FROM withdrawals WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(rows)
    }

    // ============ Lifecycle ============

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
