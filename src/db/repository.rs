//! Repository Pattern Implementation
//!
//! 서비스 레이어는 `LedgerStore`에서 트랜잭션(`LedgerTx`)을 열고
//! 그 안에서만 읽기/쓰기를 수행함
//!
//! ```text
//! let mut tx = store.begin().await?;
//! let mut wallet = tx.lock_wallet(user_id).await?;   // SELECT ... FOR UPDATE
//! ...
//! tx.save_wallet(&wallet).await?;
//! tx.commit().await?;                                // drop 시 롤백
//! ```
//!
//! - PostgreSQL 구현: `db::Database` (row lock)
//! - 테스트 구현: `db::memory::MemoryStore` (트랜잭션 단위 직렬화)
//!
//! `lock_*` 메서드는 반환한 행을 트랜잭션 종료까지 잠금

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::models::*;
use crate::error::LedgerError;
use crate::types::{Network, ReviewStatus};

pub type StoreResult<T> = Result<T, LedgerError>;

/// 트랜잭션 팩토리
#[async_trait]
pub trait LedgerStore: Send + Sync + 'static {
    type Tx: LedgerTx;

    /// 트랜잭션 시작
    async fn begin(&self) -> StoreResult<Self::Tx>;

    /// 저장소 연결 확인
    async fn health_check(&self) -> StoreResult<()>;
}

/// 하나의 all-or-nothing 작업 단위
#[async_trait]
pub trait LedgerTx: Send {
    // ============ Accounts ============

    async fn account(&mut self, id: i64) -> StoreResult<Option<Account>>;

    /// 추천 코드 소유 계정 잠금 (가입 시 단일 사용 확인 직렬화)
    async fn lock_account_by_referral_code(&mut self, code: &str) -> StoreResult<Option<Account>>;

    async fn username_taken(&mut self, username: &str) -> StoreResult<bool>;

    async fn phone_taken(&mut self, phone: &str) -> StoreResult<bool>;

    async fn referral_code_taken(&mut self, code: &str) -> StoreResult<bool>;

    /// 이 계정을 추천인으로 가진 계정 수
    async fn count_referrals(&mut self, referrer_id: i64) -> StoreResult<i64>;

    async fn insert_account(&mut self, account: &NewAccount) -> StoreResult<Account>;

    /// username / phone / referral_code / referred_by / is_active 갱신
    async fn save_account(&mut self, account: &Account) -> StoreResult<()>;

    /// 계정 삭제. 소유 행은 함께 삭제, 다른 계정의 referred_by는 NULL
    async fn delete_account(&mut self, id: i64) -> StoreResult<()>;

    // ============ Wallets ============

    /// 지갑 보장 (upsert) 후 잠금
    async fn lock_wallet(&mut self, user_id: i64) -> StoreResult<Wallet>;

    async fn save_wallet(&mut self, wallet: &Wallet) -> StoreResult<()>;

    // ============ Commission ============

    /// 커미션 설정 보장 (upsert)
    async fn commission_setting(
        &mut self,
        user_id: i64,
        default_daily_limit: i32,
    ) -> StoreResult<CommissionSetting>;

    async fn save_commission_setting(&mut self, setting: &CommissionSetting) -> StoreResult<()>;

    /// (referrer, product, triggered_by) 추천 커미션 행 조회
    async fn find_referral_commission(
        &mut self,
        referrer_id: i64,
        product_id: i64,
        triggered_by: i64,
    ) -> StoreResult<Option<Commission>>;

    async fn insert_commission(&mut self, commission: &NewCommission) -> StoreResult<Commission>;

    /// 최신순 커미션 행 (since 이후만)
    async fn commissions(
        &mut self,
        user_id: i64,
        since: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<Commission>>;

    // ============ Catalog ============

    async fn product(&mut self, id: i64) -> StoreResult<Option<Product>>;

    /// 아직 배정되지 않은 첫 활성 상품 (id 순)
    async fn first_unassigned_product(&mut self, user_id: i64) -> StoreResult<Option<Product>>;

    async fn insert_product(&mut self, name: &str, price: Decimal) -> StoreResult<Product>;

    async fn save_product(&mut self, product: &Product) -> StoreResult<()>;

    // ============ Tasks ============

    /// 사용자 작업 전체 (id 순)
    async fn tasks(&mut self, user_id: i64) -> StoreResult<Vec<UserProductTask>>;

    /// (user, product)의 미완료 작업 잠금
    async fn lock_open_task(
        &mut self,
        user_id: i64,
        product_id: i64,
    ) -> StoreResult<Option<UserProductTask>>;

    async fn insert_task(
        &mut self,
        user_id: i64,
        product_id: i64,
        task_number: i32,
    ) -> StoreResult<UserProductTask>;

    async fn save_task(&mut self, task: &UserProductTask) -> StoreResult<()>;

    // ============ Stop Points ============

    /// point 순
    async fn stop_points(&mut self, user_id: i64) -> StoreResult<Vec<StopPoint>>;

    async fn lock_stop_point(&mut self, id: i64) -> StoreResult<Option<StopPoint>>;

    async fn insert_stop_point(
        &mut self,
        user_id: i64,
        point: i32,
        required_balance: Decimal,
        order: i32,
    ) -> StoreResult<StopPoint>;

    async fn save_stop_point(&mut self, stop_point: &StopPoint) -> StoreResult<()>;

    async fn delete_stop_points(&mut self, user_id: i64) -> StoreResult<u64>;

    /// 진행 상태 보장 (upsert) 후 잠금
    async fn lock_progress(&mut self, user_id: i64) -> StoreResult<StopPointProgress>;

    async fn save_progress(&mut self, progress: &StopPointProgress) -> StoreResult<()>;

    // ============ Recharge ============

    async fn insert_recharge(&mut self, user_id: i64, amount: Decimal) -> StoreResult<RechargeRequest>;

    async fn lock_recharge(&mut self, id: i64) -> StoreResult<Option<RechargeRequest>>;

    async fn save_recharge(&mut self, recharge: &RechargeRequest) -> StoreResult<()>;

    /// 대기 중 충전 요청 금액을 0으로
    async fn zero_pending_recharges(&mut self, user_id: i64) -> StoreResult<u64>;

    async fn upsert_voucher(&mut self, recharge_id: i64, reference: &str) -> StoreResult<Voucher>;

    async fn delete_voucher(&mut self, recharge_id: i64) -> StoreResult<bool>;

    async fn insert_recharge_history(
        &mut self,
        recharge: &RechargeRequest,
        status: ReviewStatus,
    ) -> StoreResult<RechargeHistory>;

    /// 최신순
    async fn recharge_history(&mut self, user_id: i64) -> StoreResult<Vec<RechargeHistory>>;

    // ============ Withdrawals ============

    async fn payout_address(&mut self, user_id: i64) -> StoreResult<Option<PayoutAddress>>;

    async fn payout_address_in_use(&mut self, address: &str) -> StoreResult<bool>;

    async fn insert_payout_address(
        &mut self,
        user_id: i64,
        address: &str,
        network: Network,
    ) -> StoreResult<PayoutAddress>;

    async fn insert_withdrawal(
        &mut self,
        user_id: i64,
        amount: Decimal,
        network: Network,
    ) -> StoreResult<Withdrawal>;

    async fn lock_withdrawal(&mut self, id: i64) -> StoreResult<Option<Withdrawal>>;

    async fn save_withdrawal(&mut self, withdrawal: &Withdrawal) -> StoreResult<()>;

    /// 최신순
    async fn withdrawals(&mut self, user_id: i64) -> StoreResult<Vec<Withdrawal>>;

    // ============ Lifecycle ============

    async fn commit(self) -> StoreResult<()>;
}
