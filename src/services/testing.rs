//! 서비스 테스트용 fixture (MemoryStore)

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::config::DEFAULT_DAILY_TASK_LIMIT;
use crate::db::memory::MemoryStore;
use crate::db::{Account, LedgerStore, LedgerTx, NewAccount, Product};
use crate::types::{BalanceField, Role};

pub fn d(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// 계정 + 지갑 + 커미션 설정 + 진행 상태 생성
pub async fn seed_account(
    store: &Arc<MemoryStore>,
    username: &str,
    role: Role,
    referred_by: Option<i64>,
) -> Account {
    let mut tx = store.begin().await.unwrap();
    let account = tx
        .insert_account(&NewAccount {
            username: username.to_string(),
            phone: None,
            role,
            referral_code: None,
            referred_by,
        })
        .await
        .unwrap();
    tx.lock_wallet(account.id).await.unwrap();
    tx.commission_setting(account.id, DEFAULT_DAILY_TASK_LIMIT).await.unwrap();
    tx.lock_progress(account.id).await.unwrap();
    tx.commit().await.unwrap();
    account
}

pub async fn seed_product(store: &Arc<MemoryStore>, name: &str, price: &str) -> Product {
    let mut tx = store.begin().await.unwrap();
    let product = tx.insert_product(name, d(price)).await.unwrap();
    tx.commit().await.unwrap();
    product
}

/// 커미션 비율 / 일일 한도 직접 설정
pub async fn set_rates(
    store: &Arc<MemoryStore>,
    user_id: i64,
    product_rate: &str,
    referral_rate: &str,
    daily_task_limit: i32,
) {
    let mut tx = store.begin().await.unwrap();
    let mut setting = tx
        .commission_setting(user_id, DEFAULT_DAILY_TASK_LIMIT)
        .await
        .unwrap();
    setting.product_rate = d(product_rate);
    setting.referral_rate = d(referral_rate);
    setting.daily_task_limit = daily_task_limit;
    tx.save_commission_setting(&setting).await.unwrap();
    tx.commit().await.unwrap();
}

pub async fn fund(store: &Arc<MemoryStore>, user_id: i64, amount: &str) {
    let mut tx = store.begin().await.unwrap();
    let mut wallet = tx.lock_wallet(user_id).await.unwrap();
    wallet.credit(BalanceField::CurrentBalance, d(amount)).unwrap();
    tx.save_wallet(&wallet).await.unwrap();
    tx.commit().await.unwrap();
}

/// 익명화(삭제 1단계) 상태로 전환
pub async fn deactivate(store: &Arc<MemoryStore>, user_id: i64) {
    let mut tx = store.begin().await.unwrap();
    let mut account = tx.account(user_id).await.unwrap().unwrap();
    account.username = format!("deleted_{}", user_id);
    account.is_active = false;
    tx.save_account(&account).await.unwrap();
    tx.commit().await.unwrap();
}
