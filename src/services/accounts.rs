//! Account Directory
//!
//! 계정 생성(가입 / 운영 계정), 추천 관계, 2단계 삭제
//!
//! # Registration rules
//!
//! - username 6 ~ 15자, phone `+`와 숫자만 (최대 15자리)
//! - 추천 코드 필수 (정확히 6자), 소유자는 admin 또는 user
//! - admin 코드는 무제한, user 코드는 1회만 사용 가능
//! - 본인 추천 코드는 대문자 6자 랜덤 생성
//!
//! 계정 생성 트랜잭션에서 Wallet / CommissionSetting / StopPointProgress 함께 생성
//!
//! # Deletion
//!
//! ```text
//! anonymize  → username/phone 치환, referral_code 제거, referred_by 해제, 비활성화
//! remove     → 행 삭제 (anonymize 이후만). 피추천인의 referred_by는 NULL, 커미션 이력 유지
//! ```

use std::sync::Arc;

use rand::Rng;
use serde::Deserialize;

use crate::config::LedgerPolicy;
use crate::db::{Account, LedgerStore, LedgerTx, NewAccount};
use crate::error::LedgerError;
use crate::services::authz::{require, require_self_or_staff, Capability};
use crate::types::Role;

/// 추천 코드 길이
pub const REFERRAL_CODE_LEN: usize = 6;

/// 익명화된 계정 username 접두사
const DELETED_PREFIX: &str = "deleted_";

/// 추천 코드 생성 재시도 횟수
const CODE_ATTEMPTS: usize = 16;

/// 트랜잭션 안에서 계정 조회 (없으면 NotFound)
pub async fn load_account<T: LedgerTx>(tx: &mut T, account_id: i64) -> Result<Account, LedgerError> {
    tx.account(account_id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Account {}", account_id)))
}

/// 일반 사용자 가입 입력
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub username: String,
    pub phone: String,
    pub referral_code: String,
}

fn validate_username(username: &str) -> Result<(), LedgerError> {
    let len = username.chars().count();
    if !(6..=15).contains(&len) {
        return Err(LedgerError::validation("Username must be between 6 and 15 characters."));
    }
    Ok(())
}

fn validate_phone(phone: &str) -> Result<(), LedgerError> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    if digits.is_empty() || digits.len() > 15 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LedgerError::validation(
            "Phone number must be numeric and may start with + (max 15 digits).",
        ));
    }
    Ok(())
}

fn random_referral_code() -> String {
    let mut rng = rand::thread_rng();
    (0..REFERRAL_CODE_LEN)
        .map(|_| rng.gen_range(b'A'..=b'Z') as char)
        .collect()
}

fn anonymized_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// 사용 중이지 않은 추천 코드 생성
async fn unique_referral_code<T: LedgerTx>(tx: &mut T) -> Result<String, LedgerError> {
    for _ in 0..CODE_ATTEMPTS {
        let code = random_referral_code();
        if !tx.referral_code_taken(&code).await? {
            return Ok(code);
        }
    }
    Err(LedgerError::conflict("Could not allocate a unique referral code"))
}

/// 계정 + 지갑 + 커미션 설정 + StopPoint 진행 상태 생성
async fn create_in<T: LedgerTx>(
    tx: &mut T,
    account: &NewAccount,
    policy: &LedgerPolicy,
) -> Result<Account, LedgerError> {
    let created = tx.insert_account(account).await?;
    tx.lock_wallet(created.id).await?;
    tx.commission_setting(created.id, policy.default_daily_task_limit).await?;
    tx.lock_progress(created.id).await?;
    Ok(created)
}

pub struct AccountDirectory<S: LedgerStore> {
    store: Arc<S>,
    policy: LedgerPolicy,
}

impl<S: LedgerStore> AccountDirectory<S> {
    pub fn new(store: Arc<S>, policy: LedgerPolicy) -> Self {
        Self { store, policy }
    }

    /// 요청 주체 확인 (활성 계정만)
    pub async fn active_account(&self, account_id: i64) -> Result<Account, LedgerError> {
        let mut tx = self.store.begin().await?;
        let account = load_account(&mut tx, account_id).await?;
        tx.commit().await?;

        if !account.is_active {
            return Err(LedgerError::Forbidden(format!("Account {} is deactivated", account_id)));
        }
        Ok(account)
    }

    pub async fn account(&self, actor: &Account, account_id: i64) -> Result<Account, LedgerError> {
        require_self_or_staff(actor, account_id)?;

        let mut tx = self.store.begin().await?;
        let account = load_account(&mut tx, account_id).await?;
        tx.commit().await?;
        Ok(account)
    }

    /// 일반 사용자 가입
    pub async fn register_user(&self, registration: Registration) -> Result<Account, LedgerError> {
        let username = registration.username.trim().to_string();
        let phone = registration.phone.trim().to_string();
        let code = registration.referral_code.trim().to_string();

        validate_phone(&phone)?;
        validate_username(&username)?;
        if code.chars().count() != REFERRAL_CODE_LEN {
            return Err(LedgerError::validation("Referral code must be exactly 6 characters."));
        }

        let mut tx = self.store.begin().await?;

        let referrer = tx
            .lock_account_by_referral_code(&code)
            .await?
            .filter(|a| a.is_active && matches!(a.role, Role::Admin | Role::User))
            .ok_or_else(|| LedgerError::validation("Invalid referral code."))?;
        if referrer.role == Role::User && tx.count_referrals(referrer.id).await? > 0 {
            return Err(LedgerError::conflict("This user's referral code has already been used."));
        }

        if tx.username_taken(&username).await? {
            return Err(LedgerError::conflict("Username already exists."));
        }
        if tx.phone_taken(&phone).await? {
            return Err(LedgerError::conflict("Phone number already exists."));
        }

        let own_code = unique_referral_code(&mut tx).await?;
        let account = create_in(
            &mut tx,
            &NewAccount {
                username,
                phone: Some(phone),
                role: Role::User,
                referral_code: Some(own_code),
                referred_by: Some(referrer.id),
            },
            &self.policy,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(account_id = account.id, referrer = referrer.id, "User registered");
        Ok(account)
    }

    /// 운영 계정 생성 (admin은 추천 코드 발급)
    pub async fn create_staff(
        &self,
        actor: &Account,
        username: &str,
        role: Role,
    ) -> Result<Account, LedgerError> {
        require(actor, Capability::ManageStaff)?;
        if !matches!(role, Role::Admin | Role::CustomerService) {
            return Err(LedgerError::validation("Invalid role selected."));
        }

        let username = username.trim();
        validate_username(username)?;

        let mut tx = self.store.begin().await?;
        if tx.username_taken(username).await? {
            return Err(LedgerError::conflict("Username already exists."));
        }
        let referral_code = match role {
            Role::Admin => Some(unique_referral_code(&mut tx).await?),
            _ => None,
        };

        let account = create_in(
            &mut tx,
            &NewAccount {
                username: username.to_string(),
                phone: None,
                role,
                referral_code,
                referred_by: None,
            },
            &self.policy,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(account_id = account.id, %role, by = actor.id, "Staff account created");
        Ok(account)
    }

    /// 시작 시 superadmin 보장. 이미 있는 username이면 None
    pub async fn bootstrap_superadmin(&self, username: &str) -> Result<Option<Account>, LedgerError> {
        let mut tx = self.store.begin().await?;
        if tx.username_taken(username).await? {
            return Ok(None);
        }

        let account = create_in(
            &mut tx,
            &NewAccount {
                username: username.to_string(),
                phone: None,
                role: Role::SuperAdmin,
                referral_code: None,
                referred_by: None,
            },
            &self.policy,
        )
        .await?;
        tx.commit().await?;

        tracing::info!(account_id = account.id, "Superadmin bootstrapped");
        Ok(Some(account))
    }

    /// 삭제 1단계: 익명화 + 비활성화
    pub async fn anonymize_account(&self, actor: &Account, account_id: i64) -> Result<Account, LedgerError> {
        let mut tx = self.store.begin().await?;
        let mut account = self.deletable(&mut tx, actor, account_id).await?;

        let suffix = anonymized_suffix();
        account.username = format!("{}{}", DELETED_PREFIX, suffix);
        account.phone = account.phone.as_ref().map(|_| format!("{}{}", DELETED_PREFIX, suffix));
        account.referral_code = None;
        account.referred_by = None;
        account.is_active = false;

        tx.save_account(&account).await?;
        tx.commit().await?;

        tracing::info!(account_id, by = actor.id, "Account anonymized");
        Ok(account)
    }

    /// 삭제 2단계: 행 삭제 (익명화된 계정만)
    pub async fn remove_account(&self, actor: &Account, account_id: i64) -> Result<(), LedgerError> {
        let mut tx = self.store.begin().await?;
        let account = self.deletable(&mut tx, actor, account_id).await?;
        if account.is_active || !account.username.starts_with(DELETED_PREFIX) {
            return Err(LedgerError::conflict("Account must be anonymized before removal"));
        }

        tx.delete_account(account_id).await?;
        tx.commit().await?;

        tracing::info!(account_id, by = actor.id, "Account removed");
        Ok(())
    }

    async fn deletable(
        &self,
        tx: &mut S::Tx,
        actor: &Account,
        account_id: i64,
    ) -> Result<Account, LedgerError> {
        if actor.id == account_id {
            return Err(LedgerError::Forbidden("Accounts cannot delete themselves".to_string()));
        }
        let account = load_account(tx, account_id).await?;
        require(actor, Capability::DeleteAccount(account.role))?;
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryStore;
    use crate::services::testing::seed_account;

    fn registration(username: &str, phone: &str, code: &str) -> Registration {
        Registration {
            username: username.to_string(),
            phone: phone.to_string(),
            referral_code: code.to_string(),
        }
    }

    async fn setup() -> (Arc<MemoryStore>, AccountDirectory<MemoryStore>, Account) {
        let store = Arc::new(MemoryStore::new());
        let directory = AccountDirectory::new(store.clone(), LedgerPolicy::default());
        let root = directory.bootstrap_superadmin("rootadmin").await.unwrap().unwrap();
        (store, directory, root)
    }

    #[test]
    fn test_field_validation() {
        assert!(validate_phone("+821012345678").is_ok());
        assert!(validate_phone("0101234").is_ok());
        assert!(validate_phone("+").is_err());
        assert!(validate_phone("010-1234").is_err());
        assert!(validate_phone("1234567890123456").is_err());

        assert!(validate_username("short").is_err());
        assert!(validate_username("exactly6").is_ok());
        assert!(validate_username("sixteen_chars_xx").is_err());

        let code = random_referral_code();
        assert_eq!(code.len(), REFERRAL_CODE_LEN);
        assert!(code.bytes().all(|b| b.is_ascii_uppercase()));
    }

    #[tokio::test]
    async fn test_register_with_admin_code() {
        let (store, directory, root) = setup().await;
        let admin = directory.create_staff(&root, "adminone", Role::Admin).await.unwrap();
        let code = admin.referral_code.clone().unwrap();

        let first = directory
            .register_user(registration("alice01", "+100200300", &code))
            .await
            .unwrap();
        // admin 코드는 여러 번 사용 가능
        let second = directory
            .register_user(registration("bobby02", "+100200301", &code))
            .await
            .unwrap();

        assert_eq!(first.referred_by, Some(admin.id));
        assert_eq!(second.referred_by, Some(admin.id));
        assert_eq!(first.role, Role::User);
        assert_eq!(first.referral_code.as_ref().map(|c| c.len()), Some(6));

        // 생성 트랜잭션에서 부속 행 생성
        let state = store.snapshot().await;
        assert!(state.wallets.contains_key(&first.id));
        assert_eq!(state.settings[&first.id].daily_task_limit, 60);
        assert!(state.progress.contains_key(&first.id));
    }

    #[tokio::test]
    async fn test_user_code_single_use() {
        let (_store, directory, root) = setup().await;
        let admin = directory.create_staff(&root, "adminone", Role::Admin).await.unwrap();
        let referrer = directory
            .register_user(registration("alice01", "+100200300", admin.referral_code.as_deref().unwrap()))
            .await
            .unwrap();
        let code = referrer.referral_code.clone().unwrap();

        let referred = directory
            .register_user(registration("bobby02", "+100200301", &code))
            .await
            .unwrap();
        assert_eq!(referred.referred_by, Some(referrer.id));

        let result = directory
            .register_user(registration("carol03", "+100200302", &code))
            .await;
        assert!(matches!(result, Err(LedgerError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_concurrent_registrations_share_one_user_code() {
        let (store, directory, root) = setup().await;
        let admin = directory.create_staff(&root, "adminone", Role::Admin).await.unwrap();
        let referrer = directory
            .register_user(registration("alice01", "+100200300", admin.referral_code.as_deref().unwrap()))
            .await
            .unwrap();
        let code = referrer.referral_code.clone().unwrap();

        let (first, second) = tokio::join!(
            directory.register_user(registration("bobby02", "+100200301", &code)),
            directory.register_user(registration("carol03", "+100200302", &code)),
        );

        assert_eq!([&first, &second].iter().filter(|r| r.is_ok()).count(), 1);
        assert!([first, second]
            .into_iter()
            .any(|r| matches!(r, Err(LedgerError::Conflict(_)))));
        let state = store.snapshot().await;
        let referred = state
            .accounts
            .iter()
            .filter(|a| a.referred_by == Some(referrer.id))
            .count();
        assert_eq!(referred, 1);
    }

    #[tokio::test]
    async fn test_registration_rejections() {
        let (_store, directory, root) = setup().await;
        let admin = directory.create_staff(&root, "adminone", Role::Admin).await.unwrap();
        let code = admin.referral_code.clone().unwrap();
        directory
            .register_user(registration("alice01", "+100200300", &code))
            .await
            .unwrap();

        let cases = [
            registration("alice01", "+100200399", &code),
            registration("dave004", "+100200300", &code),
        ];
        for case in cases {
            assert!(matches!(
                directory.register_user(case).await,
                Err(LedgerError::Conflict(_))
            ));
        }

        assert!(matches!(
            directory.register_user(registration("erin005", "+1002", "ABCDE")).await,
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            directory.register_user(registration("erin005", "+1002", "ZZZZZZ")).await,
            Err(LedgerError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_customer_service_code_is_not_a_referral() {
        let (store, directory, root) = setup().await;
        let mut support = seed_account(&store, "support1", Role::CustomerService, None).await;
        support.referral_code = Some("SUPPRT".to_string());
        {
            let mut tx = store.begin().await.unwrap();
            tx.save_account(&support).await.unwrap();
            tx.commit().await.unwrap();
        }

        let result = directory
            .register_user(registration("alice01", "+100200300", "SUPPRT"))
            .await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
        assert!(directory.create_staff(&support, "another1", Role::Admin).await.is_err());
        assert!(directory.create_staff(&root, "superx01", Role::SuperAdmin).await.is_err());
    }

    #[tokio::test]
    async fn test_two_step_deletion() {
        let (store, directory, root) = setup().await;
        let admin = directory.create_staff(&root, "adminone", Role::Admin).await.unwrap();
        let support = directory
            .create_staff(&root, "support1", Role::CustomerService)
            .await
            .unwrap();
        let referrer = directory
            .register_user(registration("alice01", "+100200300", admin.referral_code.as_deref().unwrap()))
            .await
            .unwrap();
        let referred = directory
            .register_user(registration("bobby02", "+100200301", referrer.referral_code.as_deref().unwrap()))
            .await
            .unwrap();

        // 익명화 전 삭제 불가
        assert!(matches!(
            directory.remove_account(&support, referrer.id).await,
            Err(LedgerError::Conflict(_))
        ));
        // customer service는 운영 계정 삭제 불가
        assert!(matches!(
            directory.anonymize_account(&support, admin.id).await,
            Err(LedgerError::Forbidden(_))
        ));

        let anonymized = directory.anonymize_account(&support, referrer.id).await.unwrap();
        assert!(anonymized.username.starts_with("deleted_"));
        assert!(anonymized.phone.as_deref().unwrap().starts_with("deleted_"));
        assert_eq!(anonymized.referral_code, None);
        assert_eq!(anonymized.referred_by, None);
        assert!(!anonymized.is_active);
        assert!(directory.active_account(referrer.id).await.is_err());

        directory.remove_account(&support, referrer.id).await.unwrap();

        let state = store.snapshot().await;
        assert!(state.accounts.iter().all(|a| a.id != referrer.id));
        let referred = state.accounts.iter().find(|a| a.id == referred.id).unwrap();
        assert_eq!(referred.referred_by, None);
        assert!(state.wallets.contains_key(&referred.id));
    }
}
