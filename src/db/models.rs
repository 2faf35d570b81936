//! Database Models
//!
//! Row types for accounts, wallets, commission entries, task assignments,
//! stop points and the recharge/withdrawal workflows.
//! Money columns are `NUMERIC` and map to `rust_decimal::Decimal`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

use crate::types::{CommissionType, Network, ReviewStatus, Role};

/// 계정 (user directory)
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Account {
    pub id: i64,

    /// 로그인 이름 (unique). 삭제 시 `deleted_xxxxxx`로 치환
    pub username: String,

    /// 일반 사용자 필수, 운영 계정은 없음
    pub phone: Option<String>,

    #[sqlx(try_from = "String")]
    pub role: Role,

    /// 본인 추천 코드 (unique, 한번 정해지면 변경 불가)
    pub referral_code: Option<String>,

    /// 추천인 (약한 참조, 추천인 삭제 시 NULL)
    pub referred_by: Option<i64>,

    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// 계정 생성 입력
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub phone: Option<String>,
    pub role: Role,
    pub referral_code: Option<String>,
    pub referred_by: Option<i64>,
}

/// 사용자 지갑 (계정당 1개)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Wallet {
    pub user_id: i64,

    /// 사용 가능 잔액 (작업 구매 / 출금 시 감소, 충전 승인 시 증가)
    pub current_balance: Decimal,

    /// 본인 작업 커미션 누계
    pub product_commission: Decimal,

    /// 추천 커미션 누계
    pub referral_commission: Decimal,

    /// 평생 누적 수익 (감소하지 않음)
    pub cumulative_total: Decimal,

    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    /// 빈 지갑
    pub fn empty(user_id: i64) -> Self {
        Self {
            user_id,
            current_balance: Decimal::ZERO,
            product_commission: Decimal::ZERO,
            referral_commission: Decimal::ZERO,
            cumulative_total: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }
}

/// 사용자별 커미션 설정 (관리자 관리)
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct CommissionSetting {
    pub user_id: i64,
    /// 본인 작업 커미션 비율 (%, 0 ~ 100)
    pub product_rate: Decimal,
    /// 추천 커미션 비율 (%, 0 ~ 100)
    pub referral_rate: Decimal,
    /// 일일 작업 한도 (1 이상)
    pub daily_task_limit: i32,
    pub updated_at: DateTime<Utc>,
}

/// 커미션 원장 행 (append-only)
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Commission {
    pub id: i64,
    pub user_id: i64,
    /// 상품 식별자 (추천 커미션 멱등성 키의 일부)
    pub product_id: i64,
    pub product_name: String,
    pub amount: Decimal,
    #[sqlx(try_from = "String")]
    pub commission_type: CommissionType,
    /// 이 행을 발생시킨 사용자 (self: 본인, referral: 추천받은 사용자)
    pub triggered_by: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// 커미션 원장 입력
#[derive(Debug, Clone)]
pub struct NewCommission {
    pub user_id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub amount: Decimal,
    pub commission_type: CommissionType,
    pub triggered_by: i64,
}

/// 상품 (catalog)
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub price: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// 사용자별 상품 작업
///
/// 상태: assigned (is_completed = false) → completed
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserProductTask {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    /// 작업 순번 (1부터). 과거 데이터는 NULL일 수 있음
    pub task_number: Option<i32>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// StopPoint: 작업 순번 체크포인트
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StopPoint {
    pub id: i64,
    pub user_id: i64,
    /// 작업 순번 (1 ..= daily_task_limit)
    pub point: i32,
    pub required_balance: Decimal,
    #[sqlx(try_from = "String")]
    pub status: ReviewStatus,
    /// 진행 순서 (point와 별개)
    #[sqlx(rename = "sort_order")]
    pub order: i32,
}

/// 사용자별 StopPoint 진행 상태
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct StopPointProgress {
    pub user_id: i64,
    /// 마지막으로 승인된 StopPoint (약한 참조)
    pub last_cleared: Option<i64>,
    pub is_stopped: bool,
}

/// 충전 요청
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RechargeRequest {
    pub id: i64,
    pub user_id: i64,
    pub amount: Decimal,
    #[sqlx(try_from = "String")]
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// 충전 증빙 (파일 저장은 외부, 여기서는 참조 문자열만)
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Voucher {
    pub id: i64,
    pub recharge_request_id: i64,
    pub reference: String,
    pub uploaded_at: DateTime<Utc>,
}

/// 충전 처리 이력 (immutable)
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RechargeHistory {
    pub id: i64,
    pub user_id: i64,
    pub recharge_request_id: Option<i64>,
    pub amount: Decimal,
    #[sqlx(try_from = "String")]
    pub status: ReviewStatus,
    pub action_date: DateTime<Utc>,
}

/// 출금 주소 (계정당 1개, 주소는 전역 unique)
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PayoutAddress {
    pub user_id: i64,
    pub address: String,
    #[sqlx(try_from = "String")]
    pub network: Network,
    pub created_at: DateTime<Utc>,
}

/// 출금 요청
///
/// 요청 시점에 잔액 차감 → 승인은 상태만 변경, 거절은 환불
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Withdrawal {
    pub id: i64,
    pub user_id: i64,
    pub amount: Decimal,
    #[sqlx(try_from = "String")]
    pub network: Network,
    #[sqlx(try_from = "String")]
    pub status: ReviewStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}
