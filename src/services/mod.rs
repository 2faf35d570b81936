//! Services Module
//!
//! 비즈니스 로직을 담당하는 서비스 레이어
//!
//! # Services
//! - `AccountDirectory`: 가입, 운영 계정, 2단계 삭제
//! - `WalletLedger`: 지갑 잔액 규칙
//! - `CommissionEngine`: 상품/추천 커미션, 커미션 설정
//! - `TaskGate`: StopPoint 기반 작업 게이트
//! - `TaskOrchestrator`: 작업 배정/완료 트랜잭션
//! - `Catalog`: 상품 관리
//! - `RechargeWorkflow` / `WithdrawalWorkflow`: 관리자 심사 흐름
//!
//! 모든 서비스는 `LedgerStore` 위에서 동작 (PostgreSQL / 테스트용 메모리)

pub mod accounts;
pub mod authz;
pub mod catalog;
pub mod commission;
pub mod recharge;
pub mod stop_points;
pub mod tasks;
pub mod wallet;
pub mod withdrawal;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use serde::Serialize;

use crate::config::LedgerPolicy;
use crate::db::LedgerStore;

pub use accounts::{AccountDirectory, Registration};
pub use authz::{Authorize, Capability};
pub use catalog::Catalog;
pub use commission::{CommissionEngine, CommissionSummary, SettingChange};
pub use recharge::RechargeWorkflow;
pub use stop_points::{GateDecision, GateDenial, StopPointBatch, StopPointChange, TaskGate};
pub use tasks::{CommissionBreakdown, NextTask, TaskOrchestrator, TaskOutcome, TaskProgress};
pub use wallet::WalletLedger;
pub use withdrawal::WithdrawalWorkflow;

/// 정책 거절 사유 (에러 아님)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// 일일 한도 도달 또는 배정할 상품 없음
    Exhausted,
    /// StopPoint 게이트
    Gated,
    /// current_balance < 상품 가격
    InsufficientFunds,
}

/// 정책 거절 (사유 + 안내 메시지)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Denial {
    pub reason: DenialReason,
    pub message: String,
}

impl Denial {
    pub fn new(reason: DenialReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

/// 전체 서비스 묶음 (AppState에 보관)
pub struct LedgerServices<S: LedgerStore> {
    pub accounts: AccountDirectory<S>,
    pub wallets: WalletLedger<S>,
    pub commissions: CommissionEngine<S>,
    pub gate: TaskGate<S>,
    pub tasks: TaskOrchestrator<S>,
    pub catalog: Catalog<S>,
    pub recharges: RechargeWorkflow<S>,
    pub withdrawals: WithdrawalWorkflow<S>,
}

impl<S: LedgerStore> LedgerServices<S> {
    pub fn new(store: Arc<S>, policy: LedgerPolicy) -> Self {
        Self {
            accounts: AccountDirectory::new(store.clone(), policy.clone()),
            wallets: WalletLedger::new(store.clone()),
            commissions: CommissionEngine::new(store.clone(), policy.clone()),
            gate: TaskGate::new(store.clone(), policy.clone()),
            tasks: TaskOrchestrator::new(store.clone(), policy.clone()),
            catalog: Catalog::new(store.clone()),
            recharges: RechargeWorkflow::new(store.clone()),
            withdrawals: WithdrawalWorkflow::new(store, policy),
        }
    }
}
