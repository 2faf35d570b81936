//! Authorization
//!
//! 역할 → 권한(capability) 매핑 한 곳에서 관리
//!
//! 모든 관리자 작업은 `require(actor, Capability::...)` 로 시작함

use crate::db::Account;
use crate::error::LedgerError;
use crate::types::Role;

/// 관리자 작업 권한
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// StopPoint 추가/수정/승인/거절/초기화
    ManageStopPoints,
    /// 충전 요청 승인/거절/금액 수정
    ReviewRecharges,
    /// 출금 요청 승인/거절
    ReviewWithdrawals,
    /// 커미션 비율, 일일 한도 설정
    ManageCommissionSettings,
    /// 상품 등록/활성화
    ManageCatalog,
    /// 지갑 직접 입금/출금
    AdjustWallets,
    /// 운영 계정 생성
    ManageStaff,
    /// 해당 역할 계정 삭제
    DeleteAccount(Role),
    /// 다른 계정의 지갑/이력 조회
    ViewAccounts,
}

/// 권한 판단
pub trait Authorize {
    fn allows(&self, capability: Capability) -> bool;
}

impl Authorize for Role {
    fn allows(&self, capability: Capability) -> bool {
        use Capability::*;

        match self {
            Role::SuperAdmin => true,
            Role::Admin => match capability {
                ManageStaff => false,
                DeleteAccount(target) => target == Role::User,
                _ => true,
            },
            Role::CustomerService => matches!(
                capability,
                ViewAccounts | DeleteAccount(Role::User)
            ),
            Role::User => false,
        }
    }
}

/// 비활성 계정은 어떤 권한도 없음
impl Authorize for Account {
    fn allows(&self, capability: Capability) -> bool {
        self.is_active && self.role.allows(capability)
    }
}

/// 권한 없으면 `Forbidden`
pub fn require(actor: &Account, capability: Capability) -> Result<(), LedgerError> {
    if actor.allows(capability) {
        Ok(())
    } else {
        tracing::warn!(actor = actor.id, role = %actor.role, ?capability, "Capability denied");
        Err(LedgerError::Forbidden(format!(
            "{} may not perform {:?}",
            actor.role, capability
        )))
    }
}

/// 본인이거나 조회 권한이 있는 운영 계정
pub fn require_self_or_staff(actor: &Account, user_id: i64) -> Result<(), LedgerError> {
    if actor.id == user_id && actor.is_active {
        return Ok(());
    }
    require(actor, Capability::ViewAccounts)
}
