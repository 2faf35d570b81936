//! Common Types Module
//!
//! 애플리케이션 전반에서 사용되는 공통 타입 정의
//!
//! - 금액 양자화 (2 decimal places, half-to-even)
//! - 문자열로 저장되는 도메인 enum (role, status, network ...)

use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 원장 금액 소수점 자리수 (NUMERIC(12,2))
pub const MONEY_SCALE: u32 = 2;

/// 금액을 원장 정밀도로 양자화
///
/// 저장 값과 동일한 규칙(half-to-even)을 사용해야
/// 계산 값과 DB 값이 어긋나지 않음
pub fn quantize(value: Decimal) -> Decimal {
    let mut quantized = value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven);
    quantized.rescale(MONEY_SCALE);
    quantized
}

/// `amount * rate / 100` 을 원장 정밀도로 계산
///
/// rate는 퍼센트 단위 (0 ~ 100)
pub fn percent_of(amount: Decimal, rate: Decimal) -> Decimal {
    quantize(amount * rate / Decimal::ONE_HUNDRED)
}

/// 문자열 → enum 변환 실패
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// TEXT 컬럼에 저장되는 enum 정의
///
/// `as_str` / `FromStr` / `TryFrom<String>` (sqlx `try_from` 매핑용) / `Display` 생성
macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident ($kind:literal) {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    other => Err(ParseEnumError { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = ParseEnumError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum! {
    /// 계정 역할
    pub enum Role ("role") {
        SuperAdmin => "superadmin",
        Admin => "admin",
        CustomerService => "customerservice",
        User => "user",
    }
}

text_enum! {
    /// 커미션 원장 행 종류
    pub enum CommissionType ("commission type") {
        /// 본인 작업 완료로 발생
        SelfEarned => "self",
        /// 추천한 사용자의 작업 완료로 발생
        Referral => "referral",
    }
}

text_enum! {
    /// 관리자 심사 상태 (StopPoint / 충전 / 출금 공통)
    pub enum ReviewStatus ("review status") {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
}

text_enum! {
    /// 출금 네트워크
    pub enum Network ("network") {
        Trx20 => "TRX-20",
        Erc20 => "ERC-20",
        Bep20 => "BEP-20",
        Polygon => "Polygon",
        Solana => "Solana",
        Avalanche => "Avalanche",
        Fantom => "Fantom",
        Arbitrum => "Arbitrum",
        Optimism => "Optimism",
        Cardano => "Cardano",
    }
}

/// Wallet 잔액 필드 (cumulative_total은 직접 변경 불가)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceField {
    CurrentBalance,
    ProductCommission,
    ReferralCommission,
}

impl fmt::Display for BalanceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BalanceField::CurrentBalance => "current_balance",
            BalanceField::ProductCommission => "product_commission",
            BalanceField::ReferralCommission => "referral_commission",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_quantize_half_even() {
        assert_eq!(quantize(d("0.125")), d("0.12"));
        assert_eq!(quantize(d("0.135")), d("0.14"));
        assert_eq!(quantize(d("1.999")), d("2.00"));
        // 직렬화 값은 항상 소수점 2자리
        assert_eq!(quantize(d("50")).to_string(), "50.00");
    }

    #[test]
    fn test_percent_of() {
        // 10.00의 5% = 0.50
        assert_eq!(percent_of(d("10.00"), d("5.00")), d("0.50"));
        assert_eq!(percent_of(d("33.33"), d("12.50")), d("4.17"));
        assert_eq!(percent_of(d("10.00"), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn test_role_round_trip() {
        assert_eq!("customerservice".parse::<Role>().unwrap(), Role::CustomerService);
        assert_eq!(Role::SuperAdmin.to_string(), "superadmin");
        assert!("root".parse::<Role>().is_err());
    }

    #[test]
    fn test_network_parse() {
        assert_eq!(Network::try_from("TRX-20".to_string()).unwrap(), Network::Trx20);
        let err = "Bitcoin".parse::<Network>().unwrap_err();
        assert_eq!(err.kind, "network");
    }

    #[test]
    fn test_enum_serde_uses_storage_names() {
        let json = serde_json::to_string(&CommissionType::SelfEarned).unwrap();
        assert_eq!(json, "\"self\"");
        let status: ReviewStatus = serde_json::from_str("\"rejected\"").unwrap();
        assert_eq!(status, ReviewStatus::Rejected);
    }
}
