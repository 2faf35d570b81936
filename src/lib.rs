//! Task Ledger API Library
//!
//! # Overview
//!
//! 작업(상품 구매) 기반 커미션 원장 백엔드
//!
//! - 사용자는 추천 코드로 가입하고 순서대로 상품 작업을 배정받음
//! - 작업 완료 시 본인 커미션 + 추천인 커미션이 지갑에 적립됨
//! - 관리자는 StopPoint로 작업 진행을 멈추고 충전/출금을 심사함
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                         API                              │
//! │                                                          │
//! │  ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌─────────┐    │
//! │  │ Routes  │  │Services │  │   DB    │  │  Types  │    │
//! │  └────┬────┘  └────┬────┘  └────┬────┘  └────┬────┘    │
//! │       │            │            │            │          │
//! │       └────────────┴────────────┴────────────┘          │
//! │                         │                                │
//! └─────────────────────────┼────────────────────────────────┘
//!                           │
//!                           ▼
//!                  ┌────────────────┐
//!                  │   PostgreSQL   │
//!                  └────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: 환경 설정 및 원장 정책 값
//! - `error`: 에러 타입 및 처리
//! - `routes`: HTTP 엔드포인트 핸들러
//! - `services`: 비즈니스 로직 (지갑, 커미션, StopPoint, 작업, 충전/출금)
//! - `db`: 저장소 트레이트 + PostgreSQL 구현
//! - `types`: 공통 타입 정의
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use task_ledger_api::{routes, AppState, Config, Database};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let db = Database::connect(&config.database_url).await?;
//!     let app = routes::api_router(AppState::new(Arc::new(db), config));
//!
//!     // ... 서버 시작
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod routes;
pub mod services;
pub mod db;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use error::ApiError;
pub use db::Database;
pub use services::LedgerServices;

use db::LedgerStore;

/// 애플리케이션 전역 상태
pub struct AppState<S: LedgerStore> {
    pub ledger: Arc<LedgerServices<S>>,
    pub store: Arc<S>,
    pub config: Arc<Config>,
}

impl<S: LedgerStore> AppState<S> {
    pub fn new(store: Arc<S>, config: Config) -> Self {
        let ledger = LedgerServices::new(store.clone(), config.policy.clone());
        Self {
            ledger: Arc::new(ledger),
            store,
            config: Arc::new(config),
        }
    }
}

// derive(Clone)은 S: Clone 바운드를 요구하므로 직접 구현
impl<S: LedgerStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            store: self.store.clone(),
            config: self.config.clone(),
        }
    }
}
