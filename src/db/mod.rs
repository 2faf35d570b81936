//! Database Module
//!
//! PostgreSQL + SQLx
//!
//! - 모든 원장 변경은 하나의 트랜잭션 (`LedgerTx`) 안에서 수행
//! - 결정에 쓰이는 행(wallet, task, progress, 요청)은 `FOR UPDATE`로 읽음
//! - 같은 사용자에 대한 동시 요청은 wallet 행 잠금에서 직렬화됨
//!
//! 커넥션 풀은 SQLx의 PgPool 사용 (최소/최대 커넥션, acquire 타임아웃)

mod models;
mod postgres;
mod repository;

#[cfg(test)]
pub mod memory;

pub use models::*;
pub use postgres::PgTx;
pub use repository::{LedgerStore, LedgerTx, StoreResult};

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

/// 데이터베이스 연결 및 트랜잭션 생성 담당
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// 데이터베이스 연결
    ///
    /// # Connection Pool Settings
    ///
    /// - max_connections: 10 (트래픽에 따라 조정)
    /// - min_connections: 1 (idle 시 최소 유지)
    /// - acquire_timeout: 3초 (커넥션 획득 대기)
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(1)
            .acquire_timeout(std::time::Duration::from_secs(3))
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// 마이그레이션 실행
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for Database {
    type Tx = PgTx;

    async fn begin(&self) -> StoreResult<PgTx> {
        let tx = self.pool.begin().await?;
        Ok(PgTx::new(tx))
    }

    /// Health check
    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
