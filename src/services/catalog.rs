//! Product Catalog
//!
//! 작업 대상 상품. 비활성 상품은 새로 배정되지 않음 (기존 작업은 완료 가능)

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::db::{Account, LedgerStore, LedgerTx, Product};
use crate::error::LedgerError;
use crate::services::authz::{require, Capability};
use crate::services::wallet::validate_amount;

/// 트랜잭션 안에서 상품 조회 (없으면 NotFound)
pub async fn load_product<T: LedgerTx>(tx: &mut T, product_id: i64) -> Result<Product, LedgerError> {
    tx.product(product_id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("Product {}", product_id)))
}

pub struct Catalog<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> Catalog<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn product(&self, product_id: i64) -> Result<Product, LedgerError> {
        let mut tx = self.store.begin().await?;
        let product = load_product(&mut tx, product_id).await?;
        tx.commit().await?;
        Ok(product)
    }

    /// 상품 등록
    pub async fn add_product(
        &self,
        actor: &Account,
        name: &str,
        price: Decimal,
    ) -> Result<Product, LedgerError> {
        require(actor, Capability::ManageCatalog)?;

        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::validation("Product name is required"));
        }
        let price = validate_amount(price)?;
        if price.is_zero() {
            return Err(LedgerError::validation("Product price must be greater than zero"));
        }

        let mut tx = self.store.begin().await?;
        let product = tx.insert_product(name, price).await?;
        tx.commit().await?;

        tracing::info!(product_id = product.id, %price, by = actor.id, "Product added");
        Ok(product)
    }

    /// 상품 활성화/비활성화
    pub async fn set_product_active(
        &self,
        actor: &Account,
        product_id: i64,
        is_active: bool,
    ) -> Result<Product, LedgerError> {
        require(actor, Capability::ManageCatalog)?;

        let mut tx = self.store.begin().await?;
        let mut product = load_product(&mut tx, product_id).await?;
        product.is_active = is_active;
        tx.save_product(&product).await?;
        tx.commit().await?;

        tracing::info!(product_id, is_active, by = actor.id, "Product availability changed");
        Ok(product)
    }
}
