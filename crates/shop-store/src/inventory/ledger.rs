//! # Inventory Ledger
//!
//! The only writer of `products.stock`. A reservation is a single conditional
//! decrement; it either takes the whole quantity or changes nothing, so
//! concurrent checkouts can never drive stock below zero.

use chrono::Utc;
use sqlx::{query, query_scalar, Sqlite, Transaction};
use tracing::{debug, instrument};

use crate::{database::Db, inventory::errors::InventoryError};

const RESERVE_STOCK_SQL: &str = "
    UPDATE products
    SET stock = stock - ?, updated_at = ?
    WHERE id = ? AND stock >= ?";

const GET_STOCK_SQL: &str = "SELECT stock FROM products WHERE id = ?";

#[derive(Debug, Clone)]
pub struct InventoryLedger {
    db: Db,
}

impl InventoryLedger {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Take `qty` units of `product_id` in a transaction of its own.
    ///
    /// # Errors
    ///
    /// [`InventoryError::InsufficientStock`] when fewer than `qty` units are
    /// on hand (or the product does not exist).
    #[instrument(skip(self))]
    pub async fn reserve(&self, product_id: &str, qty: u32) -> Result<(), InventoryError> {
        let mut tx = self.db.begin().await?;

        Self::reserve_in(&mut tx, product_id, qty).await?;

        tx.commit().await?;

        Ok(())
    }

    /// Current units on hand.
    ///
    /// # Errors
    ///
    /// [`InventoryError::ProductNotFound`] for an unknown product.
    pub async fn stock(&self, product_id: &str) -> Result<u32, InventoryError> {
        let stock: i64 = query_scalar(GET_STOCK_SQL)
            .bind(product_id)
            .fetch_one(self.db.pool())
            .await?;

        u32::try_from(stock).map_err(|e| {
            InventoryError::Sql(sqlx::Error::ColumnDecode {
                index: "stock".to_string(),
                source: Box::new(e),
            })
        })
    }

    /// Take `qty` units of `product_id` inside the caller's transaction.
    pub(crate) async fn reserve_in(
        tx: &mut Transaction<'_, Sqlite>,
        product_id: &str,
        qty: u32,
    ) -> Result<(), InventoryError> {
        if qty == 0 {
            return Err(InventoryError::InvalidQuantity);
        }

        let qty = i64::from(qty);
        let rows_affected = query(RESERVE_STOCK_SQL)
            .bind(qty)
            .bind(Utc::now())
            .bind(product_id)
            .bind(qty)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            debug!("Reservation refused: product={}, qty={}", product_id, qty);
            return Err(InventoryError::InsufficientStock {
                product_id: product_id.to_string(),
            });
        }

        Ok(())
    }
}
