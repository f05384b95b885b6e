//! Inventory ledger errors.

use sqlx::Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("insufficient stock for product {product_id}")]
    InsufficientStock { product_id: String },

    #[error("product not found")]
    ProductNotFound,

    #[error("quantity must be greater than zero")]
    InvalidQuantity,

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for InventoryError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::ProductNotFound;
        }

        Self::Sql(error)
    }
}
