//! Cart store errors.

use sqlx::{
    error::{DatabaseError, ErrorKind},
    Error,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CartError {
    #[error("cart not found")]
    CartNotFound,

    #[error("cart item not found")]
    CartItemNotFound,

    #[error("product not found")]
    ProductNotFound,

    #[error("quantity must be greater than zero")]
    InvalidQuantity,

    #[error("insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: String,
        requested: u32,
        available: u32,
    },

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for CartError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::CartNotFound;
        }

        match error.as_database_error().map(DatabaseError::kind) {
            Some(ErrorKind::ForeignKeyViolation) => Self::ProductNotFound,
            Some(ErrorKind::CheckViolation) => Self::InvalidQuantity,
            _ => Self::Sql(error),
        }
    }
}
