//! Checkout and order lookup errors.

use shop_core::PaymentError;
use sqlx::Error;
use thiserror::Error;

use crate::inventory::InventoryError;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("no shipping option selected")]
    MissingShipping,

    #[error("insufficient stock for product {product_id}")]
    InsufficientStock { product_id: String },

    #[error("payment gateway unavailable")]
    PaymentGatewayUnavailable(#[source] PaymentError),

    #[error("checkout timed out")]
    TimedOut,

    #[error("storage error")]
    Storage(#[source] Error),
}

impl From<Error> for CheckoutError {
    fn from(error: Error) -> Self {
        Self::Storage(error)
    }
}

impl From<InventoryError> for CheckoutError {
    fn from(error: InventoryError) -> Self {
        match error {
            InventoryError::InsufficientStock { product_id } => {
                Self::InsufficientStock { product_id }
            }
            InventoryError::Sql(error) => Self::Storage(error),
            InventoryError::ProductNotFound | InventoryError::InvalidQuantity => {
                Self::Storage(Error::Protocol(error.to_string()))
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("order not found")]
    NotFound,

    #[error("storage error")]
    Sql(#[source] Error),
}

impl From<Error> for OrderError {
    fn from(error: Error) -> Self {
        if matches!(error, Error::RowNotFound) {
            return Self::NotFound;
        }

        Self::Sql(error)
    }
}
