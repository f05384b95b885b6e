//! Reconciliation errors.
//!
//! These never reach the gateway: the reconciler logs them and still
//! acknowledges the notification.

use shop_core::PaymentError;
use sqlx::Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("payment record could not be built")]
    Payment(#[source] PaymentError),

    #[error("storage error")]
    Storage(#[source] Error),
}

impl From<Error> for ReconcileError {
    fn from(error: Error) -> Self {
        Self::Storage(error)
    }
}

impl From<PaymentError> for ReconcileError {
    fn from(error: PaymentError) -> Self {
        Self::Payment(error)
    }
}
