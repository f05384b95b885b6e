//! # Payment Gateway Trait
//!
//! The seam between checkout/reconciliation and the hosted payment page
//! provider. The production implementation is the Midtrans Snap client in
//! `shop-midtrans`; tests use [`MockPaymentGateway`].
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │           PaymentGateway (trait)             │
//! │  ├── create_transaction()                    │
//! │  ├── verify_notification()                   │
//! │  └── provider_name()                         │
//! └──────────────────────────────────────────────┘
//!                      ▲
//!                      │
//!          ┌───────────┴───────────┐
//!          │  MidtransSnapGateway  │
//!          └───────────────────────┘
//! ```

use crate::error::PaymentResult;
use crate::order::Customer;
use crate::payment::Notification;
use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What the gateway needs to open a payment page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Our order id, echoed back in notifications
    pub order_id: String,

    /// Whole currency units
    pub gross_amount: i64,

    pub customer: Customer,
}

/// Gateway response for a created transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLink {
    pub token: String,
    pub redirect_url: String,
}

#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Register a transaction and return its payment page.
    async fn create_transaction(&self, request: &TransactionRequest)
        -> PaymentResult<PaymentLink>;

    /// Check that a notification was signed by the gateway.
    fn verify_notification(&self, notification: &Notification) -> PaymentResult<()>;

    /// Provider name (for logging)
    fn provider_name(&self) -> &'static str;
}

/// Type alias for a shared gateway (dynamic dispatch)
pub type BoxedPaymentGateway = Arc<dyn PaymentGateway>;
