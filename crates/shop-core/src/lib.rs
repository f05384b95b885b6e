//! # shop-core
//!
//! Core types and traits for the storefront order core.
//!
//! This crate provides:
//! - `pricing::calculate` and `LinePrice` for cart arithmetic
//! - `Cart`, `Product` and `ProductCatalog`
//! - `Order`, `OrderItem` and `OrderCustomer` snapshots
//! - `Notification` and `Payment` for gateway callbacks
//! - `PaymentGateway` trait for the payment page provider
//! - `ShippingRates` for the courier fee table
//! - `PaymentError` for typed gateway errors
//!
//! ## Example
//!
//! ```rust,ignore
//! use shop_core::{pricing, LinePrice, TaxRate};
//! use rust_decimal::Decimal;
//!
//! let line = LinePrice::quote(Decimal::from(10_000), 2, TaxRate::DEFAULT);
//! let totals = pricing::calculate([&line], Decimal::from(12_000));
//!
//! assert_eq!(totals.grand_total, Decimal::from(34_200));
//! ```

pub mod cart;
pub mod error;
pub mod gateway;
pub mod order;
pub mod payment;
pub mod pricing;
pub mod product;
pub mod shipping;

// Re-exports for convenience
pub use cart::{Cart, CartItem};
pub use error::{PaymentError, PaymentResult};
pub use gateway::{BoxedPaymentGateway, PaymentGateway, PaymentLink, TransactionRequest};
pub use order::{
    Customer, Order, OrderCustomer, OrderItem, PaymentStatus, ShippingAddress,
};
pub use payment::{FraudStatus, Notification, Payment, TransactionStatus};
pub use pricing::{LinePrice, TaxRate, Totals};
pub use product::{Product, ProductCatalog};
pub use shipping::{ShippingRates, ShippingSelection, DEFAULT_SERVICE};

pub use gateway::MockPaymentGateway;
