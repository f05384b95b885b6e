//! # shop-midtrans
//!
//! Midtrans Snap payment gateway for the storefront order core.
//!
//! - **MidtransSnapGateway** registers an order with the Snap API and
//!   returns the hosted payment page (token + redirect URL).
//! - **signature** verifies the `signature_key` Midtrans attaches to every
//!   HTTP notification.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shop_midtrans::MidtransSnapGateway;
//! use shop_core::{PaymentGateway, TransactionRequest};
//!
//! // Create gateway from environment
//! let gateway = MidtransSnapGateway::from_env()?;
//!
//! let link = gateway.create_transaction(&request).await?;
//!
//! // Redirect the buyer to link.redirect_url
//! ```

pub mod config;
pub mod signature;
pub mod snap;

// Re-exports
pub use config::{MidtransConfig, MidtransEnvironment};
pub use signature::{compute_signature, verify_signature};
pub use snap::MidtransSnapGateway;
