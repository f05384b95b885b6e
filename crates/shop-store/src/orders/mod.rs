//! Orders

pub mod checkout;
pub mod errors;
pub(crate) mod repository;
pub mod service;

pub use checkout::*;
pub use errors::{CheckoutError, OrderError};
pub use service::*;
