//! Carts

pub mod errors;
mod repositories;
pub mod service;

pub use errors::CartError;
pub use service::*;
