//! Product catalog

pub mod errors;
pub(crate) mod repository;
pub mod service;

pub use errors::CatalogError;
pub use service::*;
