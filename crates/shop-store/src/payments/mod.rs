//! Payment notifications and their audit trail

pub mod errors;
pub mod reconciler;
pub(crate) mod repository;

pub use errors::ReconcileError;
pub use reconciler::*;
