//! Inventory

pub mod errors;
pub mod ledger;

pub use errors::InventoryError;
pub use ledger::InventoryLedger;
