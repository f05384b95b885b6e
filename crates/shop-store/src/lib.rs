//! # shop-store
//!
//! SQLite persistence and the transactional parts of the storefront:
//!
//! - `SqliteCartStore`: cart mutations, each repriced and persisted atomically
//! - `InventoryLedger`: conditional stock decrements
//! - `SqliteCheckoutCoordinator`: cart → order + payment link, all or nothing
//! - `SqlitePaymentReconciler`: gateway notifications → payment rows and paid orders
//! - `OrderEventPublisher`: post-commit side channel
//!
//! Every write transaction opens with a write statement so SQLite takes its
//! write lock up front; concurrent writers queue on the busy timeout instead
//! of failing to upgrade a read lock.

pub mod carts;
pub mod catalog;
mod columns;
pub mod database;
pub mod events;
pub mod inventory;
pub mod orders;
pub mod payments;

#[cfg(test)]
mod test;

pub use carts::{CartError, CartStore, SqliteCartStore};
pub use catalog::{CatalogError, CatalogService, SqliteCatalogService};
pub use database::{busy_timeout_for, Db, DEFAULT_BUSY_TIMEOUT};
pub use events::{OrderEvent, OrderEventPublisher, DEFAULT_EVENT_BUFFER};
pub use inventory::{InventoryError, InventoryLedger};
pub use orders::{
    CheckoutCoordinator, CheckoutError, CheckoutRequest, OrderError, OrderService,
    SqliteCheckoutCoordinator, SqliteOrderService, DEFAULT_CHECKOUT_TIMEOUT,
};
pub use payments::{PaymentReconciler, ReconcileError, ReconcileOutcome, SqlitePaymentReconciler};
