//! Order lookups.

use async_trait::async_trait;
use mockall::automock;
use shop_core::{Order, Payment};

use crate::{
    database::Db,
    orders::{errors::OrderError, repository::SqliteOrdersRepository},
    payments::repository::SqlitePaymentsRepository,
};

#[derive(Debug, Clone)]
pub struct SqliteOrderService {
    db: Db,
    orders_repository: SqliteOrdersRepository,
    payments_repository: SqlitePaymentsRepository,
}

impl SqliteOrderService {
    #[must_use]
    pub fn new(db: Db) -> Self {
        Self {
            db,
            orders_repository: SqliteOrdersRepository::new(),
            payments_repository: SqlitePaymentsRepository::new(),
        }
    }
}

#[async_trait]
impl OrderService for SqliteOrderService {
    async fn get_order(&self, order_id: &str) -> Result<Order, OrderError> {
        let mut tx = self.db.begin().await?;

        let order = self
            .orders_repository
            .find_order(&mut tx, order_id)
            .await?
            .ok_or(OrderError::NotFound)?;

        tx.commit().await?;

        Ok(order)
    }

    async fn payments_for_order(&self, order_id: &str) -> Result<Vec<Payment>, OrderError> {
        let mut tx = self.db.begin().await?;

        let payments = self
            .payments_repository
            .list_for_order(&mut tx, order_id)
            .await?;

        tx.commit().await?;

        Ok(payments)
    }
}

#[automock]
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Retrieve an order with its customer snapshot and items.
    async fn get_order(&self, order_id: &str) -> Result<Order, OrderError>;

    /// Payment notifications recorded against an order, oldest first.
    async fn payments_for_order(&self, order_id: &str) -> Result<Vec<Payment>, OrderError>;
}
