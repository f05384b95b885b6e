//! Payments Repository

use shop_core::Payment;
use sqlx::{query, sqlite::SqliteRow, Row, Sqlite, Transaction};

use crate::columns::try_get_decimal;

const CREATE_PAYMENT_SQL: &str = "
    INSERT INTO payments (
        id, order_id, transaction_id, amount, transaction_status, payment_type, payload,
        created_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)";

const LIST_PAYMENTS_SQL: &str = "
    SELECT id, order_id, transaction_id, amount, transaction_status, payment_type, payload,
           created_at
    FROM payments
    WHERE order_id = ?
    ORDER BY created_at, rowid";

#[derive(Debug, Clone, Default)]
pub(crate) struct SqlitePaymentsRepository;

impl SqlitePaymentsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn create_payment(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        payment: &Payment,
    ) -> Result<(), sqlx::Error> {
        query(CREATE_PAYMENT_SQL)
            .bind(&payment.id)
            .bind(&payment.order_id)
            .bind(&payment.transaction_id)
            .bind(payment.amount.to_string())
            .bind(&payment.transaction_status)
            .bind(&payment.payment_type)
            .bind(payment.payload.to_string())
            .bind(payment.created_at)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub(crate) async fn list_for_order(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        order_id: &str,
    ) -> Result<Vec<Payment>, sqlx::Error> {
        query(LIST_PAYMENTS_SQL)
            .bind(order_id)
            .fetch_all(&mut **tx)
            .await?
            .iter()
            .map(map_payment)
            .collect()
    }
}

fn map_payment(row: &SqliteRow) -> sqlx::Result<Payment> {
    let payload: &str = row.try_get("payload")?;

    Ok(Payment {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        transaction_id: row.try_get("transaction_id")?,
        amount: try_get_decimal(row, "amount")?,
        transaction_status: row.try_get("transaction_status")?,
        payment_type: row.try_get("payment_type")?,
        payload: serde_json::from_str(payload).map_err(|e| sqlx::Error::ColumnDecode {
            index: "payload".to_string(),
            source: Box::new(e),
        })?,
        created_at: row.try_get("created_at")?,
    })
}
