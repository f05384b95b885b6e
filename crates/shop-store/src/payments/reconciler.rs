//! # Payment Reconciler
//!
//! Applies gateway notifications to orders.
//!
//! A notification is parsed, authenticated, and then handled in one
//! transaction that starts by taking the write lock on the order row, so two
//! deliveries of the same notification are applied one after the other:
//!
//! | Condition                         | Effect                                 |
//! |-----------------------------------|----------------------------------------|
//! | body unparseable / incomplete     | nothing                                |
//! | signature mismatch                | nothing, logged as suspicious          |
//! | order unknown                     | nothing                                |
//! | order already paid                | payment row appended                   |
//! | not a success status              | payment row appended                   |
//! | success status on unpaid order    | payment row appended, order → paid     |
//!
//! Whatever happens the gateway gets an acknowledgement; outcomes and errors
//! only show up in the logs.

use async_trait::async_trait;
use chrono::Utc;
use mockall::automock;
use shop_core::{BoxedPaymentGateway, Notification, Payment};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    database::Db,
    events::{OrderEvent, OrderEventPublisher},
    orders::repository::SqliteOrdersRepository,
    payments::{errors::ReconcileError, repository::SqlitePaymentsRepository},
};

/// What a notification did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Body could not be decoded or lacked required fields
    Malformed,
    /// Signature did not verify
    Rejected,
    /// No order with that id
    UnknownOrder,
    /// Recorded; the order was already paid
    AlreadyPaid,
    /// Recorded; status was not a success
    Recorded,
    /// Recorded and the order transitioned to paid
    Paid,
    /// Storage failed; nothing was applied
    Failed,
}

pub struct SqlitePaymentReconciler {
    db: Db,
    gateway: BoxedPaymentGateway,
    events: OrderEventPublisher,
    orders_repository: SqliteOrdersRepository,
    payments_repository: SqlitePaymentsRepository,
}

impl SqlitePaymentReconciler {
    #[must_use]
    pub fn new(db: Db, gateway: BoxedPaymentGateway) -> Self {
        Self {
            db,
            gateway,
            events: OrderEventPublisher::disabled(),
            orders_repository: SqliteOrdersRepository::new(),
            payments_repository: SqlitePaymentsRepository::new(),
        }
    }

    /// Builder: publish `OrderPaid` events
    #[must_use]
    pub fn with_events(mut self, events: OrderEventPublisher) -> Self {
        self.events = events;
        self
    }

    async fn apply(
        &self,
        notification: &Notification,
        body: &[u8],
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let order_id = notification.order_id.as_str();

        let mut tx = self.db.begin().await?;

        if self.orders_repository.lock_order(&mut tx, order_id).await? == 0 {
            return Ok(ReconcileOutcome::UnknownOrder);
        }

        let status = self
            .orders_repository
            .get_payment_status(&mut tx, order_id)
            .await?;

        let mut payment = Payment::from_notification(order_id, notification)?;
        if let Ok(raw) = serde_json::from_slice::<serde_json::Value>(body) {
            payment.payload = raw;
        }
        self.payments_repository
            .create_payment(&mut tx, &payment)
            .await?;

        if status.is_paid() {
            tx.commit().await?;
            return Ok(ReconcileOutcome::AlreadyPaid);
        }

        if !notification.is_success() {
            tx.commit().await?;
            return Ok(ReconcileOutcome::Recorded);
        }

        let paid_at = Utc::now();
        if self
            .orders_repository
            .mark_paid(&mut tx, order_id, paid_at)
            .await?
            == 0
        {
            tx.commit().await?;
            return Ok(ReconcileOutcome::AlreadyPaid);
        }

        tx.commit().await?;

        self.events.publish(OrderEvent::OrderPaid {
            order_id: order_id.to_string(),
            transaction_id: notification.transaction_id.clone(),
            payment_type: notification.payment_type.clone(),
            at: paid_at,
        });

        Ok(ReconcileOutcome::Paid)
    }
}

#[async_trait]
impl PaymentReconciler for SqlitePaymentReconciler {
    #[instrument(skip_all)]
    async fn handle_notification(&self, body: &[u8]) -> ReconcileOutcome {
        let notification = match Notification::from_slice(body) {
            Ok(notification) => notification,
            Err(e) => {
                warn!("Ignoring malformed payment notification: {}", e);
                return ReconcileOutcome::Malformed;
            }
        };

        if let Err(e) = self.gateway.verify_notification(&notification) {
            warn!(
                "Suspicious {} notification for order {}: {}",
                self.gateway.provider_name(),
                notification.order_id,
                e
            );
            return ReconcileOutcome::Rejected;
        }

        let outcome = match self.apply(&notification, body).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    "Failed to reconcile notification for order {}: {}",
                    notification.order_id, e
                );
                return ReconcileOutcome::Failed;
            }
        };

        match outcome {
            ReconcileOutcome::Paid => info!(
                "Order paid: id={}, transaction_id={}, payment_type={}",
                notification.order_id, notification.transaction_id, notification.payment_type
            ),
            ReconcileOutcome::UnknownOrder => info!(
                "Notification for unknown order {} ignored",
                notification.order_id
            ),
            _ => debug!(
                "Notification for order {} recorded: status={}, outcome={:?}",
                notification.order_id, notification.transaction_status, outcome
            ),
        }

        outcome
    }
}

#[automock]
#[async_trait]
pub trait PaymentReconciler: Send + Sync {
    /// Applies one raw notification body. Never fails; the caller always
    /// acknowledges the gateway.
    async fn handle_notification(&self, body: &[u8]) -> ReconcileOutcome;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::{OrderService, SqliteOrderService};
    use crate::test::{file_db, migrated_db};
    use rust_decimal::Decimal;
    use serde_json::json;
    use shop_core::{pricing, LinePrice, MockPaymentGateway, Order, PaymentError, TaxRate};
    use std::sync::Arc;
    use testresult::TestResult;

    fn trusting_gateway() -> MockPaymentGateway {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_verify_notification().returning(|_| Ok(()));
        gateway.expect_provider_name().return_const("mock");
        gateway
    }

    fn refusing_gateway() -> MockPaymentGateway {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_verify_notification().returning(|_| {
            Err(PaymentError::NotificationVerificationFailed(
                "signature mismatch".into(),
            ))
        });
        gateway.expect_provider_name().return_const("mock");
        gateway
    }

    /// An unpaid order with a grand total of 22200
    async fn unpaid_order(db: &Db) -> Order {
        let line = LinePrice::quote(Decimal::from(20_000), 1, TaxRate::DEFAULT);
        let totals = pricing::calculate([&line], Decimal::ZERO);
        let order = Order::new("user-1", &totals, Decimal::from(11), "JNE", "REG");

        let mut tx = db.begin().await.unwrap();
        SqliteOrdersRepository::new()
            .create_order(&mut tx, &order)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        order
    }

    fn body(order_id: &str, payment_type: &str, status: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "order_id": order_id,
            "status_code": "200",
            "gross_amount": "22200.00",
            "transaction_id": "tx-1",
            "transaction_status": status,
            "payment_type": payment_type,
            "fraud_status": "accept",
            "signature_key": "abc123",
        }))
        .unwrap()
    }

    async fn payments(db: &Db, order_id: &str) -> Vec<Payment> {
        SqliteOrderService::new(db.clone())
            .payments_for_order(order_id)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_settlement_marks_order_paid() -> TestResult {
        let db = migrated_db().await;
        let order = unpaid_order(&db).await;
        let (events, mut received) = OrderEventPublisher::channel(4);
        let reconciler =
            SqlitePaymentReconciler::new(db.clone(), Arc::new(trusting_gateway())).with_events(events);

        let outcome = reconciler
            .handle_notification(&body(&order.id, "bank_transfer", "settlement"))
            .await;

        assert_eq!(outcome, ReconcileOutcome::Paid);

        let stored = SqliteOrderService::new(db.clone()).get_order(&order.id).await?;
        assert!(stored.is_paid());
        assert!(stored.paid_at.is_some());

        let recorded = payments(&db, &order.id).await;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].amount, Decimal::new(2_220_000, 2));
        assert_eq!(recorded[0].transaction_status, "settlement");
        assert_eq!(recorded[0].payload["signature_key"], "abc123");

        match received.recv().await {
            Some(OrderEvent::OrderPaid { order_id, transaction_id, .. }) => {
                assert_eq!(order_id, order.id);
                assert_eq!(transaction_id, "tx-1");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_card_capture_marks_order_paid() -> TestResult {
        let db = migrated_db().await;
        let order = unpaid_order(&db).await;
        let reconciler = SqlitePaymentReconciler::new(db.clone(), Arc::new(trusting_gateway()));

        let outcome = reconciler
            .handle_notification(&body(&order.id, "credit_card", "capture"))
            .await;

        assert_eq!(outcome, ReconcileOutcome::Paid);

        Ok(())
    }

    #[tokio::test]
    async fn test_duplicate_delivery_transitions_once() -> TestResult {
        let db = migrated_db().await;
        let order = unpaid_order(&db).await;
        let (events, mut received) = OrderEventPublisher::channel(4);
        let reconciler =
            SqlitePaymentReconciler::new(db.clone(), Arc::new(trusting_gateway())).with_events(events);
        let notification = body(&order.id, "bank_transfer", "settlement");

        let first = reconciler.handle_notification(&notification).await;
        let paid_at = SqliteOrderService::new(db.clone())
            .get_order(&order.id)
            .await?
            .paid_at;
        let second = reconciler.handle_notification(&notification).await;

        assert_eq!(first, ReconcileOutcome::Paid);
        assert_eq!(second, ReconcileOutcome::AlreadyPaid);
        assert_eq!(payments(&db, &order.id).await.len(), 2);

        let stored = SqliteOrderService::new(db.clone()).get_order(&order.id).await?;
        assert_eq!(stored.paid_at, paid_at);

        drop(reconciler);
        assert!(matches!(received.recv().await, Some(OrderEvent::OrderPaid { .. })));
        assert!(received.recv().await.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_duplicates_transition_once() -> TestResult {
        let db = migrated_db().await;
        let order = unpaid_order(&db).await;
        let reconciler = SqlitePaymentReconciler::new(db.clone(), Arc::new(trusting_gateway()));
        let notification = body(&order.id, "bank_transfer", "settlement");

        let (a, b) = tokio::join!(
            reconciler.handle_notification(&notification),
            reconciler.handle_notification(&notification),
        );

        let mut outcomes = [a, b];
        outcomes.sort_by_key(|outcome| *outcome == ReconcileOutcome::Paid);
        assert_eq!(outcomes, [ReconcileOutcome::AlreadyPaid, ReconcileOutcome::Paid]);
        assert_eq!(payments(&db, &order.id).await.len(), 2);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_duplicates_on_separate_connections_transition_once() -> TestResult {
        let (db, _dir) = file_db().await;
        let order = unpaid_order(&db).await;
        let (events, mut received) = OrderEventPublisher::channel(16);
        let reconciler = Arc::new(
            SqlitePaymentReconciler::new(db.clone(), Arc::new(trusting_gateway())).with_events(events),
        );
        let notification = body(&order.id, "bank_transfer", "settlement");

        let deliveries: Vec<_> = (0..6)
            .map(|_| {
                let reconciler = reconciler.clone();
                let notification = notification.clone();
                tokio::spawn(async move { reconciler.handle_notification(&notification).await })
            })
            .collect();

        let mut outcomes = Vec::new();
        for delivery in deliveries {
            outcomes.push(delivery.await?);
        }

        let paid = outcomes.iter().filter(|o| **o == ReconcileOutcome::Paid).count();
        let already = outcomes
            .iter()
            .filter(|o| **o == ReconcileOutcome::AlreadyPaid)
            .count();
        assert_eq!((paid, already), (1, 5));
        assert_eq!(payments(&db, &order.id).await.len(), 6);

        drop(reconciler);
        assert!(matches!(received.recv().await, Some(OrderEvent::OrderPaid { .. })));
        assert!(received.recv().await.is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_pending_status_is_recorded_only() -> TestResult {
        let db = migrated_db().await;
        let order = unpaid_order(&db).await;
        let reconciler = SqlitePaymentReconciler::new(db.clone(), Arc::new(trusting_gateway()));

        let outcome = reconciler
            .handle_notification(&body(&order.id, "bank_transfer", "pending"))
            .await;

        assert_eq!(outcome, ReconcileOutcome::Recorded);
        let stored = SqliteOrderService::new(db.clone()).get_order(&order.id).await?;
        assert!(!stored.is_paid());
        assert_eq!(payments(&db, &order.id).await.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_bad_signature_changes_nothing() -> TestResult {
        let db = migrated_db().await;
        let order = unpaid_order(&db).await;
        let reconciler = SqlitePaymentReconciler::new(db.clone(), Arc::new(refusing_gateway()));

        let outcome = reconciler
            .handle_notification(&body(&order.id, "bank_transfer", "settlement"))
            .await;

        assert_eq!(outcome, ReconcileOutcome::Rejected);
        let stored = SqliteOrderService::new(db.clone()).get_order(&order.id).await?;
        assert!(!stored.is_paid());
        assert!(payments(&db, &order.id).await.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_order_is_ignored() -> TestResult {
        let db = migrated_db().await;
        let reconciler = SqlitePaymentReconciler::new(db.clone(), Arc::new(trusting_gateway()));

        let outcome = reconciler
            .handle_notification(&body("no-such-order", "bank_transfer", "settlement"))
            .await;

        assert_eq!(outcome, ReconcileOutcome::UnknownOrder);
        assert!(payments(&db, "no-such-order").await.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_body_is_ignored() -> TestResult {
        let db = migrated_db().await;
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_verify_notification().never();
        let reconciler = SqlitePaymentReconciler::new(db, Arc::new(gateway));

        assert_eq!(
            reconciler.handle_notification(b"not json").await,
            ReconcileOutcome::Malformed
        );
        assert_eq!(
            reconciler
                .handle_notification(br#"{"order_id":"order-1","status_code":"200"}"#)
                .await,
            ReconcileOutcome::Malformed
        );

        Ok(())
    }
}
