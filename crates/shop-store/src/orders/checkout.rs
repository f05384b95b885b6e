//! # Checkout Coordinator
//!
//! Turns a priced cart into an order inside a single transaction:
//!
//! ```text
//! BEGIN
//!   INSERT order (unpaid)            ── takes the write lock
//!   INSERT order customer
//!   for each line:
//!     INSERT order item
//!     reserve stock                  ── conditional decrement
//!   create gateway transaction
//!   UPDATE order payment token/url
//! COMMIT
//! delete cart                        ── best effort, outside the transaction
//! ```
//!
//! Any failure before COMMIT drops the transaction, which rolls back every
//! row it wrote, stock decrements included. The whole transaction runs under
//! a timeout; a timed-out checkout rolls back the same way.
//!
//! The write lock is held from the order insert to COMMIT, gateway call
//! included, so other writers wait on the connection's busy timeout. Open the
//! database with [`busy_timeout_for`](crate::database::busy_timeout_for) this
//! checkout's timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockall::automock;
use shop_core::{
    pricing, BoxedPaymentGateway, Cart, Customer, Order, OrderCustomer, OrderItem,
    PaymentError, ShippingAddress, ShippingSelection, TransactionRequest,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    carts::CartStore,
    database::Db,
    events::{OrderEvent, OrderEventPublisher},
    inventory::InventoryLedger,
    orders::{errors::CheckoutError, repository::SqliteOrdersRepository},
};

/// Default bound on a whole checkout, gateway round trip included
pub const DEFAULT_CHECKOUT_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything checkout needs, resolved by the caller
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub cart: Cart,
    pub shipping: Option<ShippingSelection>,
    pub address: ShippingAddress,
    pub customer: Customer,
}

impl CheckoutRequest {
    /// Checkout `cart` with the shipping option stored on it
    pub fn for_cart(cart: Cart, address: ShippingAddress, customer: Customer) -> Self {
        let shipping = cart.shipping.clone();
        Self {
            cart,
            shipping,
            address,
            customer,
        }
    }
}

pub struct SqliteCheckoutCoordinator {
    db: Db,
    gateway: BoxedPaymentGateway,
    carts: Arc<dyn CartStore>,
    events: OrderEventPublisher,
    orders_repository: SqliteOrdersRepository,
    timeout: Duration,
}

impl SqliteCheckoutCoordinator {
    #[must_use]
    pub fn new(db: Db, gateway: BoxedPaymentGateway, carts: Arc<dyn CartStore>) -> Self {
        Self {
            db,
            gateway,
            carts,
            events: OrderEventPublisher::disabled(),
            orders_repository: SqliteOrdersRepository::new(),
            timeout: DEFAULT_CHECKOUT_TIMEOUT,
        }
    }

    /// Builder: publish `OrderPlaced` events
    #[must_use]
    pub fn with_events(mut self, events: OrderEventPublisher) -> Self {
        self.events = events;
        self
    }

    /// Builder: bound the checkout transaction
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Steps 1–7, all or nothing.
    async fn place_order(
        &self,
        request: &CheckoutRequest,
        shipping: &ShippingSelection,
    ) -> Result<Order, CheckoutError> {
        let cart = &request.cart;
        let totals = pricing::calculate(cart.items.iter().map(|item| &item.price), shipping.cost);

        let gross_amount = totals.gross_amount().ok_or_else(|| {
            CheckoutError::PaymentGatewayUnavailable(PaymentError::InvalidRequest(format!(
                "grand total {} does not fit a gateway amount",
                totals.grand_total
            )))
        })?;

        let mut order = Order::new(
            &request.customer.id,
            &totals,
            cart.tax_percent,
            &shipping.courier,
            &shipping.service,
        );

        let mut tx = self.db.begin().await?;

        self.orders_repository.create_order(&mut tx, &order).await?;

        let customer = OrderCustomer {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            user_id: request.customer.id.clone(),
            address: request.address.clone(),
        };
        self.orders_repository
            .create_order_customer(&mut tx, &customer)
            .await?;

        for cart_item in &cart.items {
            let item = OrderItem::from_cart_item(&order.id, cart_item);
            self.orders_repository
                .create_order_item(&mut tx, &item)
                .await?;

            InventoryLedger::reserve_in(&mut tx, &item.product_id, item.quantity()).await?;

            order.items.push(item);
        }

        let link = self
            .gateway
            .create_transaction(&TransactionRequest {
                order_id: order.id.clone(),
                gross_amount,
                customer: request.customer.clone(),
            })
            .await
            .map_err(|e| {
                error!(
                    "Payment gateway {} refused order {}: {}",
                    self.gateway.provider_name(),
                    order.id,
                    e
                );
                CheckoutError::PaymentGatewayUnavailable(e)
            })?;

        self.orders_repository
            .set_payment_link(&mut tx, &order.id, &link.token, &link.redirect_url)
            .await?;

        tx.commit().await?;

        order.payment_token = Some(link.token);
        order.payment_url = Some(link.redirect_url);
        order.customer = Some(customer);

        Ok(order)
    }
}

#[async_trait]
impl CheckoutCoordinator for SqliteCheckoutCoordinator {
    #[instrument(skip(self, request), fields(cart_id = %request.cart.id, user_id = %request.customer.id))]
    async fn checkout(&self, request: CheckoutRequest) -> Result<Order, CheckoutError> {
        if request.cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let Some(shipping) = request.shipping.clone() else {
            return Err(CheckoutError::MissingShipping);
        };

        let order = tokio::time::timeout(self.timeout, self.place_order(&request, &shipping))
            .await
            .map_err(|_| {
                warn!("Checkout timed out after {:?}", self.timeout);
                CheckoutError::TimedOut
            })??;

        info!(
            "Order placed: id={}, code={}, grand_total={}",
            order.id, order.code, order.grand_total
        );

        if let Err(e) = self.carts.delete(&request.cart.id).await {
            warn!(
                "Order {} placed but cart {} was not deleted: {}",
                order.id, request.cart.id, e
            );
        }

        self.events.publish(OrderEvent::OrderPlaced {
            order_id: order.id.clone(),
            code: order.code.clone(),
            user_id: order.user_id.clone(),
            grand_total: order.grand_total,
            payment_url: order.payment_url.clone(),
            at: order.order_date,
        });

        Ok(order)
    }
}

#[automock]
#[async_trait]
pub trait CheckoutCoordinator: Send + Sync {
    /// Converts a cart into a persisted, unpaid order with a payment link.
    async fn checkout(&self, request: CheckoutRequest) -> Result<Order, CheckoutError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carts::{CartError, MockCartStore, SqliteCartStore};
    use crate::orders::{OrderService, SqliteOrderService};
    use crate::test::{address, customer, db_with_products, file_db_with_products, jne_bandung};
    use rust_decimal::Decimal;
    use shop_core::{MockPaymentGateway, PaymentLink, PaymentStatus};
    use sqlx::query_scalar;
    use tempfile::TempDir;
    use testresult::TestResult;

    fn accepting_gateway() -> MockPaymentGateway {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_transaction().returning(|req| {
            Ok(PaymentLink {
                token: format!("tok-{}", req.order_id),
                redirect_url: format!("https://pay.example/{}", req.order_id),
            })
        });
        gateway.expect_provider_name().return_const("mock");
        gateway
    }

    fn failing_gateway() -> MockPaymentGateway {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_transaction()
            .returning(|_| Err(PaymentError::NetworkError("connection reset".into())));
        gateway.expect_provider_name().return_const("mock");
        gateway
    }

    /// Answers with a payment link after `delay`
    struct SlowGateway {
        delay: Duration,
    }

    #[async_trait]
    impl shop_core::PaymentGateway for SlowGateway {
        async fn create_transaction(
            &self,
            request: &TransactionRequest,
        ) -> shop_core::PaymentResult<PaymentLink> {
            tokio::time::sleep(self.delay).await;
            Ok(PaymentLink {
                token: format!("tok-{}", request.order_id),
                redirect_url: format!("https://pay.example/{}", request.order_id),
            })
        }

        fn verify_notification(
            &self,
            _notification: &shop_core::Notification,
        ) -> shop_core::PaymentResult<()> {
            Ok(())
        }

        fn provider_name(&self) -> &'static str {
            "slow"
        }
    }

    struct Fixture {
        db: Db,
        carts: Arc<SqliteCartStore>,
        ledger: InventoryLedger,
        _dir: Option<TempDir>,
    }

    impl Fixture {
        fn with_db(db: Db, dir: Option<TempDir>) -> Self {
            Self {
                carts: Arc::new(SqliteCartStore::new(db.clone())),
                ledger: InventoryLedger::new(db.clone()),
                db,
                _dir: dir,
            }
        }

        async fn new(products: &[(&str, i64, u32)]) -> Self {
            Self::with_db(db_with_products(products).await, None)
        }

        /// Backed by a database file with a multi-connection pool
        async fn on_disk(products: &[(&str, i64, u32)]) -> Self {
            let (db, dir) = file_db_with_products(products).await;
            Self::with_db(db, Some(dir))
        }

        fn coordinator(&self, gateway: MockPaymentGateway) -> SqliteCheckoutCoordinator {
            self.coordinator_with(gateway)
        }

        fn coordinator_with(
            &self,
            gateway: impl shop_core::PaymentGateway + 'static,
        ) -> SqliteCheckoutCoordinator {
            SqliteCheckoutCoordinator::new(self.db.clone(), Arc::new(gateway), self.carts.clone())
        }

        async fn cart(&self, cart_id: &str, lines: &[(&str, i64)]) -> Cart {
            for (product_id, qty) in lines {
                self.carts.add_item(cart_id, product_id, *qty).await.unwrap();
            }
            self.carts.set_shipping(cart_id, jne_bandung()).await.unwrap()
        }

        async fn count(&self, table: &str) -> i64 {
            query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(self.db.pool())
                .await
                .unwrap()
        }
    }

    fn request(cart: Cart, user: &str) -> CheckoutRequest {
        CheckoutRequest::for_cart(cart, address(), customer(user))
    }

    #[tokio::test]
    async fn test_checkout_places_order() -> TestResult {
        let fx = Fixture::new(&[("p-1", 10_000, 5)]).await;
        let cart = fx.cart("cart-1", &[("p-1", 2)]).await;

        let order = fx.coordinator(accepting_gateway()).checkout(request(cart, "user-1")).await?;

        assert_eq!(order.payment_status, PaymentStatus::Unpaid);
        assert_eq!(order.base_total_price, Decimal::from(20_000));
        assert_eq!(order.tax_amount, Decimal::from(2_200));
        assert_eq!(order.shipping_cost, Decimal::from(18_000));
        assert_eq!(order.grand_total, Decimal::from(40_200));
        assert_eq!(order.shipping_courier, "JNE");
        assert_eq!(order.payment_token.as_deref(), Some(format!("tok-{}", order.id).as_str()));
        assert_eq!(order.item_count(), 2);

        assert_eq!(fx.ledger.stock("p-1").await?, 3);

        let stored = SqliteOrderService::new(fx.db.clone()).get_order(&order.id).await?;
        assert_eq!(stored.code, order.code);
        assert_eq!(stored.items.len(), 1);
        assert_eq!(stored.customer.unwrap().address.city, "Bandung");
        assert_eq!(stored.payment_url, order.payment_url);

        // cart and its lines are gone after commit
        assert!(matches!(fx.carts.get("cart-1").await, Err(CartError::CartNotFound)));
        assert_eq!(fx.count("cart_items").await, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_gateway_sees_integer_grand_total() -> TestResult {
        let fx = Fixture::new(&[("p-1", 10_000, 5)]).await;
        let cart = fx.cart("cart-1", &[("p-1", 1)]).await;

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_transaction()
            .withf(|req| {
                req.gross_amount == 29_100
                    && req.customer.email == "user-1@example.com"
                    && !req.order_id.is_empty()
            })
            .times(1)
            .returning(|_| {
                Ok(PaymentLink {
                    token: "tok".into(),
                    redirect_url: "https://pay.example/tok".into(),
                })
            });
        gateway.expect_provider_name().return_const("mock");

        fx.coordinator(gateway).checkout(request(cart, "user-1")).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_everything() -> TestResult {
        let fx = Fixture::new(&[("p-1", 10_000, 5), ("p-2", 5_000, 1)]).await;
        let cart = fx.cart("cart-1", &[("p-1", 1), ("p-2", 1)]).await;

        // stock sold elsewhere between add-to-cart and checkout
        fx.ledger.reserve("p-2", 1).await?;

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_transaction().never();
        let result = fx.coordinator(gateway).checkout(request(cart, "user-1")).await;

        assert!(matches!(
            result,
            Err(CheckoutError::InsufficientStock { ref product_id }) if product_id == "p-2"
        ));
        assert_eq!(fx.ledger.stock("p-1").await?, 5);
        assert_eq!(fx.count("orders").await, 0);
        assert_eq!(fx.count("order_items").await, 0);
        assert_eq!(fx.count("order_customers").await, 0);
        assert_eq!(fx.carts.get("cart-1").await?.items.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_quantity_above_stock_is_refused() -> TestResult {
        let fx = Fixture::new(&[("p-1", 10_000, 1)]).await;
        let mut cart = fx.cart("cart-1", &[("p-1", 1)]).await;

        // a cart line for 2 units against stock 1
        cart.items[0].price = shop_core::LinePrice::quote(
            Decimal::from(10_000),
            2,
            shop_core::TaxRate::DEFAULT,
        );

        let result = fx
            .coordinator(accepting_gateway())
            .checkout(request(cart, "user-1"))
            .await;

        assert!(matches!(result, Err(CheckoutError::InsufficientStock { .. })));
        assert_eq!(fx.ledger.stock("p-1").await?, 1);
        assert_eq!(fx.count("orders").await, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_gateway_failure_rolls_back_stock() -> TestResult {
        let fx = Fixture::new(&[("p-1", 10_000, 5)]).await;
        let cart = fx.cart("cart-1", &[("p-1", 3)]).await;

        let result = fx
            .coordinator(failing_gateway())
            .checkout(request(cart, "user-1"))
            .await;

        assert!(matches!(
            result,
            Err(CheckoutError::PaymentGatewayUnavailable(PaymentError::NetworkError(_)))
        ));
        assert_eq!(fx.ledger.stock("p-1").await?, 5);
        assert_eq!(fx.count("orders").await, 0);
        assert_eq!(fx.carts.get("cart-1").await?.items.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_preconditions_checked_before_any_write() -> TestResult {
        let fx = Fixture::new(&[("p-1", 10_000, 5)]).await;

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_transaction().never();
        let coordinator = fx.coordinator(gateway);

        let empty = fx.carts.get_or_create("empty").await?;
        assert!(matches!(
            coordinator.checkout(request(empty, "user-1")).await,
            Err(CheckoutError::EmptyCart)
        ));

        let unshipped = fx.carts.add_item("unshipped", "p-1", 1).await?;
        assert!(matches!(
            coordinator.checkout(request(unshipped, "user-1")).await,
            Err(CheckoutError::MissingShipping)
        ));

        assert_eq!(fx.count("orders").await, 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_checkouts_for_last_unit() -> TestResult {
        let fx = Fixture::new(&[("p-1", 10_000, 1)]).await;
        let first = fx.cart("cart-a", &[("p-1", 1)]).await;
        let second = fx.cart("cart-b", &[("p-1", 1)]).await;

        let coordinator = fx.coordinator(accepting_gateway());
        let (a, b) = tokio::join!(
            coordinator.checkout(request(first, "user-a")),
            coordinator.checkout(request(second, "user-b")),
        );

        let succeeded = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(succeeded, 1);
        assert!(matches!(
            a.err().or(b.err()),
            Some(CheckoutError::InsufficientStock { .. })
        ));
        assert_eq!(fx.ledger.stock("p-1").await?, 0);
        assert_eq!(fx.count("orders").await, 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_slow_gateway_times_out_and_rolls_back() -> TestResult {
        let fx = Fixture::new(&[("p-1", 10_000, 5)]).await;
        let cart = fx.cart("cart-1", &[("p-1", 2)]).await;

        let coordinator = fx
            .coordinator_with(SlowGateway {
                delay: Duration::from_secs(60),
            })
            .with_timeout(Duration::from_millis(50));

        let result = coordinator.checkout(request(cart, "user-1")).await;

        assert!(matches!(result, Err(CheckoutError::TimedOut)));
        assert_eq!(fx.ledger.stock("p-1").await?, 5);
        assert_eq!(fx.count("orders").await, 0);
        assert_eq!(fx.carts.get("cart-1").await?.items.len(), 1);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_checkouts_on_separate_connections_for_last_unit() -> TestResult {
        let fx = Fixture::on_disk(&[("p-1", 10_000, 1)]).await;
        let coordinator = Arc::new(fx.coordinator(accepting_gateway()));

        let mut attempts = Vec::new();
        for n in 0..4 {
            let cart = fx.cart(&format!("cart-{n}"), &[("p-1", 1)]).await;
            let coordinator = coordinator.clone();
            attempts.push(tokio::spawn(async move {
                coordinator.checkout(request(cart, &format!("user-{n}"))).await
            }));
        }

        let mut placed = 0;
        for attempt in attempts {
            match attempt.await? {
                Ok(_) => placed += 1,
                Err(CheckoutError::InsufficientStock { .. }) => {}
                Err(e) => panic!("checkout failed outright: {e:?}"),
            }
        }

        assert_eq!(placed, 1);
        assert_eq!(fx.ledger.stock("p-1").await?, 0);
        assert_eq!(fx.count("orders").await, 1);
        assert_eq!(fx.count("order_items").await, 1);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_writers_wait_out_a_slow_gateway() -> TestResult {
        let fx = Fixture::on_disk(&[("p-1", 10_000, 1), ("p-2", 5_000, 10)]).await;
        let first = fx.cart("cart-a", &[("p-1", 1)]).await;
        let second = fx.cart("cart-b", &[("p-1", 1)]).await;

        // holds the write lock longer than SQLite's usual few-second wait
        let coordinator = Arc::new(fx.coordinator_with(SlowGateway {
            delay: Duration::from_secs(6),
        }));

        let a = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.checkout(request(first, "user-a")).await }
        });
        tokio::time::sleep(Duration::from_millis(200)).await;
        let b = tokio::spawn({
            let coordinator = coordinator.clone();
            async move { coordinator.checkout(request(second, "user-b")).await }
        });
        tokio::time::sleep(Duration::from_millis(200)).await;

        // an unrelated shopper's cart queues behind the checkout
        let other = fx.carts.add_item("cart-c", "p-2", 2).await?;
        assert_eq!(other.items.len(), 1);

        let placed = a.await??;
        assert_eq!(placed.item_count(), 1);
        assert!(matches!(
            b.await?,
            Err(CheckoutError::InsufficientStock { ref product_id }) if product_id == "p-1"
        ));

        assert_eq!(fx.ledger.stock("p-1").await?, 0);
        assert_eq!(fx.count("orders").await, 1);
        assert!(matches!(fx.carts.get("cart-a").await, Err(CartError::CartNotFound)));
        assert_eq!(fx.carts.get("cart-b").await?.items.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_cart_delete_failure_does_not_fail_checkout() -> TestResult {
        let fx = Fixture::new(&[("p-1", 10_000, 5)]).await;
        let cart = fx.cart("cart-1", &[("p-1", 1)]).await;

        let mut carts = MockCartStore::new();
        carts
            .expect_delete()
            .times(1)
            .returning(|_| Err(CartError::CartNotFound));

        let (events, mut received) = OrderEventPublisher::channel(4);
        let coordinator =
            SqliteCheckoutCoordinator::new(fx.db.clone(), Arc::new(accepting_gateway()), Arc::new(carts))
                .with_events(events);

        let order = coordinator.checkout(request(cart, "user-1")).await?;

        assert_eq!(fx.ledger.stock("p-1").await?, 4);
        match received.recv().await {
            Some(OrderEvent::OrderPlaced { order_id, .. }) => assert_eq!(order_id, order.id),
            other => panic!("unexpected event: {other:?}"),
        }

        Ok(())
    }
}
