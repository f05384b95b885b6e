//! Orders Repository

use std::str::FromStr;

use chrono::{DateTime, Utc};
use shop_core::{Order, OrderCustomer, OrderItem, PaymentStatus, ShippingAddress};
use sqlx::{query, query_scalar, sqlite::SqliteRow, Row, Sqlite, Transaction};

use crate::columns::{try_get_decimal, try_get_line_price};

const CREATE_ORDER_SQL: &str = "
    INSERT INTO orders (
        id, code, user_id, payment_status, order_date, payment_due, base_total_price,
        tax_amount, tax_percent, discount_amount, discount_percent, shipping_cost,
        grand_total, shipping_courier, shipping_service_name, payment_token, payment_url,
        paid_at, created_at, updated_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const CREATE_ORDER_CUSTOMER_SQL: &str = "
    INSERT INTO order_customers (
        id, order_id, user_id, first_name, last_name, address1, address2, city,
        province, phone, email, post_code, created_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const CREATE_ORDER_ITEM_SQL: &str = "
    INSERT INTO order_items (
        id, order_id, product_id, name, qty, base_price, base_total, tax_percent,
        tax_amount, discount_percent, discount_amount, sub_total, created_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const SET_PAYMENT_LINK_SQL: &str = "
    UPDATE orders SET payment_token = ?, payment_url = ?, updated_at = ? WHERE id = ?";

const LOCK_ORDER_SQL: &str = "UPDATE orders SET updated_at = updated_at WHERE id = ?";

const GET_PAYMENT_STATUS_SQL: &str = "SELECT payment_status FROM orders WHERE id = ?";

const MARK_PAID_SQL: &str = "
    UPDATE orders
    SET payment_status = 'paid', paid_at = ?, updated_at = ?
    WHERE id = ? AND payment_status = 'unpaid'";

const GET_ORDER_SQL: &str = "
    SELECT id, code, user_id, payment_status, order_date, payment_due, base_total_price,
           tax_amount, tax_percent, discount_amount, discount_percent, shipping_cost,
           grand_total, shipping_courier, shipping_service_name, payment_token, payment_url,
           paid_at, created_at, updated_at
    FROM orders
    WHERE id = ?";

const GET_ORDER_CUSTOMER_SQL: &str = "
    SELECT id, order_id, user_id, first_name, last_name, address1, address2, city,
           province, phone, email, post_code
    FROM order_customers
    WHERE order_id = ?";

const GET_ORDER_ITEMS_SQL: &str = "
    SELECT id, order_id, product_id, name, qty, base_price, base_total, tax_percent,
           tax_amount, discount_percent, discount_amount, sub_total
    FROM order_items
    WHERE order_id = ?
    ORDER BY created_at, id";

#[derive(Debug, Clone, Default)]
pub(crate) struct SqliteOrdersRepository;

impl SqliteOrdersRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn create_order(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        order: &Order,
    ) -> Result<(), sqlx::Error> {
        query(CREATE_ORDER_SQL)
            .bind(&order.id)
            .bind(&order.code)
            .bind(&order.user_id)
            .bind(order.payment_status.as_str())
            .bind(order.order_date)
            .bind(order.payment_due)
            .bind(order.base_total_price.to_string())
            .bind(order.tax_amount.to_string())
            .bind(order.tax_percent.to_string())
            .bind(order.discount_amount.to_string())
            .bind(order.discount_percent.to_string())
            .bind(order.shipping_cost.to_string())
            .bind(order.grand_total.to_string())
            .bind(&order.shipping_courier)
            .bind(&order.shipping_service_name)
            .bind(order.payment_token.as_deref())
            .bind(order.payment_url.as_deref())
            .bind(order.paid_at)
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub(crate) async fn create_order_customer(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        customer: &OrderCustomer,
    ) -> Result<(), sqlx::Error> {
        let address = &customer.address;

        query(CREATE_ORDER_CUSTOMER_SQL)
            .bind(&customer.id)
            .bind(&customer.order_id)
            .bind(&customer.user_id)
            .bind(&address.first_name)
            .bind(&address.last_name)
            .bind(&address.address1)
            .bind(&address.address2)
            .bind(&address.city)
            .bind(&address.province)
            .bind(&address.phone)
            .bind(&address.email)
            .bind(&address.post_code)
            .bind(Utc::now())
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub(crate) async fn create_order_item(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        item: &OrderItem,
    ) -> Result<(), sqlx::Error> {
        let price = &item.price;

        query(CREATE_ORDER_ITEM_SQL)
            .bind(&item.id)
            .bind(&item.order_id)
            .bind(&item.product_id)
            .bind(&item.name)
            .bind(i64::from(price.quantity))
            .bind(price.base_price.to_string())
            .bind(price.base_total.to_string())
            .bind(price.tax_percent.to_string())
            .bind(price.tax_amount.to_string())
            .bind(price.discount_percent.to_string())
            .bind(price.discount_amount.to_string())
            .bind(price.sub_total.to_string())
            .bind(Utc::now())
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    pub(crate) async fn set_payment_link(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        order_id: &str,
        token: &str,
        url: &str,
    ) -> Result<(), sqlx::Error> {
        query(SET_PAYMENT_LINK_SQL)
            .bind(token)
            .bind(url)
            .bind(Utc::now())
            .bind(order_id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Take the write lock on an order row. Returns 0 for an unknown order.
    pub(crate) async fn lock_order(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        order_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(LOCK_ORDER_SQL)
            .bind(order_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    pub(crate) async fn get_payment_status(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        order_id: &str,
    ) -> Result<PaymentStatus, sqlx::Error> {
        let raw: String = query_scalar(GET_PAYMENT_STATUS_SQL)
            .bind(order_id)
            .fetch_one(&mut **tx)
            .await?;

        parse_status(&raw)
    }

    /// Unpaid → Paid. Returns 0 when the order was not unpaid.
    pub(crate) async fn mark_paid(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        order_id: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(MARK_PAID_SQL)
            .bind(paid_at)
            .bind(paid_at)
            .bind(order_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    /// The order with its customer and items.
    pub(crate) async fn find_order(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        order_id: &str,
    ) -> Result<Option<Order>, sqlx::Error> {
        let Some(mut order) = query(GET_ORDER_SQL)
            .bind(order_id)
            .fetch_optional(&mut **tx)
            .await?
            .as_ref()
            .map(map_order)
            .transpose()?
        else {
            return Ok(None);
        };

        order.customer = query(GET_ORDER_CUSTOMER_SQL)
            .bind(order_id)
            .fetch_optional(&mut **tx)
            .await?
            .as_ref()
            .map(map_order_customer)
            .transpose()?;

        order.items = query(GET_ORDER_ITEMS_SQL)
            .bind(order_id)
            .fetch_all(&mut **tx)
            .await?
            .iter()
            .map(map_order_item)
            .collect::<sqlx::Result<_>>()?;

        Ok(Some(order))
    }
}

fn parse_status(raw: &str) -> sqlx::Result<PaymentStatus> {
    PaymentStatus::from_str(raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: "payment_status".to_string(),
        source: e.into(),
    })
}

fn map_order(row: &SqliteRow) -> sqlx::Result<Order> {
    Ok(Order {
        id: row.try_get("id")?,
        code: row.try_get("code")?,
        user_id: row.try_get("user_id")?,
        payment_status: parse_status(row.try_get::<&str, _>("payment_status")?)?,
        order_date: row.try_get("order_date")?,
        payment_due: row.try_get("payment_due")?,
        base_total_price: try_get_decimal(row, "base_total_price")?,
        tax_amount: try_get_decimal(row, "tax_amount")?,
        tax_percent: try_get_decimal(row, "tax_percent")?,
        discount_amount: try_get_decimal(row, "discount_amount")?,
        discount_percent: try_get_decimal(row, "discount_percent")?,
        shipping_cost: try_get_decimal(row, "shipping_cost")?,
        grand_total: try_get_decimal(row, "grand_total")?,
        shipping_courier: row.try_get("shipping_courier")?,
        shipping_service_name: row.try_get("shipping_service_name")?,
        payment_token: row.try_get("payment_token")?,
        payment_url: row.try_get("payment_url")?,
        paid_at: row.try_get("paid_at")?,
        customer: None,
        items: Vec::new(),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_order_customer(row: &SqliteRow) -> sqlx::Result<OrderCustomer> {
    Ok(OrderCustomer {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        user_id: row.try_get("user_id")?,
        address: ShippingAddress {
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            address1: row.try_get("address1")?,
            address2: row.try_get("address2")?,
            city: row.try_get("city")?,
            province: row.try_get("province")?,
            phone: row.try_get("phone")?,
            email: row.try_get("email")?,
            post_code: row.try_get("post_code")?,
        },
    })
}

fn map_order_item(row: &SqliteRow) -> sqlx::Result<OrderItem> {
    Ok(OrderItem {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        product_id: row.try_get("product_id")?,
        name: row.try_get("name")?,
        price: try_get_line_price(row)?,
    })
}
