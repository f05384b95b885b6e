//! Carts Repository

use chrono::Utc;
use rust_decimal::Decimal;
use shop_core::{Cart, ShippingSelection, Totals};
use sqlx::{query, sqlite::SqliteRow, Row, Sqlite, Transaction};

use crate::columns::try_get_decimal;

const CREATE_CART_IF_ABSENT_SQL: &str = "
    INSERT INTO carts (id, tax_percent, created_at, updated_at)
    VALUES (?, ?, ?, ?)
    ON CONFLICT (id) DO UPDATE SET updated_at = excluded.updated_at";

const TOUCH_CART_SQL: &str = "UPDATE carts SET updated_at = ? WHERE id = ?";

const GET_CART_SQL: &str = "
    SELECT id, base_total_price, tax_amount, tax_percent, discount_amount,
           discount_percent, shipping_cost, grand_total, shipping_courier,
           shipping_service, shipping_province, shipping_city, created_at, updated_at
    FROM carts
    WHERE id = ?";

const SAVE_TOTALS_SQL: &str = "
    UPDATE carts
    SET base_total_price = ?, tax_amount = ?, discount_amount = ?,
        shipping_cost = ?, grand_total = ?, updated_at = ?
    WHERE id = ?";

const SET_SHIPPING_SQL: &str = "
    UPDATE carts
    SET shipping_courier = ?, shipping_service = ?, shipping_province = ?,
        shipping_city = ?, shipping_cost = ?, updated_at = ?
    WHERE id = ?";

const DELETE_CART_SQL: &str = "DELETE FROM carts WHERE id = ?";

#[derive(Debug, Clone, Default)]
pub(crate) struct SqliteCartsRepository;

impl SqliteCartsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    /// Create the cart if it does not exist, otherwise bump `updated_at`.
    /// Either way the statement is a write, so it takes the write lock.
    pub(crate) async fn create_or_touch(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        cart_id: &str,
        tax_percent: Decimal,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now();

        query(CREATE_CART_IF_ABSENT_SQL)
            .bind(cart_id)
            .bind(tax_percent.to_string())
            .bind(now)
            .bind(now)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Bump `updated_at`; returns 0 for an unknown cart.
    pub(crate) async fn touch(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        cart_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(TOUCH_CART_SQL)
            .bind(Utc::now())
            .bind(cart_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    /// The cart row without its items.
    pub(crate) async fn find_cart(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        cart_id: &str,
    ) -> Result<Option<Cart>, sqlx::Error> {
        query(GET_CART_SQL)
            .bind(cart_id)
            .fetch_optional(&mut **tx)
            .await?
            .as_ref()
            .map(map_cart)
            .transpose()
    }

    pub(crate) async fn save_totals(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        cart_id: &str,
        totals: &Totals,
    ) -> Result<(), sqlx::Error> {
        query(SAVE_TOTALS_SQL)
            .bind(totals.base_total.to_string())
            .bind(totals.tax_total.to_string())
            .bind(totals.discount_total.to_string())
            .bind(totals.shipping_cost.to_string())
            .bind(totals.grand_total.to_string())
            .bind(Utc::now())
            .bind(cart_id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Store (or with `None`, drop) the shipping selection and its cost.
    pub(crate) async fn set_shipping(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        cart_id: &str,
        selection: Option<&ShippingSelection>,
    ) -> Result<(), sqlx::Error> {
        let cost = selection.map_or(Decimal::ZERO, |s| s.cost);

        query(SET_SHIPPING_SQL)
            .bind(selection.map(|s| s.courier.as_str()))
            .bind(selection.map(|s| s.service.as_str()))
            .bind(selection.map(|s| s.province.as_str()))
            .bind(selection.map(|s| s.city.as_str()))
            .bind(cost.to_string())
            .bind(Utc::now())
            .bind(cart_id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Delete the cart row; its lines go with it (`ON DELETE CASCADE`).
    /// Returns 0 for an unknown cart.
    pub(crate) async fn delete_cart(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        cart_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(DELETE_CART_SQL)
            .bind(cart_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }
}

fn map_cart(row: &SqliteRow) -> sqlx::Result<Cart> {
    let shipping_cost = try_get_decimal(row, "shipping_cost")?;

    let courier: Option<String> = row.try_get("shipping_courier")?;
    let shipping = match courier {
        Some(courier) => Some(ShippingSelection {
            courier,
            service: row
                .try_get::<Option<String>, _>("shipping_service")?
                .unwrap_or_default(),
            province: row
                .try_get::<Option<String>, _>("shipping_province")?
                .unwrap_or_default(),
            city: row
                .try_get::<Option<String>, _>("shipping_city")?
                .unwrap_or_default(),
            cost: shipping_cost,
        }),
        None => None,
    };

    Ok(Cart {
        id: row.try_get("id")?,
        items: Vec::new(),
        base_total_price: try_get_decimal(row, "base_total_price")?,
        tax_amount: try_get_decimal(row, "tax_amount")?,
        tax_percent: try_get_decimal(row, "tax_percent")?,
        discount_amount: try_get_decimal(row, "discount_amount")?,
        discount_percent: try_get_decimal(row, "discount_percent")?,
        shipping_cost,
        grand_total: try_get_decimal(row, "grand_total")?,
        shipping,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
