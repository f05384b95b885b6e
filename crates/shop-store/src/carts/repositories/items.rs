//! Cart Items Repository

use chrono::Utc;
use shop_core::{CartItem, LinePrice};
use sqlx::{query, sqlite::SqliteRow, Row, Sqlite, Transaction};

use crate::columns::try_get_line_price;

const CART_ITEM_COLUMNS: &str = "
    id, cart_id, product_id, product_name, qty, base_price, base_total, tax_percent,
    tax_amount, discount_percent, discount_amount, sub_total, created_at, updated_at";

const CREATE_CART_ITEM_SQL: &str = "
    INSERT INTO cart_items (
        id, cart_id, product_id, product_name, qty, base_price, base_total, tax_percent,
        tax_amount, discount_percent, discount_amount, sub_total, created_at, updated_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)";

const REPRICE_CART_ITEM_SQL: &str = "
    UPDATE cart_items
    SET product_name = ?, qty = ?, base_price = ?, base_total = ?, tax_percent = ?,
        tax_amount = ?, discount_percent = ?, discount_amount = ?, sub_total = ?,
        updated_at = ?
    WHERE id = ?";

const DELETE_CART_ITEM_SQL: &str = "DELETE FROM cart_items WHERE id = ? AND cart_id = ?";

const DELETE_CART_ITEMS_SQL: &str = "DELETE FROM cart_items WHERE cart_id = ?";

#[derive(Debug, Clone, Default)]
pub(crate) struct SqliteCartItemsRepository;

impl SqliteCartItemsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn get_cart_items(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        cart_id: &str,
    ) -> Result<Vec<CartItem>, sqlx::Error> {
        let sql = format!(
            "SELECT {CART_ITEM_COLUMNS} FROM cart_items WHERE cart_id = ? ORDER BY created_at, id"
        );

        query(&sql)
            .bind(cart_id)
            .fetch_all(&mut **tx)
            .await?
            .iter()
            .map(map_cart_item)
            .collect()
    }

    pub(crate) async fn find_cart_item(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        cart_id: &str,
        item_id: &str,
    ) -> Result<Option<CartItem>, sqlx::Error> {
        let sql = format!("SELECT {CART_ITEM_COLUMNS} FROM cart_items WHERE id = ? AND cart_id = ?");

        query(&sql)
            .bind(item_id)
            .bind(cart_id)
            .fetch_optional(&mut **tx)
            .await?
            .as_ref()
            .map(map_cart_item)
            .transpose()
    }

    pub(crate) async fn find_by_product(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        cart_id: &str,
        product_id: &str,
    ) -> Result<Option<CartItem>, sqlx::Error> {
        let sql = format!(
            "SELECT {CART_ITEM_COLUMNS} FROM cart_items WHERE cart_id = ? AND product_id = ?"
        );

        query(&sql)
            .bind(cart_id)
            .bind(product_id)
            .fetch_optional(&mut **tx)
            .await?
            .as_ref()
            .map(map_cart_item)
            .transpose()
    }

    pub(crate) async fn create_cart_item(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        item: &CartItem,
    ) -> Result<(), sqlx::Error> {
        let price = &item.price;

        query(CREATE_CART_ITEM_SQL)
            .bind(&item.id)
            .bind(&item.cart_id)
            .bind(&item.product_id)
            .bind(&item.product_name)
            .bind(i64::from(price.quantity))
            .bind(price.base_price.to_string())
            .bind(price.base_total.to_string())
            .bind(price.tax_percent.to_string())
            .bind(price.tax_amount.to_string())
            .bind(price.discount_percent.to_string())
            .bind(price.discount_amount.to_string())
            .bind(price.sub_total.to_string())
            .bind(item.created_at)
            .bind(item.updated_at)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Replace a line's quantity and price snapshot.
    pub(crate) async fn reprice_cart_item(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        item_id: &str,
        product_name: &str,
        price: &LinePrice,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(REPRICE_CART_ITEM_SQL)
            .bind(product_name)
            .bind(i64::from(price.quantity))
            .bind(price.base_price.to_string())
            .bind(price.base_total.to_string())
            .bind(price.tax_percent.to_string())
            .bind(price.tax_amount.to_string())
            .bind(price.discount_percent.to_string())
            .bind(price.discount_amount.to_string())
            .bind(price.sub_total.to_string())
            .bind(Utc::now())
            .bind(item_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    pub(crate) async fn delete_cart_item(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        cart_id: &str,
        item_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(DELETE_CART_ITEM_SQL)
            .bind(item_id)
            .bind(cart_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }

    pub(crate) async fn delete_cart_items(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        cart_id: &str,
    ) -> Result<u64, sqlx::Error> {
        let rows_affected = query(DELETE_CART_ITEMS_SQL)
            .bind(cart_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }
}

fn map_cart_item(row: &SqliteRow) -> sqlx::Result<CartItem> {
    Ok(CartItem {
        id: row.try_get("id")?,
        cart_id: row.try_get("cart_id")?,
        product_id: row.try_get("product_id")?,
        product_name: row.try_get("product_name")?,
        price: try_get_line_price(row)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
