//! Products Repository

use chrono::Utc;
use shop_core::Product;
use sqlx::{query, sqlite::SqliteRow, Row, Sqlite, Transaction};

use crate::columns::{try_get_decimal, try_get_u32};

const PRODUCT_COLUMNS: &str = "id, sku, name, slug, price, stock, weight";

const INSERT_PRODUCT_IF_ABSENT_SQL: &str = "
    INSERT INTO products (id, sku, name, slug, price, stock, weight, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (id) DO NOTHING";

#[derive(Debug, Clone, Default)]
pub(crate) struct SqliteProductsRepository;

impl SqliteProductsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn find_product(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        id: &str,
    ) -> Result<Option<Product>, sqlx::Error> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?");

        query(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .as_ref()
            .map(map_product)
            .transpose()
    }

    pub(crate) async fn list_products(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
    ) -> Result<Vec<Product>, sqlx::Error> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY name");

        query(&sql)
            .fetch_all(&mut **tx)
            .await?
            .iter()
            .map(map_product)
            .collect()
    }

    /// Insert `product` unless a product with its id exists. Existing rows,
    /// and their stock, are left alone.
    pub(crate) async fn insert_if_absent(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        product: &Product,
    ) -> Result<u64, sqlx::Error> {
        let now = Utc::now();

        let rows_affected = query(INSERT_PRODUCT_IF_ABSENT_SQL)
            .bind(&product.id)
            .bind(&product.sku)
            .bind(&product.name)
            .bind(&product.slug)
            .bind(product.price.to_string())
            .bind(i64::from(product.stock))
            .bind(product.weight.to_string())
            .bind(now)
            .bind(now)
            .execute(&mut **tx)
            .await?
            .rows_affected();

        Ok(rows_affected)
    }
}

fn map_product(row: &SqliteRow) -> sqlx::Result<Product> {
    Ok(Product {
        id: row.try_get("id")?,
        sku: row.try_get("sku")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        price: try_get_decimal(row, "price")?,
        stock: try_get_u32(row, "stock")?,
        weight: try_get_decimal(row, "weight")?,
    })
}
