//! Row decoding helpers shared by the repositories.

use std::str::FromStr;

use rust_decimal::Decimal;
use shop_core::LinePrice;
use sqlx::{sqlite::SqliteRow, Row};

/// Decode a decimal stored as TEXT.
pub(crate) fn try_get_decimal(row: &SqliteRow, column: &str) -> sqlx::Result<Decimal> {
    let raw: String = row.try_get(column)?;

    Decimal::from_str(&raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

/// Decode a non-negative integer column into `u32`.
pub(crate) fn try_get_u32(row: &SqliteRow, column: &str) -> sqlx::Result<u32> {
    let raw: i64 = row.try_get(column)?;

    u32::try_from(raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

/// Decode the price snapshot columns shared by `cart_items` and `order_items`.
pub(crate) fn try_get_line_price(row: &SqliteRow) -> sqlx::Result<LinePrice> {
    Ok(LinePrice {
        base_price: try_get_decimal(row, "base_price")?,
        quantity: try_get_u32(row, "qty")?,
        base_total: try_get_decimal(row, "base_total")?,
        tax_percent: try_get_decimal(row, "tax_percent")?,
        tax_amount: try_get_decimal(row, "tax_amount")?,
        discount_percent: try_get_decimal(row, "discount_percent")?,
        discount_amount: try_get_decimal(row, "discount_amount")?,
        sub_total: try_get_decimal(row, "sub_total")?,
    })
}
