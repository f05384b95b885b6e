//! # Cart Types
//!
//! A cart's aggregate columns are a cache of [`pricing::calculate`] over its
//! lines and shipping cost. They are never edited independently.

use crate::pricing::{self, LinePrice, Totals};
use crate::shipping::ShippingSelection;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A line in a cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: String,
    pub cart_id: String,
    pub product_id: String,

    /// Product name (denormalized for display and order snapshots)
    pub product_name: String,

    /// Price snapshot taken when the line was last priced
    pub price: LinePrice,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    pub fn quantity(&self) -> u32 {
        self.price.quantity
    }
}

/// A shopping cart with its cached totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    /// Opaque identifier, stable per session/user
    pub id: String,

    /// Lines, oldest first
    pub items: Vec<CartItem>,

    pub base_total_price: Decimal,
    pub tax_amount: Decimal,
    pub tax_percent: Decimal,
    pub discount_amount: Decimal,
    pub discount_percent: Decimal,
    pub shipping_cost: Decimal,
    pub grand_total: Decimal,

    /// Selected shipping option, if the buyer has picked one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping: Option<ShippingSelection>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// The cached aggregates as a [`Totals`] value
    pub fn totals(&self) -> Totals {
        Totals {
            base_total: self.base_total_price,
            tax_total: self.tax_amount,
            discount_total: self.discount_amount,
            shipping_cost: self.shipping_cost,
            grand_total: self.grand_total,
        }
    }

    /// Totals re-derived from the current lines and shipping cost
    pub fn recompute(&self) -> Totals {
        pricing::calculate(self.items.iter().map(|item| &item.price), self.shipping_cost)
    }

    /// Write `totals` into the cached aggregate fields
    pub fn apply_totals(&mut self, totals: Totals) {
        self.base_total_price = totals.base_total;
        self.tax_amount = totals.tax_total;
        self.discount_amount = totals.discount_total;
        self.shipping_cost = totals.shipping_cost;
        self.grand_total = totals.grand_total;
    }

    /// Find the line for a product
    pub fn item_for_product(&self, product_id: &str) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total units across all lines
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(CartItem::quantity).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::TaxRate;

    fn cart_with(lines: &[(u32, u32)], shipping: u32) -> Cart {
        let now = Utc::now();
        let items = lines
            .iter()
            .enumerate()
            .map(|(i, (price, qty))| CartItem {
                id: format!("item-{i}"),
                cart_id: "cart-1".to_string(),
                product_id: format!("p-{i}"),
                product_name: format!("Product {i}"),
                price: LinePrice::quote(Decimal::from(*price), *qty, TaxRate::DEFAULT),
                created_at: now,
                updated_at: now,
            })
            .collect();

        Cart {
            id: "cart-1".to_string(),
            items,
            base_total_price: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            tax_percent: TaxRate::DEFAULT.as_percent(),
            discount_amount: Decimal::ZERO,
            discount_percent: Decimal::ZERO,
            shipping_cost: Decimal::from(shipping),
            grand_total: Decimal::ZERO,
            shipping: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_recompute_and_apply() {
        let mut cart = cart_with(&[(10_000, 2), (2_500, 4)], 11_000);

        let totals = cart.recompute();
        cart.apply_totals(totals);

        assert_eq!(cart.base_total_price, Decimal::from(30_000));
        assert_eq!(cart.tax_amount, Decimal::from(3_300));
        assert_eq!(cart.grand_total, Decimal::from(44_300));
        assert_eq!(cart.totals(), cart.recompute());
        assert_eq!(cart.item_count(), 6);
    }

    #[test]
    fn test_item_for_product() {
        let cart = cart_with(&[(1_000, 1)], 0);

        assert!(cart.item_for_product("p-0").is_some());
        assert!(cart.item_for_product("p-9").is_none());
        assert!(!cart.is_empty());
    }
}
