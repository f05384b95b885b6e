//! # Order Types
//!
//! Orders, their customer and line snapshots, and the buyer/address data
//! checkout consumes.
//!
//! An order's monetary fields are copied from the cart when it is placed and
//! never recomputed. Its payment status moves one way only:
//!
//! ```text
//! Unpaid ──(accepted settlement/capture)──▶ Paid
//! ```

use crate::cart::CartItem;
use crate::pricing::{LinePrice, Totals};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Days a buyer has to pay before an order is considered overdue
pub const PAYMENT_DUE_DAYS: i64 = 7;

/// Payment state of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    /// Terminal
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// The authenticated buyer, supplied per request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
}

/// Where the order ships to
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub address1: String,
    #[serde(default)]
    pub address2: String,
    pub city: String,
    pub province: String,
    pub phone: String,
    pub email: String,
    pub post_code: String,
}

/// Shipping and contact snapshot stored with an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCustomer {
    pub id: String,
    pub order_id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub address: ShippingAddress,
}

/// Per-line snapshot stored with an order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub name: String,
    pub price: LinePrice,
}

impl OrderItem {
    /// Snapshot a cart line for `order_id`
    pub fn from_cart_item(order_id: &str, item: &CartItem) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            product_id: item.product_id.clone(),
            name: item.product_name.clone(),
            price: item.price.clone(),
        }
    }

    pub fn quantity(&self) -> u32 {
        self.price.quantity
    }
}

/// A placed order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,

    /// Human-readable code (`INV/20260101/1A2B3C4D`)
    pub code: String,

    pub user_id: String,
    pub payment_status: PaymentStatus,
    pub order_date: DateTime<Utc>,
    pub payment_due: DateTime<Utc>,

    pub base_total_price: Decimal,
    pub tax_amount: Decimal,
    pub tax_percent: Decimal,
    pub discount_amount: Decimal,
    pub discount_percent: Decimal,
    pub shipping_cost: Decimal,
    pub grand_total: Decimal,

    pub shipping_courier: String,
    pub shipping_service_name: String,

    /// Gateway transaction token, set once the gateway accepted the order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_token: Option<String>,

    /// Where the buyer is sent to pay
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<OrderCustomer>,

    #[serde(default)]
    pub items: Vec<OrderItem>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// A fresh unpaid order for `user_id` carrying `totals`
    pub fn new(
        user_id: impl Into<String>,
        totals: &Totals,
        tax_percent: Decimal,
        courier: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            code: generate_code(now),
            user_id: user_id.into(),
            payment_status: PaymentStatus::Unpaid,
            order_date: now,
            payment_due: now + Duration::days(PAYMENT_DUE_DAYS),
            base_total_price: totals.base_total,
            tax_amount: totals.tax_total,
            tax_percent,
            discount_amount: totals.discount_total,
            discount_percent: Decimal::ZERO,
            shipping_cost: totals.shipping_cost,
            grand_total: totals.grand_total,
            shipping_courier: courier.into(),
            shipping_service_name: service.into(),
            payment_token: None,
            payment_url: None,
            paid_at: None,
            customer: None,
            items: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn totals(&self) -> Totals {
        Totals {
            base_total: self.base_total_price,
            tax_total: self.tax_amount,
            discount_total: self.discount_amount,
            shipping_cost: self.shipping_cost,
            grand_total: self.grand_total,
        }
    }

    pub fn is_paid(&self) -> bool {
        self.payment_status.is_paid()
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(OrderItem::quantity).sum()
    }
}

/// `INV/<yyyymmdd>/<8 hex chars>`
pub fn generate_code(at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "INV/{}/{}",
        at.format("%Y%m%d"),
        suffix[..8].to_ascii_uppercase()
    )
}
