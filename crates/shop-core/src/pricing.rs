//! # Pricing
//!
//! Pure price arithmetic for cart lines and cart totals.
//!
//! A line is priced once, when it enters the cart or its quantity changes,
//! and the resulting [`LinePrice`] snapshot is what gets persisted. Totals are
//! always re-derived from those snapshots plus the shipping fee:
//!
//! ```text
//! grand_total = Σ base_total + Σ tax_amount − Σ discount_amount + shipping_fee
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of decimal places kept for money columns
pub const MONEY_SCALE: u32 = 2;

/// Flat tax rate expressed as a percentage (11 means 11%)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRate {
    percent: Decimal,
}

impl TaxRate {
    /// Default VAT applied to every line
    pub const DEFAULT: TaxRate = TaxRate {
        percent: Decimal::from_parts(11, 0, 0, false, 0),
    };

    /// Create a rate from a percentage
    pub fn percent(percent: Decimal) -> Self {
        Self { percent }
    }

    /// The percentage (e.g. `11`)
    pub fn as_percent(&self) -> Decimal {
        self.percent
    }

    /// The multiplier (e.g. `0.11`)
    pub fn as_fraction(&self) -> Decimal {
        self.percent / Decimal::ONE_HUNDRED
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Price snapshot of a single cart or order line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePrice {
    /// Unit price at the time the line was priced
    pub base_price: Decimal,
    pub quantity: u32,
    /// `base_price × quantity`
    pub base_total: Decimal,
    pub tax_percent: Decimal,
    pub tax_amount: Decimal,
    pub discount_percent: Decimal,
    pub discount_amount: Decimal,
    /// `base_total + tax_amount − discount_amount`
    pub sub_total: Decimal,
}

impl LinePrice {
    /// Price `quantity` units at `base_price` under `tax`.
    pub fn quote(base_price: Decimal, quantity: u32, tax: TaxRate) -> Self {
        let base_total = base_price * Decimal::from(quantity);
        let tax_amount = round_money(base_total * tax.as_fraction());
        let discount_amount = Decimal::ZERO;

        Self {
            base_price,
            quantity,
            base_total,
            tax_percent: tax.as_percent(),
            tax_amount,
            discount_percent: Decimal::ZERO,
            discount_amount,
            sub_total: base_total + tax_amount - discount_amount,
        }
    }
}

/// Aggregates derived from a set of lines and a shipping fee
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub base_total: Decimal,
    pub tax_total: Decimal,
    pub discount_total: Decimal,
    pub shipping_cost: Decimal,
    pub grand_total: Decimal,
}

impl Totals {
    /// Amount sent to the payment gateway: the integer part of the grand total.
    pub fn gross_amount(&self) -> Option<i64> {
        self.grand_total.trunc().to_i64()
    }
}

/// Compute cart totals from line snapshots and a shipping fee.
pub fn calculate<'a, I>(lines: I, shipping_fee: Decimal) -> Totals
where
    I: IntoIterator<Item = &'a LinePrice>,
{
    let mut totals = Totals {
        shipping_cost: shipping_fee,
        ..Totals::default()
    };

    for line in lines {
        totals.base_total += line.base_total;
        totals.tax_total += line.tax_amount;
        totals.discount_total += line.discount_amount;
    }

    totals.grand_total =
        totals.base_total + totals.tax_total - totals.discount_total + totals.shipping_cost;
    totals
}

/// Round to [`MONEY_SCALE`] places, midpoint away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}
