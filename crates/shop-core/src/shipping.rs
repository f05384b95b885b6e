//! # Shipping
//!
//! Flat shipping rate table keyed by courier, province and city, plus the
//! selection a buyer makes from it. Rates are loaded from
//! `config/shipping.toml`, falling back to the table compiled into this
//! crate:
//!
//! ```toml
//! services = ["REG", "OKE", "YES"]
//!
//! [rates.JNE."DKI Jakarta"]
//! "Jakarta Selatan" = 12000
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const BUILTIN_RATES: &str = include_str!("../data/shipping.toml");

/// Service name used when the buyer does not pick one
pub const DEFAULT_SERVICE: &str = "REG";

/// A shipping option chosen for a cart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingSelection {
    /// Courier code (e.g. "JNE")
    pub courier: String,

    /// Courier service level (e.g. "REG")
    #[serde(default = "default_service")]
    pub service: String,

    pub province: String,
    pub city: String,

    /// Fee for this route
    pub cost: Decimal,
}

fn default_service() -> String {
    DEFAULT_SERVICE.to_string()
}

/// Courier → province → city → fee
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShippingRates {
    /// Offered service levels
    #[serde(default)]
    pub services: Vec<String>,

    #[serde(default)]
    rates: HashMap<String, HashMap<String, HashMap<String, Decimal>>>,
}

impl ShippingRates {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a single route
    pub fn with_rate(
        mut self,
        courier: impl Into<String>,
        province: impl Into<String>,
        city: impl Into<String>,
        cost: Decimal,
    ) -> Self {
        self.rates
            .entry(courier.into())
            .or_default()
            .entry(province.into())
            .or_default()
            .insert(city.into(), cost);
        self
    }

    /// Load the table from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// The JNE/TIKI/POS table shipped with the crate
    pub fn builtin() -> Result<Self, toml::de::Error> {
        Self::from_toml(BUILTIN_RATES)
    }

    /// Look up the fee for a route
    pub fn rate(&self, courier: &str, province: &str, city: &str) -> Option<Decimal> {
        self.rates.get(courier)?.get(province)?.get(city).copied()
    }

    /// Whether a service level is offered. An empty list offers any service.
    pub fn offers_service(&self, service: &str) -> bool {
        self.services.is_empty() || self.services.iter().any(|s| s == service)
    }

    /// Build a [`ShippingSelection`] for a route, if the route is served.
    /// Zero-cost routes and unoffered service levels are treated as unserved.
    pub fn quote(
        &self,
        courier: &str,
        service: Option<&str>,
        province: &str,
        city: &str,
    ) -> Option<ShippingSelection> {
        let service = service.unwrap_or(DEFAULT_SERVICE);
        if !self.offers_service(service) {
            return None;
        }

        let cost = self.rate(courier, province, city)?;
        if cost <= Decimal::ZERO {
            return None;
        }

        Some(ShippingSelection {
            courier: courier.to_string(),
            service: service.to_string(),
            province: province.to_string(),
            city: city.to_string(),
            cost,
        })
    }

    /// Known couriers
    pub fn couriers(&self) -> Vec<&str> {
        let mut couriers: Vec<&str> = self.rates.keys().map(String::as_str).collect();
        couriers.sort_unstable();
        couriers
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}
