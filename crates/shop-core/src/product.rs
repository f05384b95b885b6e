//! # Product Types
//!
//! Products as the order core sees them: a price and a stock count.
//! The initial catalog is loaded from `config/products.toml`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A product in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier
    pub id: String,

    /// Stock keeping unit
    #[serde(default)]
    pub sku: String,

    /// Display name
    pub name: String,

    /// URL slug
    pub slug: String,

    /// Unit price
    pub price: Decimal,

    /// Units on hand. Only the inventory ledger decrements this.
    #[serde(default)]
    pub stock: u32,

    /// Shipping weight in grams
    #[serde(default)]
    pub weight: Decimal,
}

impl Product {
    /// Create a product with the fields the order core needs
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        price: Decimal,
        stock: u32,
    ) -> Self {
        let id = id.into();
        let name = name.into();
        Self {
            slug: slugify(&name),
            sku: id.clone(),
            id,
            name,
            price,
            stock,
            weight: Decimal::ZERO,
        }
    }

    /// Builder: set SKU
    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = sku.into();
        self
    }

    /// Builder: set weight
    pub fn with_weight(mut self, weight: Decimal) -> Self {
        self.weight = weight;
        self
    }

    /// Whether `quantity` units could be taken from the current stock snapshot
    pub fn has_stock_for(&self, quantity: u32) -> bool {
        quantity <= self.stock
    }
}

fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}

/// Product catalog (loaded from config)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductCatalog {
    pub products: Vec<Product>,
}

impl ProductCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self {
            products: Vec::new(),
        }
    }

    /// Add a product to the catalog
    pub fn add(&mut self, product: Product) {
        self.products.push(product);
    }

    /// Find a product by ID
    pub fn get(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    /// Load catalog from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}
