//! # Application State
//!
//! Shared state for the Axum application.
//! Holds the storefront services behind their traits, the shipping table
//! and configuration.

use std::{net::SocketAddr, str::FromStr, sync::Arc, time::Duration};

use rust_decimal::Decimal;
use shop_core::{BoxedPaymentGateway, ProductCatalog, ShippingRates, TaxRate};
use shop_store::{
    busy_timeout_for, CartStore, CatalogService, CheckoutCoordinator, Db, OrderEventPublisher, OrderService,
    PaymentReconciler, SqliteCartStore, SqliteCatalogService, SqliteCheckoutCoordinator,
    SqliteOrderService, SqlitePaymentReconciler, DEFAULT_CHECKOUT_TIMEOUT,
};
use tracing::{info, warn};

const DEFAULT_DATABASE_URL: &str = "sqlite://storefront.db";

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public base URL
    pub base_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// SQLite connection URL
    pub database_url: String,
    /// Bound on a whole checkout
    pub checkout_timeout: Duration,
    /// Tax applied to new cart lines
    pub tax_rate: TaxRate,
    /// Where order events are POSTed, if anywhere
    pub event_forward_url: Option<String>,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            checkout_timeout: std::env::var("CHECKOUT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map_or(DEFAULT_CHECKOUT_TIMEOUT, Duration::from_secs),
            tax_rate: std::env::var("TAX_PERCENT")
                .ok()
                .and_then(|s| Decimal::from_str(&s).ok())
                .map_or(TaxRate::DEFAULT, TaxRate::percent),
            event_forward_url: std::env::var("EVENT_FORWARD_URL")
                .ok()
                .filter(|url| !url.is_empty()),
        }
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    /// How long a database writer waits for the lock. Checkout holds it
    /// through the gateway call, so this outlasts `checkout_timeout`.
    pub fn db_busy_timeout(&self) -> Duration {
        busy_timeout_for(self.checkout_timeout)
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub carts: Arc<dyn CartStore>,
    pub catalog: Arc<dyn CatalogService>,
    pub checkout: Arc<dyn CheckoutCoordinator>,
    pub orders: Arc<dyn OrderService>,
    pub reconciler: Arc<dyn PaymentReconciler>,
    pub shipping: Arc<ShippingRates>,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Wire the SQLite-backed services around one database and gateway
    pub fn new(
        config: AppConfig,
        db: Db,
        gateway: BoxedPaymentGateway,
        shipping: ShippingRates,
        events: OrderEventPublisher,
    ) -> Self {
        let carts: Arc<dyn CartStore> =
            Arc::new(SqliteCartStore::with_tax_rate(db.clone(), config.tax_rate));

        let checkout = SqliteCheckoutCoordinator::new(db.clone(), gateway.clone(), carts.clone())
            .with_events(events.clone())
            .with_timeout(config.checkout_timeout);

        let reconciler = SqlitePaymentReconciler::new(db.clone(), gateway).with_events(events);

        Self {
            carts,
            catalog: Arc::new(SqliteCatalogService::new(db.clone())),
            checkout: Arc::new(checkout),
            orders: Arc::new(SqliteOrderService::new(db)),
            reconciler: Arc::new(reconciler),
            shipping: Arc::new(shipping),
            config,
        }
    }
}

/// Config file locations tried in order, relative to the working directory
fn config_paths(file: &str) -> [String; 3] {
    [
        format!("config/{file}"),
        format!("../config/{file}"),
        format!("../../config/{file}"),
    ]
}

/// Load product catalog from config file
pub fn load_product_catalog() -> anyhow::Result<ProductCatalog> {
    for path in config_paths("products.toml") {
        if let Ok(content) = std::fs::read_to_string(&path) {
            let catalog = ProductCatalog::from_toml(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
            info!("Loaded {} products from {}", catalog.products.len(), path);
            return Ok(catalog);
        }
    }

    warn!("No product catalog found, nothing to seed");
    Ok(ProductCatalog::new())
}

/// Load the shipping table from config file, falling back to the built-in one
pub fn load_shipping_rates() -> anyhow::Result<ShippingRates> {
    for path in config_paths("shipping.toml") {
        if let Ok(content) = std::fs::read_to_string(&path) {
            let rates = ShippingRates::from_toml(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
            info!("Loaded shipping rates for {:?} from {}", rates.couriers(), path);
            return Ok(rates);
        }
    }

    info!("No shipping table found, using built-in rates");
    ShippingRates::builtin().map_err(|e| anyhow::anyhow!("Built-in shipping table: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AppConfig {
        AppConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            environment: "test".to_string(),
            database_url: "sqlite::memory:".to_string(),
            checkout_timeout: DEFAULT_CHECKOUT_TIMEOUT,
            tax_rate: TaxRate::DEFAULT,
            event_forward_url: None,
        }
    }

    #[test]
    fn test_socket_addr() {
        let addr = config().socket_addr().unwrap();
        assert_eq!(addr.to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn test_invalid_socket_addr() {
        let config = AppConfig {
            host: "not a host".to_string(),
            ..config()
        };
        assert!(config.socket_addr().is_err());
    }

    #[test]
    fn test_db_lock_wait_covers_checkout() {
        let slow_config = AppConfig {
            checkout_timeout: Duration::from_secs(90),
            ..config()
        };
        assert!(slow_config.db_busy_timeout() > Duration::from_secs(90));
        assert!(config().db_busy_timeout() > DEFAULT_CHECKOUT_TIMEOUT);
    }

    #[test]
    fn test_is_production() {
        assert!(!config().is_production());
        assert!(AppConfig {
            environment: "production".to_string(),
            ..config()
        }
        .is_production());
    }
}
