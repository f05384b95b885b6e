//! # Storefront
//!
//! Cart, checkout and payment reconciliation service.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export API_MIDTRANS_SERVER_KEY=SB-Mid-server-...
//! export MIDTRANS_ENVIRONMENT=sandbox
//! export DATABASE_URL=sqlite://storefront.db
//!
//! # Run the server
//! storefront
//! ```

use std::sync::Arc;

use shop_api::{
    routes,
    state::{load_product_catalog, load_shipping_rates, AppConfig, AppState},
    EventForwarder,
};
use shop_midtrans::MidtransSnapGateway;
use shop_store::{CatalogService, Db, OrderEventPublisher, SqliteCatalogService, DEFAULT_EVENT_BUFFER};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env();
    let addr = config.socket_addr()?;

    info!("Environment: {}", config.environment);

    let db = Db::connect_with_busy_timeout(&config.database_url, config.db_busy_timeout()).await?;
    db.migrate().await?;
    info!("Database ready: {}", config.database_url);

    let catalog = load_product_catalog()?;
    SqliteCatalogService::new(db.clone()).seed(&catalog).await?;

    let shipping = load_shipping_rates()?;

    let gateway = MidtransSnapGateway::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to initialize Midtrans: {}", e))?;
    info!(
        "Midtrans environment: {}",
        gateway.config().environment.as_str()
    );

    let events = match &config.event_forward_url {
        Some(url) => {
            let (publisher, receiver) = OrderEventPublisher::channel(DEFAULT_EVENT_BUFFER);
            tokio::spawn(EventForwarder::new(url.as_str())?.run(receiver));
            publisher
        }
        None => OrderEventPublisher::disabled(),
    };

    let is_prod = config.is_production();
    let state = AppState::new(config, db, Arc::new(gateway), shipping, events);
    let app = routes::create_router(state);

    info!("Storefront starting on http://{}", addr);

    if !is_prod {
        info!("Checkout: POST http://{}/api/v1/checkout", addr);
        info!("Notifications: POST http://{}/payments/midtrans", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// `LOG_FORMAT=json` switches to structured output
fn init_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
}
