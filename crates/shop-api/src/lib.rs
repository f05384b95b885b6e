//! # shop-api
//!
//! HTTP API layer for the storefront order core.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - REST endpoints for carts, shipping, checkout and orders
//! - The Midtrans payment notification endpoint
//! - A forwarder that relays order events to an external URL
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/api/v1/products` | List products |
//! | GET | `/api/v1/cart` | View cart |
//! | POST | `/api/v1/cart/items` | Add to cart |
//! | PATCH | `/api/v1/cart/items/{item_id}` | Change quantity |
//! | DELETE | `/api/v1/cart/items/{item_id}` | Remove line |
//! | DELETE | `/api/v1/cart` | Clear cart |
//! | GET | `/api/v1/shipping/quote` | Price a shipping route |
//! | PUT | `/api/v1/cart/shipping` | Select shipping |
//! | POST | `/api/v1/checkout` | Place order |
//! | GET | `/api/v1/orders/{order_id}` | View order |
//! | POST | `/payments/midtrans` | Payment notification |

pub mod error;
pub mod forwarder;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{ApiError, ErrorResponse};
pub use forwarder::EventForwarder;
pub use routes::create_router;
pub use state::{AppConfig, AppState};
