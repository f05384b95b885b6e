//! # Routes
//!
//! Axum router configuration for the storefront API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Catalog:
///   - GET  /api/v1/products
///   - GET  /api/v1/products/{product_id}
///
/// - Cart (caller identified by `x-user-*` headers):
///   - GET    /api/v1/cart
///   - DELETE /api/v1/cart
///   - POST   /api/v1/cart/items
///   - PATCH  /api/v1/cart/items/{item_id}
///   - DELETE /api/v1/cart/items/{item_id}
///   - PUT    /api/v1/cart/shipping
///
/// - Shipping:
///   - GET /api/v1/shipping/quote?courier=&province=&city=
///
/// - Orders:
///   - POST /api/v1/checkout
///   - GET  /api/v1/orders/{order_id}
///
/// - Payment notifications:
///   - POST /payments/midtrans
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let cart_routes = Router::new()
        .route("/", get(handlers::get_cart).delete(handlers::clear_cart))
        .route("/items", post(handlers::add_item))
        .route(
            "/items/{item_id}",
            patch(handlers::update_item).delete(handlers::remove_item),
        )
        .route("/shipping", put(handlers::select_shipping));

    let api_routes = Router::new()
        .route("/products", get(handlers::list_products))
        .route("/products/{product_id}", get(handlers::get_product))
        .route("/shipping/quote", get(handlers::shipping_quote))
        .route("/checkout", post(handlers::create_checkout))
        .route("/orders/{order_id}", get(handlers::get_order))
        .nest("/cart", cart_routes);

    // Gateway callbacks: raw body, no CORS
    let payment_routes = Router::new().route("/midtrans", post(handlers::midtrans_notification));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api/v1", api_routes.layer(cors))
        .nest("/payments", payment_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
