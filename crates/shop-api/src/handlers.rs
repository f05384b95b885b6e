//! # Request Handlers
//!
//! Axum request handlers for the storefront API.
//!
//! Identity is established upstream; handlers read it from the `x-user-*`
//! headers. Each user has a single cart keyed by their user id.

use axum::{
    body::Bytes,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shop_core::{
    Cart, Customer, Order, Product, ShippingAddress, ShippingSelection, DEFAULT_SERVICE,
};
use shop_store::CheckoutRequest;
use tracing::{info, instrument};

use crate::{error::ApiError, state::AppState};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_FIRST_NAME_HEADER: &str = "x-user-first-name";
pub const USER_LAST_NAME_HEADER: &str = "x-user-last-name";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

// =============================================================================
// Request/Response Types
// =============================================================================

/// Caller identity forwarded by the auth proxy
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub Customer);

impl AuthenticatedUser {
    pub fn id(&self) -> &str {
        &self.0.id
    }

    /// The user's cart id
    pub fn cart_id(&self) -> &str {
        &self.0.id
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .unwrap_or_default()
                .to_string()
        };

        let id = header(USER_ID_HEADER);
        if id.is_empty() {
            return Err(ApiError::Unauthenticated);
        }

        Ok(Self(Customer {
            id,
            first_name: header(USER_FIRST_NAME_HEADER),
            last_name: header(USER_LAST_NAME_HEADER),
            email: header(USER_EMAIL_HEADER),
        }))
    }
}

/// Add to cart request
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub qty: i64,
}

fn default_quantity() -> i64 {
    1
}

/// Change quantity request; zero or less removes the line
#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub qty: i64,
}

/// Shipping route, as a query string or a JSON body
#[derive(Debug, Deserialize)]
pub struct ShippingRouteRequest {
    pub courier: String,
    #[serde(default)]
    pub service: Option<String>,
    pub province: String,
    pub city: String,
}

/// Checkout request
#[derive(Debug, Deserialize)]
pub struct CreateCheckoutRequest {
    pub address: ShippingAddress,
}

/// Checkout response
#[derive(Debug, Serialize)]
pub struct CreateCheckoutResponse {
    pub order_id: String,
    pub code: String,
    pub grand_total: Decimal,
    /// Payment page token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_token: Option<String>,
    /// Payment page URL (redirect user here)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
}

impl From<Order> for CreateCheckoutResponse {
    fn from(order: Order) -> Self {
        Self {
            order_id: order.id,
            code: order.code,
            grand_total: order.grand_total,
            payment_token: order.payment_token,
            payment_url: order.payment_url,
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "storefront",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Get products list
pub async fn list_products(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let products = state.catalog.list_products().await?;
    Ok(Json(serde_json::json!({
        "count": products.len(),
        "products": products,
    })))
}

/// Get single product
pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(state.catalog.get_product(&product_id).await?))
}

/// View the caller's cart, creating it on first use
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Cart>, ApiError> {
    Ok(Json(state.carts.get_or_create(user.cart_id()).await?))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn add_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<AddItemRequest>,
) -> Result<Json<Cart>, ApiError> {
    let cart = state
        .carts
        .add_item(user.cart_id(), &request.product_id, request.qty)
        .await?;
    Ok(Json(cart))
}

#[instrument(skip(state, user), fields(user_id = %user.id()))]
pub async fn update_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(item_id): Path<String>,
    Json(request): Json<UpdateItemRequest>,
) -> Result<Json<Cart>, ApiError> {
    let cart = state
        .carts
        .update_qty(user.cart_id(), &item_id, request.qty)
        .await?;
    Ok(Json(cart))
}

pub async fn remove_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(item_id): Path<String>,
) -> Result<Json<Cart>, ApiError> {
    Ok(Json(state.carts.remove_item(user.cart_id(), &item_id).await?))
}

pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Cart>, ApiError> {
    Ok(Json(state.carts.clear(user.cart_id()).await?))
}

fn quote_route(state: &AppState, route: &ShippingRouteRequest) -> Result<ShippingSelection, ApiError> {
    state
        .shipping
        .quote(
            &route.courier,
            route.service.as_deref(),
            &route.province,
            &route.city,
        )
        .ok_or_else(|| ApiError::ShippingRouteNotFound {
            courier: route.courier.clone(),
            service: route
                .service
                .clone()
                .unwrap_or_else(|| DEFAULT_SERVICE.to_string()),
            province: route.province.clone(),
            city: route.city.clone(),
        })
}

/// Price a shipping route without touching the cart
pub async fn shipping_quote(
    State(state): State<AppState>,
    Query(route): Query<ShippingRouteRequest>,
) -> Result<Json<ShippingSelection>, ApiError> {
    Ok(Json(quote_route(&state, &route)?))
}

/// Select a shipping route for the caller's cart
pub async fn select_shipping(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(route): Json<ShippingRouteRequest>,
) -> Result<Json<Cart>, ApiError> {
    let selection = quote_route(&state, &route)?;
    Ok(Json(state.carts.set_shipping(user.cart_id(), selection).await?))
}

/// Place an order for the caller's cart
#[instrument(skip(state, user, request), fields(user_id = %user.id()))]
pub async fn create_checkout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateCheckoutRequest>,
) -> Result<(StatusCode, Json<CreateCheckoutResponse>), ApiError> {
    let cart = state.carts.get_or_create(user.cart_id()).await?;

    let order = state
        .checkout
        .checkout(CheckoutRequest::for_cart(cart, request.address, user.0))
        .await?;

    info!("Checkout created order {} ({})", order.id, order.code);

    Ok((StatusCode::CREATED, Json(order.into())))
}

/// View one of the caller's orders
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order = state.orders.get_order(&order_id).await?;
    if order.user_id != user.id() {
        return Err(ApiError::OrderNotFound);
    }

    Ok(Json(order))
}

/// Midtrans payment notification.
///
/// Always acknowledged: the gateway retries anything else, and every outcome
/// is already logged by the reconciler.
pub async fn midtrans_notification(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let outcome = state.reconciler.handle_notification(&body).await;
    tracing::debug!("Midtrans notification handled: {:?}", outcome);

    (StatusCode::OK, "OK")
}
