//! # API Errors
//!
//! Maps store errors onto HTTP statuses. Storage failures are logged here and
//! answered with a generic message.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shop_core::PaymentError;
use shop_store::{CartError, CatalogError, CheckoutError, OrderError};
use thiserror::Error;
use tracing::error;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing user identity")]
    Unauthenticated,

    #[error("no {courier} {service} shipping route to {city}, {province}")]
    ShippingRouteNotFound {
        courier: String,
        service: String,
        province: String,
        city: String,
    },

    #[error("order not found")]
    OrderNotFound,

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    #[error(transparent)]
    Order(#[from] OrderError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::ShippingRouteNotFound { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::OrderNotFound => StatusCode::NOT_FOUND,
            Self::Cart(e) => match e {
                CartError::CartNotFound
                | CartError::CartItemNotFound
                | CartError::ProductNotFound => StatusCode::NOT_FOUND,
                CartError::InvalidQuantity => StatusCode::BAD_REQUEST,
                CartError::InsufficientStock { .. } => StatusCode::CONFLICT,
                CartError::Sql(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Catalog(e) => match e {
                CatalogError::NotFound => StatusCode::NOT_FOUND,
                CatalogError::InvalidData | CatalogError::Sql(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Checkout(e) => match e {
                CheckoutError::EmptyCart | CheckoutError::MissingShipping => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                CheckoutError::InsufficientStock { .. } => StatusCode::CONFLICT,
                CheckoutError::PaymentGatewayUnavailable(e) if e.is_retryable() => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                CheckoutError::PaymentGatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
                CheckoutError::TimedOut => StatusCode::GATEWAY_TIMEOUT,
                CheckoutError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Order(e) => match e {
                OrderError::NotFound => StatusCode::NOT_FOUND,
                OrderError::Sql(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {:?}", self);
            let body = ErrorResponse::new("internal server error", status.as_u16());
            return (status, Json(body)).into_response();
        }

        let body = ErrorResponse::new(self.to_string(), status.as_u16());
        match &self {
            Self::Checkout(CheckoutError::PaymentGatewayUnavailable(e)) => {
                let body = body.with_details(e.to_string());
                match e {
                    PaymentError::RateLimited {
                        retry_after_secs, ..
                    } => (
                        status,
                        [(header::RETRY_AFTER, retry_after_secs.to_string())],
                        Json(body),
                    )
                        .into_response(),
                    _ => (status, Json(body)).into_response(),
                }
            }
            _ => (status, Json(body)).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use testresult::TestResult;

    #[test]
    fn test_error_response() {
        let err = ErrorResponse::new("Test error", 400).with_details("more");
        assert_eq!(err.error, "Test error");
        assert_eq!(err.code, 400);
        assert_eq!(err.details.as_deref(), Some("more"));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::Unauthenticated.status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::ShippingRouteNotFound {
                courier: "JNE".into(),
                service: "REG".into(),
                province: "Bali".into(),
                city: "Nowhere".into(),
            }
            .status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from(CartError::InsufficientStock {
                product_id: "p-1".into(),
                requested: 2,
                available: 1,
            })
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(CheckoutError::EmptyCart).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from(CheckoutError::TimedOut).status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            ApiError::from(OrderError::NotFound).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_gateway_errors_split_on_retryability() {
        let unavailable = |e: PaymentError| {
            ApiError::from(CheckoutError::PaymentGatewayUnavailable(e)).status_code()
        };

        assert_eq!(
            unavailable(PaymentError::NetworkError("reset".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            unavailable(PaymentError::ProviderError {
                provider: "midtrans".into(),
                message: "down".into(),
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            unavailable(PaymentError::InvalidRequest("gross_amount".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            unavailable(PaymentError::Configuration("server key".into())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn test_rate_limited_checkout_sets_retry_after() -> TestResult {
        let response = ApiError::from(CheckoutError::PaymentGatewayUnavailable(
            PaymentError::RateLimited {
                provider: "midtrans".into(),
                retry_after_secs: 30,
            },
        ))
        .into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "30");

        let body = body_json(response).await?;
        assert_eq!(body["details"], "Rate limited by midtrans, retry after 30 seconds");

        Ok(())
    }

    #[tokio::test]
    async fn test_timeout_keeps_its_message() -> TestResult {
        let response = ApiError::from(CheckoutError::TimedOut).into_response();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        let body = body_json(response).await?;
        assert_eq!(body["error"], "checkout timed out");
        assert_eq!(body["code"], 504);

        Ok(())
    }

    #[tokio::test]
    async fn test_storage_errors_do_not_leak() -> TestResult {
        let response = ApiError::from(CartError::Sql(sqlx_error())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await?;
        assert_eq!(body["error"], "internal server error");
        assert!(body.get("details").is_none());

        Ok(())
    }

    async fn body_json(response: Response) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn sqlx_error() -> shop_store::database::SqlxError {
        shop_store::database::SqlxError::PoolTimedOut
    }
}
