//! # Midtrans Snap
//!
//! Snap transaction API client. Checkout registers each order here and sends
//! the buyer to the returned hosted payment page.

use crate::config::MidtransConfig;
use crate::signature;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use shop_core::{
    Notification, PaymentError, PaymentGateway, PaymentLink, PaymentResult, TransactionRequest,
};
use std::time::Duration;
use tracing::{debug, error, info, instrument};

const PROVIDER: &str = "midtrans";

/// Midtrans Snap payment gateway
pub struct MidtransSnapGateway {
    config: MidtransConfig,
    client: Client,
}

impl MidtransSnapGateway {
    /// Create a new Snap gateway
    pub fn new(config: MidtransConfig) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PaymentError::Configuration(format!("HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> PaymentResult<Self> {
        let config = MidtransConfig::from_env()?;
        Self::new(config)
    }

    pub fn config(&self) -> &MidtransConfig {
        &self.config
    }

    fn build_request(request: &TransactionRequest) -> SnapTransactionRequest<'_> {
        SnapTransactionRequest {
            transaction_details: SnapTransactionDetails {
                order_id: &request.order_id,
                gross_amount: request.gross_amount,
            },
            customer_details: SnapCustomerDetails {
                first_name: &request.customer.first_name,
                last_name: &request.customer.last_name,
                email: &request.customer.email,
            },
        }
    }
}

#[async_trait]
impl PaymentGateway for MidtransSnapGateway {
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_transaction(&self, request: &TransactionRequest) -> PaymentResult<PaymentLink> {
        if request.gross_amount <= 0 {
            return Err(PaymentError::InvalidRequest(format!(
                "gross_amount must be positive, got {}",
                request.gross_amount
            )));
        }

        let url = self.config.transactions_url();
        debug!(
            "Creating Snap transaction: gross_amount={}",
            request.gross_amount
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.server_key, None::<&str>)
            .header("Accept", "application/json")
            .json(&Self::build_request(request))
            .send()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PaymentError::NetworkError(e.to_string()))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(PaymentError::RateLimited {
                provider: PROVIDER.to_string(),
                retry_after_secs: 60,
            });
        }

        if !status.is_success() {
            error!("Midtrans API error: status={}, body={}", status, body);

            if let Ok(error_response) = serde_json::from_str::<SnapErrorResponse>(&body) {
                if !error_response.error_messages.is_empty() {
                    return Err(PaymentError::ProviderError {
                        provider: PROVIDER.to_string(),
                        message: error_response.error_messages.join("; "),
                    });
                }
            }

            return Err(PaymentError::ProviderError {
                provider: PROVIDER.to_string(),
                message: format!("HTTP {}: {}", status, body),
            });
        }

        let snap: SnapTransactionResponse = serde_json::from_str(&body).map_err(|e| {
            PaymentError::Serialization(format!("Failed to parse Snap response: {}", e))
        })?;

        info!("Created Snap transaction: redirect_url={}", snap.redirect_url);

        Ok(PaymentLink {
            token: snap.token,
            redirect_url: snap.redirect_url,
        })
    }

    fn verify_notification(&self, notification: &Notification) -> PaymentResult<()> {
        signature::verify_signature(notification, &self.config.server_key)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

// =============================================================================
// Snap API Types
// =============================================================================

#[derive(Debug, Serialize)]
struct SnapTransactionRequest<'a> {
    transaction_details: SnapTransactionDetails<'a>,
    customer_details: SnapCustomerDetails<'a>,
}

#[derive(Debug, Serialize)]
struct SnapTransactionDetails<'a> {
    order_id: &'a str,
    gross_amount: i64,
}

#[derive(Debug, Serialize)]
struct SnapCustomerDetails<'a> {
    first_name: &'a str,
    last_name: &'a str,
    email: &'a str,
}

#[derive(Debug, Deserialize)]
struct SnapTransactionResponse {
    token: String,
    redirect_url: String,
}

#[derive(Debug, Deserialize)]
struct SnapErrorResponse {
    #[serde(default)]
    error_messages: Vec<String>,
}
