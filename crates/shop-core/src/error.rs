//! # Payment Gateway Errors
//!
//! Typed error handling for calls into the payment gateway.
//! Every gateway operation returns `Result<T, PaymentError>`.

use thiserror::Error;

/// Error type for payment gateway operations
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Configuration errors (missing keys, invalid environment)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Request rejected before it reached the provider
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Provider answered with an error
    #[error("Provider error [{provider}]: {message}")]
    ProviderError { provider: String, message: String },

    /// Network/HTTP error communicating with the provider
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Notification signature did not match
    #[error("Notification verification failed: {0}")]
    NotificationVerificationFailed(String),

    /// Notification payload could not be decoded or is incomplete
    #[error("Notification parse error: {0}")]
    NotificationParseError(String),

    /// Rate limited by provider
    #[error("Rate limited by {provider}, retry after {retry_after_secs} seconds")]
    RateLimited {
        provider: String,
        retry_after_secs: u64,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PaymentError {
    /// Returns true if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PaymentError::NetworkError(_)
                | PaymentError::RateLimited { .. }
                | PaymentError::ProviderError { .. }
        )
    }
}

/// Result type alias for payment gateway operations
pub type PaymentResult<T> = Result<T, PaymentError>;
