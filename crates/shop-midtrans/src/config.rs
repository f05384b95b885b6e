//! # Midtrans Configuration
//!
//! Configuration management for the Midtrans integration.
//! All secrets are loaded from environment variables.

use shop_core::PaymentError;
use std::env;
use std::fmt;
use std::str::FromStr;

const SANDBOX_BASE_URL: &str = "https://app.sandbox.midtrans.com";
const PRODUCTION_BASE_URL: &str = "https://app.midtrans.com";

/// Which Midtrans deployment to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MidtransEnvironment {
    #[default]
    Sandbox,
    Production,
}

impl MidtransEnvironment {
    pub fn as_str(&self) -> &'static str {
        match self {
            MidtransEnvironment::Sandbox => "sandbox",
            MidtransEnvironment::Production => "production",
        }
    }

    /// Snap base URL for this environment
    pub fn base_url(&self) -> &'static str {
        match self {
            MidtransEnvironment::Sandbox => SANDBOX_BASE_URL,
            MidtransEnvironment::Production => PRODUCTION_BASE_URL,
        }
    }
}

impl fmt::Display for MidtransEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MidtransEnvironment {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sandbox" | "development" => Ok(MidtransEnvironment::Sandbox),
            "production" => Ok(MidtransEnvironment::Production),
            other => Err(PaymentError::Configuration(format!(
                "MIDTRANS_ENVIRONMENT must be sandbox or production, got {other:?}"
            ))),
        }
    }
}

/// Midtrans API configuration
#[derive(Clone)]
pub struct MidtransConfig {
    /// Server key, used for API auth and notification signatures
    pub server_key: String,

    /// Client key (handed to the frontend Snap.js, never used server side)
    pub client_key: Option<String>,

    pub environment: MidtransEnvironment,

    /// API base URL (overridable for testing)
    pub api_base_url: String,
}

impl fmt::Debug for MidtransConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MidtransConfig")
            .field("server_key", &"<redacted>")
            .field("client_key", &self.client_key)
            .field("environment", &self.environment)
            .field("api_base_url", &self.api_base_url)
            .finish()
    }
}

impl MidtransConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `API_MIDTRANS_SERVER_KEY`
    ///
    /// Optional:
    /// - `API_MIDTRANS_CLIENT_KEY`
    /// - `MIDTRANS_ENVIRONMENT` (`sandbox` | `production`, default sandbox)
    pub fn from_env() -> Result<Self, PaymentError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let server_key = env::var("API_MIDTRANS_SERVER_KEY").map_err(|_| {
            PaymentError::Configuration("API_MIDTRANS_SERVER_KEY not set".to_string())
        })?;

        let client_key = env::var("API_MIDTRANS_CLIENT_KEY").ok();

        let environment = match env::var("MIDTRANS_ENVIRONMENT") {
            Ok(value) => value.parse()?,
            Err(_) => MidtransEnvironment::Sandbox,
        };

        let config = Self {
            server_key,
            client_key,
            environment,
            api_base_url: environment.base_url().to_string(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Create config with explicit values (for testing)
    pub fn new(server_key: impl Into<String>, environment: MidtransEnvironment) -> Self {
        Self {
            server_key: server_key.into(),
            client_key: None,
            environment,
            api_base_url: environment.base_url().to_string(),
        }
    }

    /// Reject empty keys and sandbox keys pointed at production
    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.server_key.trim().is_empty() {
            return Err(PaymentError::Configuration(
                "API_MIDTRANS_SERVER_KEY is empty".to_string(),
            ));
        }

        if self.environment == MidtransEnvironment::Production && self.is_sandbox_key() {
            return Err(PaymentError::Configuration(
                "sandbox server key (SB-...) cannot be used in production".to_string(),
            ));
        }

        Ok(())
    }

    /// Sandbox keys carry an `SB-` prefix
    pub fn is_sandbox_key(&self) -> bool {
        self.server_key.starts_with("SB-")
    }

    /// Snap transaction endpoint
    pub fn transactions_url(&self) -> String {
        format!(
            "{}/snap/v1/transactions",
            self.api_base_url.trim_end_matches('/')
        )
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Builder: set client key
    pub fn with_client_key(mut self, key: impl Into<String>) -> Self {
        self.client_key = Some(key.into());
        self
    }
}
