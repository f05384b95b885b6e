//! # Payment Notifications
//!
//! Decoded gateway notifications and the payment audit record written for
//! each one. Field names follow the gateway's JSON verbatim.

use crate::error::{PaymentError, PaymentResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// `payment_type` value for card payments
pub const PAYMENT_TYPE_CREDIT_CARD: &str = "credit_card";

/// Gateway transaction status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionStatus {
    Capture,
    Settlement,
    Pending,
    Deny,
    Cancel,
    Expire,
    Refund,
    Other(String),
}

impl TransactionStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "capture" => TransactionStatus::Capture,
            "settlement" => TransactionStatus::Settlement,
            "pending" => TransactionStatus::Pending,
            "deny" => TransactionStatus::Deny,
            "cancel" => TransactionStatus::Cancel,
            "expire" => TransactionStatus::Expire,
            "refund" => TransactionStatus::Refund,
            other => TransactionStatus::Other(other.to_string()),
        }
    }
}

/// Gateway fraud screening verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FraudStatus {
    Accept,
    Challenge,
    Deny,
    Other(String),
}

impl FraudStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "accept" => FraudStatus::Accept,
            "challenge" => FraudStatus::Challenge,
            "deny" => FraudStatus::Deny,
            other => FraudStatus::Other(other.to_string()),
        }
    }
}

/// Inbound payment notification
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub status_code: String,
    #[serde(default)]
    pub gross_amount: String,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub transaction_status: String,
    #[serde(default)]
    pub payment_type: String,
    #[serde(default)]
    pub fraud_status: String,
    #[serde(default)]
    pub signature_key: String,
}

impl Notification {
    /// Decode and validate a raw request body.
    pub fn from_slice(body: &[u8]) -> PaymentResult<Self> {
        let notification: Notification = serde_json::from_slice(body)
            .map_err(|e| PaymentError::NotificationParseError(e.to_string()))?;
        notification.validate()?;
        Ok(notification)
    }

    /// Required fields must be present and the amount must parse.
    pub fn validate(&self) -> PaymentResult<()> {
        let required = [
            ("order_id", &self.order_id),
            ("status_code", &self.status_code),
            ("gross_amount", &self.gross_amount),
            ("transaction_status", &self.transaction_status),
            ("signature_key", &self.signature_key),
        ];
        if let Some((field, _)) = required.iter().find(|(_, value)| value.is_empty()) {
            return Err(PaymentError::NotificationParseError(format!(
                "missing field `{field}`"
            )));
        }

        self.amount()?;
        Ok(())
    }

    /// `gross_amount` as a decimal (the gateway sends e.g. `"22200.00"`)
    pub fn amount(&self) -> PaymentResult<Decimal> {
        Decimal::from_str(&self.gross_amount).map_err(|e| {
            PaymentError::NotificationParseError(format!(
                "invalid gross_amount {:?}: {e}",
                self.gross_amount
            ))
        })
    }

    /// The string the gateway signs: `order_id + status_code + gross_amount`
    pub fn signing_payload(&self) -> String {
        format!("{}{}{}", self.order_id, self.status_code, self.gross_amount)
    }

    pub fn transaction_status(&self) -> TransactionStatus {
        TransactionStatus::parse(&self.transaction_status)
    }

    pub fn fraud_status(&self) -> FraudStatus {
        FraudStatus::parse(&self.fraud_status)
    }

    /// Whether this notification settles the order.
    ///
    /// Card payments settle on `capture`, everything else on `settlement`;
    /// both require a fraud verdict of `accept`.
    pub fn is_success(&self) -> bool {
        let expected = if self.payment_type == PAYMENT_TYPE_CREDIT_CARD {
            TransactionStatus::Capture
        } else {
            TransactionStatus::Settlement
        };

        self.transaction_status() == expected && self.fraud_status() == FraudStatus::Accept
    }
}

/// Audit record of one authenticated notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub transaction_id: String,
    pub amount: Decimal,
    pub transaction_status: String,
    pub payment_type: String,

    /// The notification as received
    pub payload: serde_json::Value,

    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Record `notification` against `order_id`
    pub fn from_notification(order_id: &str, notification: &Notification) -> PaymentResult<Self> {
        let payload = serde_json::to_value(notification)
            .map_err(|e| PaymentError::Serialization(e.to_string()))?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            transaction_id: notification.transaction_id.clone(),
            amount: notification.amount()?,
            transaction_status: notification.transaction_status.clone(),
            payment_type: notification.payment_type.clone(),
            payload,
            created_at: Utc::now(),
        })
    }
}
