//! # Order Events
//!
//! Side channel for things that happen after a commit (order placed, order
//! paid). Publishing never blocks and never fails the caller: if nobody is
//! listening or the buffer is full the event is logged and dropped.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

/// Default buffer between publishers and the forwarder
pub const DEFAULT_EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    OrderPlaced {
        order_id: String,
        code: String,
        user_id: String,
        grand_total: Decimal,
        #[serde(skip_serializing_if = "Option::is_none")]
        payment_url: Option<String>,
        at: DateTime<Utc>,
    },
    OrderPaid {
        order_id: String,
        transaction_id: String,
        payment_type: String,
        at: DateTime<Utc>,
    },
}

impl OrderEvent {
    pub fn order_id(&self) -> &str {
        match self {
            OrderEvent::OrderPlaced { order_id, .. } | OrderEvent::OrderPaid { order_id, .. } => {
                order_id
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced { .. } => "order_placed",
            OrderEvent::OrderPaid { .. } => "order_paid",
        }
    }
}

/// Sending half of the event channel
#[derive(Debug, Clone, Default)]
pub struct OrderEventPublisher {
    sender: Option<mpsc::Sender<OrderEvent>>,
}

impl OrderEventPublisher {
    /// A publisher and the receiver its events arrive on
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<OrderEvent>) {
        let (sender, receiver) = mpsc::channel(buffer);
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// A publisher that drops everything
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn publish(&self, event: OrderEvent) {
        let Some(sender) = &self.sender else {
            return;
        };

        if let Err(e) = sender.try_send(event) {
            let event = match &e {
                mpsc::error::TrySendError::Full(event)
                | mpsc::error::TrySendError::Closed(event) => event,
            };
            warn!(
                "Dropping {} event for order {}: {}",
                event.kind(),
                event.order_id(),
                e
            );
        }
    }
}
