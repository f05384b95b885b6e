//! # Event Forwarder
//!
//! Drains the order event channel and POSTs each event as JSON to an
//! external URL. Delivery is retried a few times with doubling backoff, then
//! dropped. Nothing here can affect order or payment state.

use std::time::Duration;

use shop_store::OrderEvent;
use tokio::sync::mpsc::Receiver;
use tracing::{debug, error, info, warn};

const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct EventForwarder {
    client: reqwest::Client,
    url: String,
    max_attempts: u32,
    backoff: Duration,
}

impl EventForwarder {
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        })
    }

    /// Builder: retry policy
    pub fn with_retries(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    /// Forward events until every publisher is gone.
    pub async fn run(self, mut events: Receiver<OrderEvent>) {
        info!("Forwarding order events to {}", self.url);

        while let Some(event) = events.recv().await {
            self.forward(&event).await;
        }

        debug!("Event channel closed, forwarder stopping");
    }

    /// Deliver one event. Returns whether it was accepted.
    pub async fn forward(&self, event: &OrderEvent) -> bool {
        let mut delay = self.backoff;

        for attempt in 1..=self.max_attempts {
            match self.client.post(&self.url).json(event).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(
                        "Forwarded {} for order {} (attempt {})",
                        event.kind(),
                        event.order_id(),
                        attempt
                    );
                    return true;
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    warn!(
                        "Event endpoint answered {} for {} (attempt {}/{}): {}",
                        status,
                        event.kind(),
                        attempt,
                        self.max_attempts,
                        body
                    );
                }
                Err(e) => {
                    warn!(
                        "Failed to forward {} (attempt {}/{}): {}",
                        event.kind(),
                        attempt,
                        self.max_attempts,
                        e
                    );
                }
            }

            if attempt < self.max_attempts {
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }

        error!(
            "Giving up on {} event for order {}",
            event.kind(),
            event.order_id()
        );
        false
    }
}
