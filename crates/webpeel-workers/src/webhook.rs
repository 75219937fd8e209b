//! Best-effort webhook delivery.
//!
//! Deliveries use a short timeout and swallow failures: a dead webhook
//! endpoint must never affect job or watch processing.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Payload posted to webhook URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    /// `started`, `page`, `completed`, `failed`, `cancelled` or
    /// `watch.changed`.
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl WebhookEvent {
    pub fn job(event: &str, job_id: &str, data: Option<serde_json::Value>) -> Self {
        Self {
            event: event.to_string(),
            job_id: Some(job_id.to_string()),
            data,
        }
    }

    pub fn watch_changed(data: serde_json::Value) -> Self {
        Self {
            event: "watch.changed".to_string(),
            job_id: None,
            data: Some(data),
        }
    }
}

/// Fire-and-forget webhook sender.
pub struct WebhookNotifier {
    client: reqwest::Client,
}

impl Default for WebhookNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookNotifier {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Deliver an event. Failures are logged with the URL and swallowed.
    pub async fn deliver(&self, url: &str, event: &WebhookEvent) {
        match self.client.post(url).json(event).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(url, event = %event.event, "webhook delivered");
            }
            Ok(response) => {
                warn!(url, status = response.status().as_u16(), event = %event.event, "webhook rejected");
            }
            Err(e) => {
                warn!(url, error = %e, event = %event.event, "webhook delivery failed");
            }
        }
    }

    /// Deliver when a URL is configured; no-op otherwise.
    pub async fn deliver_if_configured(&self, url: Option<&str>, event: &WebhookEvent) {
        if let Some(url) = url {
            self.deliver(url, event).await;
        }
    }
}
