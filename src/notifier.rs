// =============================================================================
// Notifier Port
// =============================================================================
//
// `send(contact, body) -> ok | Throttled | TransportError` (spec §6). Ships a
// `WebhookNotifier` grounded on the teacher's `BinanceClient` reqwest idiom
// (builder with a fixed timeout, a named `base_url`), and a
// `RecordingNotifier` test double in the style of the teacher's in-memory
// `PositionManager`.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::errors::{EngineError, EngineResult};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, contact: &str, body: &str) -> EngineResult<()>;
}

/// Posts the rendered message body to a downstream webhook (e.g. a WhatsApp
/// gateway). The webhook's own delivery semantics are out of scope; this
/// notifier only reports whether the HTTP request to the gateway succeeded.
#[derive(Clone)]
pub struct WebhookNotifier {
    endpoint: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let endpoint = endpoint.into();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");
        debug!(endpoint, "WebhookNotifier initialised");
        Self { endpoint, client }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, contact: &str, body: &str) -> EngineResult<()> {
        let payload = serde_json::json!({ "contact": contact, "body": body });
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| EngineError::TransportError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            warn!(contact, %status, "notifier webhook returned non-success status");
            Err(EngineError::TransportError(format!("webhook returned {status}")))
        }
    }
}

/// Test double that records every send instead of performing I/O.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail_for: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self { sent: Mutex::new(Vec::new()), fail_for: Mutex::new(Vec::new()) }
    }

    /// Makes subsequent `send` calls to `contact` fail with a `TransportError`.
    pub fn fail_for(&self, contact: impl Into<String>) {
        self.fail_for.lock().push(contact.into());
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, contact: &str, body: &str) -> EngineResult<()> {
        if self.fail_for.lock().iter().any(|c| c == contact) {
            return Err(EngineError::TransportError(format!("simulated failure for {contact}")));
        }
        self.sent.lock().push((contact.to_string(), body.to_string()));
        Ok(())
    }
}
