use super::{Notifier, PushNotification};
use crate::config::WebhookConfig;
use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, warn};

pub const SIGNATURE_HEADER: &str = "X-Tagwatch-Signature";

pub struct WebhookNotifier {
    url: String,
    secret: Option<String>,
    client: Client,
}

impl WebhookNotifier {
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        if !config.enabled {
            return Err(anyhow!("Webhook notifier is disabled"));
        }

        let url = config
            .url
            .clone()
            .ok_or_else(|| anyhow!("Webhook URL is required"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            url,
            secret: config.secret.clone(),
            client,
        })
    }

    /// `sha256=<hex>` over secret followed by body
    fn generate_signature(&self, payload: &str) -> Option<String> {
        self.secret.as_ref().map(|secret| {
            let mut hasher = Sha256::new();
            hasher.update(secret.as_bytes());
            hasher.update(payload.as_bytes());
            format!("sha256={}", hex::encode(hasher.finalize()))
        })
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, payload: &PushNotification) -> Result<()> {
        let body = serde_json::to_string(payload).context("Failed to serialize payload")?;

        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json");

        if let Some(signature) = self.generate_signature(&body) {
            request = request.header(SIGNATURE_HEADER, signature);
        }

        let response = request
            .body(body)
            .send()
            .await
            .context("HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            warn!("Webhook {} returned status {}", self.url, status);
            return Err(anyhow!("Webhook returned non-success status: {}", status));
        }

        debug!("Webhook notification sent successfully to {}", self.url);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Webhook"
    }
}
