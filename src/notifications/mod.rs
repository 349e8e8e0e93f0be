use crate::metrics;
use crate::models::WatchTarget;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

mod webhook;

pub use webhook::WebhookNotifier;

pub const PUSH_EVENT: &str = "tag.pushed";

/// Payload sent when a new push is detected
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushNotification {
    pub event: String,
    pub image: String,
    pub tag: String,
    pub pushed_at: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

impl PushNotification {
    pub fn new(target: &WatchTarget, pushed_at: DateTime<Utc>) -> Self {
        Self {
            event: PUSH_EVENT.to_string(),
            image: target.image_path(),
            tag: target.tag().to_string(),
            pushed_at,
            timestamp: Utc::now(),
        }
    }

    pub fn title(&self) -> String {
        format!("New push: {}:{}", self.image, self.tag)
    }
}

/// Notifier trait for different notification backends
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, payload: &PushNotification) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Fans a push out to every configured notifier
#[derive(Default)]
pub struct NotificationManager {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotificationManager {
    pub fn new(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        info!(
            "Notification manager initialized with {} notifiers",
            notifiers.len()
        );
        Self { notifiers }
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Deliver to all notifiers; one failing backend does not stop the others
    pub async fn notify(&self, payload: &PushNotification) {
        if self.notifiers.is_empty() {
            return;
        }

        info!("Sending notification: {}", payload.title());

        for notifier in &self.notifiers {
            match notifier.send(payload).await {
                Ok(()) => {
                    info!("Notification sent successfully via {}", notifier.name());
                    metrics::NOTIFICATIONS_SENT_TOTAL.inc();
                },
                Err(e) => {
                    error!("Failed to send notification via {}: {}", notifier.name(), e);
                    metrics::NOTIFICATIONS_FAILED_TOTAL.inc();
                },
            }
        }
    }
}
