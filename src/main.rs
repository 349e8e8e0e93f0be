use anyhow::Result;
use std::sync::Arc;
use tagwatch::config::TagwatchConfig;
use tagwatch::notifications::{NotificationManager, Notifier, PushNotification, WebhookNotifier};
use tagwatch::{EventKind, TagWatcher, WatchEvent, listener, metrics};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "tagwatch=info".into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting Tagwatch");

    let config = TagwatchConfig::load()?;
    let watcher = TagWatcher::with_http(config.watcher_options()?, config.request_timeout())?;

    let metrics_handle = if config.metrics.enabled {
        Some(metrics::start_metrics_server(&config.metrics.addr).await?)
    } else {
        metrics::register_metrics();
        None
    };

    let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();
    if config.webhook.enabled {
        match WebhookNotifier::new(&config.webhook) {
            Ok(notifier) => notifiers.push(Box::new(notifier)),
            Err(e) => error!("Failed to create webhook notifier: {}", e),
        }
    }
    let notifications = Arc::new(NotificationManager::new(notifiers));

    let target = watcher.target().clone();
    let runtime = tokio::runtime::Handle::current();

    watcher
        .on(
            EventKind::Error,
            listener(|event| {
                if let WatchEvent::Error(e) = event {
                    warn!("Poll failed: {}", e);
                }
            }),
        )
        .on(
            EventKind::Fetch,
            listener(|event| {
                if let WatchEvent::Fetch(body) = event {
                    debug!("Fetched tag metadata: {}", body);
                }
            }),
        )
        .on(
            EventKind::Push,
            listener(move |event| {
                if let WatchEvent::Push(pushed_at) = event {
                    info!("{} was pushed at {}", target, pushed_at);
                    if notifications.is_empty() {
                        return;
                    }
                    let payload = PushNotification::new(&target, *pushed_at);
                    let notifications = Arc::clone(&notifications);
                    runtime.spawn(async move { notifications.notify(&payload).await });
                }
            }),
        )
        .start();

    info!("Tagwatch is running");

    match metrics_handle {
        Some(handle) => {
            tokio::select! {
                _ = handle => warn!("Metrics server stopped"),
                _ = tokio::signal::ctrl_c() => info!("Received shutdown signal"),
            }
        },
        None => {
            tokio::signal::ctrl_c().await?;
            info!("Received shutdown signal");
        },
    }

    watcher.stop();
    Ok(())
}
