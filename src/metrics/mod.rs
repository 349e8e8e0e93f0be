use anyhow::Result;
use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use lazy_static::lazy_static;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::Once;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Polling metrics
    pub static ref TICKS_TOTAL: IntCounter = IntCounter::new(
        "tagwatch_ticks_total",
        "Total number of tag metadata polls"
    ).unwrap();

    pub static ref TICK_ERRORS_TOTAL: IntCounter = IntCounter::new(
        "tagwatch_tick_errors_total",
        "Total number of polls that ended in an error event"
    ).unwrap();

    pub static ref PUSHES_DETECTED_TOTAL: IntCounter = IntCounter::new(
        "tagwatch_pushes_detected_total",
        "Total number of new pushes detected for the watched tag"
    ).unwrap();

    pub static ref FETCH_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "tagwatch_fetch_duration_seconds",
            "Time spent fetching tag metadata from the registry"
        ).buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])
    ).unwrap();

    pub static ref LAST_PUSHED_TIMESTAMP: IntGauge = IntGauge::new(
        "tagwatch_last_pushed_timestamp_seconds",
        "Unix time of the most recent tag push observed"
    ).unwrap();

    // Watcher metrics
    pub static ref WATCHING: IntGauge = IntGauge::new(
        "tagwatch_watching",
        "Number of watchers with a live polling timer"
    ).unwrap();

    pub static ref LISTENER_PANICS_TOTAL: IntCounter = IntCounter::new(
        "tagwatch_listener_panics_total",
        "Total number of event listeners that panicked during emission"
    ).unwrap();

    // Notification metrics
    pub static ref NOTIFICATIONS_SENT_TOTAL: IntCounter = IntCounter::new(
        "tagwatch_notifications_sent_total",
        "Total number of push notifications delivered"
    ).unwrap();

    pub static ref NOTIFICATIONS_FAILED_TOTAL: IntCounter = IntCounter::new(
        "tagwatch_notifications_failed_total",
        "Total number of push notifications that failed"
    ).unwrap();
}

static REGISTER: Once = Once::new();

pub fn register_metrics() {
    REGISTER.call_once(|| {
        REGISTRY.register(Box::new(TICKS_TOTAL.clone())).ok();
        REGISTRY.register(Box::new(TICK_ERRORS_TOTAL.clone())).ok();
        REGISTRY
            .register(Box::new(PUSHES_DETECTED_TOTAL.clone()))
            .ok();
        REGISTRY.register(Box::new(FETCH_DURATION.clone())).ok();
        REGISTRY
            .register(Box::new(LAST_PUSHED_TIMESTAMP.clone()))
            .ok();
        REGISTRY.register(Box::new(WATCHING.clone())).ok();
        REGISTRY
            .register(Box::new(LISTENER_PANICS_TOTAL.clone()))
            .ok();
        REGISTRY
            .register(Box::new(NOTIFICATIONS_SENT_TOTAL.clone()))
            .ok();
        REGISTRY
            .register(Box::new(NOTIFICATIONS_FAILED_TOTAL.clone()))
            .ok();

        info!("Metrics registered");
    });
}

pub fn router() -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
}

pub async fn start_metrics_server(addr: &str) -> Result<JoinHandle<()>> {
    register_metrics();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Starting metrics server on {}", listener.local_addr()?);

    let app = router();
    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Metrics server failed: {}", e);
        }
    });

    Ok(handle)
}

/// Render the registry in the Prometheus text format
pub fn render() -> Result<Vec<u8>> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(buffer)
}

async fn metrics_handler() -> impl IntoResponse {
    match render() {
        Ok(buffer) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4",
            )],
            buffer,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response(),
    }
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
