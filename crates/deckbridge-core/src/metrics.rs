//! Prometheus metrics helpers for the deckbridge relay.
//!
//! # Usage
//!
//! ```rust,ignore
//! use deckbridge_core::metrics::{init_metrics, start_metrics_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let handle = init_metrics();
//!     start_metrics_server(9090, handle).await.unwrap();
//!
//!     metrics::counter!("queue_posts_enqueued_total").increment(1);
//! }
//! ```
//!
//! # Metric Naming Conventions
//!
//! - Prefix: component (`queue_`, `ledger_`, `delivery_`, `lanes_`)
//! - Suffix: unit or type (`_total`, `_seconds`)
//! - Labels: avoided; lane keys are user-controlled strings

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;

/// Initialize the Prometheus metrics recorder.
///
/// # Panics
///
/// Panics if called more than once (the recorder can only be installed once).
pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder");

    register_relay_metrics();

    handle
}

/// Like [`init_metrics`] but returns `None` if a recorder is already installed.
pub fn try_init_metrics() -> Option<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder().ok()?;
    register_relay_metrics();
    Some(handle)
}

/// Serve `/metrics` on the given port from a background task.
pub async fn start_metrics_server(
    port: u16,
    handle: PrometheusHandle,
) -> Result<(), std::io::Error> {
    let app = Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    );

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Metrics server stopped: {}", e);
        }
    });

    Ok(())
}

fn register_relay_metrics() {
    // =========================================================================
    // Ingestion Queue
    // =========================================================================

    describe_counter!(
        "queue_posts_enqueued_total",
        "Posts accepted into the ingestion queue"
    );
    describe_counter!(
        "queue_posts_skipped_total",
        "Detections dropped because the post was queued or already processed"
    );
    describe_counter!(
        "queue_item_errors_total",
        "Queue items whose processing returned an error"
    );
    describe_counter!("queue_drains_total", "Completed drain runs");
    describe_gauge!("queue_depth", "Posts waiting in the ingestion queue");

    // =========================================================================
    // Dedup Ledger
    // =========================================================================

    describe_gauge!("ledger_entries", "Entries in the processed-post ledger");
    describe_counter!(
        "ledger_entries_evicted_total",
        "Ledger entries evicted to respect the size cap"
    );

    // =========================================================================
    // Delivery
    // =========================================================================

    describe_counter!(
        "delivery_posts_delivered_total",
        "Posts accepted by the publishing endpoint"
    );
    describe_counter!(
        "delivery_posts_failed_total",
        "Posts rejected by the endpoint or lost to transport errors"
    );
    describe_histogram!(
        "delivery_request_duration_seconds",
        "Time spent on delivery requests"
    );

    // =========================================================================
    // Lanes
    // =========================================================================

    describe_gauge!("lanes_watched", "Lanes with an active watcher");
    describe_gauge!("relay_running", "1 while a relay run is active");
    describe_counter!(
        "capture_lines_malformed_total",
        "Capture lines skipped because they did not parse"
    );
}
