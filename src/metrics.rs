//! Prometheus metrics for Teledrop.
//!
//! Installs a global Prometheus recorder using `metrics-exporter-prometheus`,
//! defines metric name constants, provides a Tower-compatible middleware for
//! HTTP RED metrics, and exposes the `/metrics` endpoint handler.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Instant;

// -- Metric name constants ----------------------------------------------------

/// Total HTTP requests (counter). Labels: method, status.
pub const HTTP_REQUESTS_TOTAL: &str = "teledrop_http_requests_total";

/// HTTP request duration in seconds (histogram). Labels: method.
pub const HTTP_REQUEST_DURATION_SECONDS: &str = "teledrop_http_request_duration_seconds";

/// Total drops created (counter).
pub const DROPS_CREATED_TOTAL: &str = "teledrop_drops_created_total";

/// Total drops deleted (counter).
pub const DROPS_DELETED_TOTAL: &str = "teledrop_drops_deleted_total";

/// Total payload bytes accepted by uploads (counter).
pub const BYTES_UPLOADED_TOTAL: &str = "teledrop_bytes_uploaded_total";

/// Total payload bytes served by downloads (counter).
pub const BYTES_DOWNLOADED_TOTAL: &str = "teledrop_bytes_downloaded_total";

// -- Global recorder installation ---------------------------------------------

/// Singleton handle to the Prometheus recorder.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus metrics recorder.  Idempotent -- safe to
/// call multiple times (e.g. in tests).
pub fn init_metrics() -> &'static PrometheusHandle {
    PROMETHEUS_HANDLE.get_or_init(|| {
        PrometheusBuilder::new()
            .install_recorder()
            .expect("failed to install Prometheus recorder")
    })
}

/// Register human-readable descriptions for every metric.
pub fn describe_metrics() {
    describe_counter!(HTTP_REQUESTS_TOTAL, "Total HTTP requests");
    describe_histogram!(
        HTTP_REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );
    describe_counter!(DROPS_CREATED_TOTAL, "Total drops created");
    describe_counter!(DROPS_DELETED_TOTAL, "Total drops deleted");
    describe_counter!(BYTES_UPLOADED_TOTAL, "Payload bytes accepted by uploads");
    describe_counter!(BYTES_DOWNLOADED_TOTAL, "Payload bytes served by downloads");
}

// -- Recording helpers --------------------------------------------------------

/// Record a successful create and the bytes it accepted.
pub fn record_drop_created(size: u64) {
    counter!(DROPS_CREATED_TOTAL).increment(1);
    counter!(BYTES_UPLOADED_TOTAL).increment(size);
}

/// Record a successful delete.
pub fn record_drop_deleted() {
    counter!(DROPS_DELETED_TOTAL).increment(1);
}

/// Record bytes handed to a download response body.
pub fn record_bytes_sent(len: u64) {
    counter!(BYTES_DOWNLOADED_TOTAL).increment(len);
}

// -- Endpoint and middleware --------------------------------------------------

/// `GET /metrics` -- render the Prometheus exposition format.
pub async fn metrics_handler() -> impl IntoResponse {
    let handle = init_metrics();
    (
        [("content-type", "text/plain; version=0.0.4")],
        handle.render(),
    )
}

/// Tower middleware recording request counts and durations.
pub async fn metrics_middleware(req: Request<axum::body::Body>, next: Next) -> Response {
    let method = req.method().as_str().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    let status = response.status().as_u16().to_string();
    counter!(HTTP_REQUESTS_TOTAL, "method" => method.clone(), "status" => status).increment(1);
    histogram!(HTTP_REQUEST_DURATION_SECONDS, "method" => method)
        .record(start.elapsed().as_secs_f64());

    response
}
