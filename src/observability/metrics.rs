//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_request_started_total` (counter): requests received by method, host
//! - `http_request_completed_total` (counter): responses by method, host, status
//! - `http_request_duration_ms` (histogram): time to respond
//!
//! # Design Decisions
//! - No global recorder: `Metrics` is built once and handed to whoever records
//! - The metrics server renders the same recorder it was given

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::{
    BuildError, Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder,
};

pub const REQUESTS_STARTED: &str = "http_request_started_total";
pub const REQUESTS_COMPLETED: &str = "http_request_completed_total";
pub const REQUEST_DURATION: &str = "http_request_duration_ms";

const DURATION_BUCKETS_MS: &[f64] = &[
    1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0,
];

/// Process metrics context backed by a Prometheus recorder.
#[derive(Clone)]
pub struct Metrics {
    recorder: Arc<PrometheusRecorder>,
    handle: PrometheusHandle,
}

impl Metrics {
    /// Build a fresh recorder.
    pub fn new() -> Result<Self, BuildError> {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(REQUEST_DURATION.to_string()),
                DURATION_BUCKETS_MS,
            )?
            .build_recorder();
        let handle = recorder.handle();

        let metrics = Self {
            recorder: Arc::new(recorder),
            handle,
        };
        metrics.describe();
        Ok(metrics)
    }

    fn describe(&self) {
        metrics::with_local_recorder(self.recorder.as_ref(), || {
            metrics::describe_counter!(REQUESTS_STARTED, "Total number of http requests started.");
            metrics::describe_counter!(
                REQUESTS_COMPLETED,
                "Total number of http requests completed."
            );
            metrics::describe_histogram!(
                REQUEST_DURATION,
                metrics::Unit::Milliseconds,
                "Time between receiving and responding to an http request."
            );
        });
    }

    /// Record that a request was received.
    pub fn record_request_started(&self, method: &str, host: &str) {
        let labels = [
            ("method", method.to_string()),
            ("host", host.to_string()),
        ];
        metrics::with_local_recorder(self.recorder.as_ref(), || {
            metrics::counter!(REQUESTS_STARTED, &labels).increment(1);
        });
    }

    /// Record a completed request and its latency.
    pub fn record_request_completed(&self, method: &str, host: &str, status: u16, start: Instant) {
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let labels = [
            ("method", method.to_string()),
            ("host", host.to_string()),
            ("status", status.to_string()),
        ];
        metrics::with_local_recorder(self.recorder.as_ref(), || {
            metrics::counter!(REQUESTS_COMPLETED, &labels).increment(1);
            metrics::histogram!(REQUEST_DURATION, &labels).record(elapsed_ms);
        });
    }

    /// Render the Prometheus text exposition.
    pub fn render(&self) -> String {
        self.handle.run_upkeep();
        self.handle.render()
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

/// Middleware recording request counters and latency.
pub async fn track_metrics(
    State(metrics): State<Metrics>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().host())
        .unwrap_or("unknown")
        .to_string();

    metrics.record_request_started(&method, &host);
    let response = next.run(request).await;
    metrics.record_request_completed(&method, &host, response.status().as_u16(), start);

    response
}

async fn render_metrics(State(metrics): State<Metrics>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics.render(),
    )
}

/// Router of the metrics server.
pub fn router(metrics: Metrics) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(metrics)
}
