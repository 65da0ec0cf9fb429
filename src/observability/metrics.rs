//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): inbound requests by status, backend
//! - `gateway_request_duration_seconds` (histogram): end-to-end dispatch latency
//! - `gateway_dispatch_retries_total` (counter): retries on a second backend
//! - `gateway_no_backend_total` (counter): requests refused with nothing eligible
//! - `gateway_backend_readiness` (gauge): 0 unknown, 1 warming, 2 ready,
//!   3 degraded, 4 ejected, -1 deregistered
//! - `gateway_health_probes_total` (counter): probes by backend, result
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so library users and
//!   tests pay nothing
//! - Histogram buckets cover warm requests and function cold starts

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

use crate::health::state::Readiness;

const REQUEST_DURATION: &str = "gateway_request_duration_seconds";

const DURATION_BUCKETS: [f64; 12] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), &DURATION_BUCKETS)?
        .install()?;

    ::metrics::describe_counter!("gateway_requests_total", "Inbound requests by status and backend");
    ::metrics::describe_histogram!(REQUEST_DURATION, "Time from request receipt to response headers");
    ::metrics::describe_counter!("gateway_dispatch_retries_total", "Requests retried on another backend");
    ::metrics::describe_counter!("gateway_no_backend_total", "Requests refused with no eligible backend");
    ::metrics::describe_gauge!("gateway_backend_readiness", "Backend readiness state");
    ::metrics::describe_counter!("gateway_health_probes_total", "Active health probes by result");

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one inbound request. `backend` is `None` when nothing was selected.
pub fn record_request(status: u16, backend: Option<&str>, started: Instant) {
    let backend = backend.unwrap_or("none").to_string();
    ::metrics::counter!(
        "gateway_requests_total",
        "status" => status.to_string(),
        "backend" => backend
    )
    .increment(1);
    ::metrics::histogram!(REQUEST_DURATION).record(started.elapsed().as_secs_f64());
}

pub fn record_retry() {
    ::metrics::counter!("gateway_dispatch_retries_total").increment(1);
}

pub fn record_no_backend() {
    ::metrics::counter!("gateway_no_backend_total").increment(1);
}

pub fn record_backend_readiness(backend: &str, readiness: Readiness) {
    ::metrics::gauge!("gateway_backend_readiness", "backend" => backend.to_string()).set(readiness.as_gauge());
}

/// Mark a backend as gone from the registry.
pub fn forget_backend(backend: &str) {
    ::metrics::gauge!("gateway_backend_readiness", "backend" => backend.to_string()).set(-1.0);
}

pub fn record_health_probe(backend: &str, healthy: bool) {
    let result = if healthy { "success" } else { "failure" };
    ::metrics::counter!(
        "gateway_health_probes_total",
        "backend" => backend.to_string(),
        "result" => result
    )
    .increment(1);
}
