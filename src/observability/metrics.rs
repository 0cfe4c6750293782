//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_requests_total` (counter): completed relays by method, upstream status
//! - `relay_request_duration_seconds` (histogram): end-to-end relay latency by method
//! - `relay_failures_total` (counter): transport failures by code
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Prometheus exposition is opt-in via configuration

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::observability::logging::StartTime;
use crate::relay::FailureCode;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record a relay that received an upstream response.
pub fn record_relay(method: &str, status: u16, start: &StartTime) {
    metrics::counter!(
        "relay_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    record_duration(method, start);
}

/// Record a relay that never received a response.
pub fn record_failure(method: &str, code: FailureCode, start: &StartTime) {
    metrics::counter!("relay_failures_total", "code" => code.as_str()).increment(1);
    record_duration(method, start);
}

fn record_duration(method: &str, start: &StartTime) {
    metrics::histogram!("relay_request_duration_seconds", "method" => method.to_string())
        .record(start.instant().elapsed().as_secs_f64());
}
