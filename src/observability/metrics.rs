//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gate_requests_total` (counter): requests by outcome and status
//! - `gate_request_duration_seconds` (histogram): latency by outcome
//! - `gate_geo_blocked_total` (counter): geo-fence denials
//! - `gate_rate_limited_total` (counter): 429s by bucket
//! - `gate_breaker_trips_total` (counter): closed → open transitions
//! - `gate_breaker_short_circuits_total` (counter): checks denied while open, by bucket
//! - `gate_breaker_open` (gauge): 1 while the breaker is open
//! - `gate_auth_denied_total` (counter): verifier denials by role and code
//! - `gate_backend_errors_total` (counter): failed backend calls by operation
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - Label values are bounded sets (bucket names, codes, operations)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter"),
    }
}

pub fn record_request(outcome: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "gate_requests_total",
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gate_request_duration_seconds", "outcome" => outcome)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_geo_blocked() {
    metrics::counter!("gate_geo_blocked_total").increment(1);
}

pub fn record_rate_limited(bucket: &str) {
    metrics::counter!("gate_rate_limited_total", "bucket" => bucket.to_string()).increment(1);
}

pub fn record_breaker_trip() {
    metrics::counter!("gate_breaker_trips_total").increment(1);
}

pub fn record_breaker_short_circuit(bucket: &str) {
    metrics::counter!("gate_breaker_short_circuits_total", "bucket" => bucket.to_string())
        .increment(1);
}

pub fn record_breaker_state(open: bool) {
    metrics::gauge!("gate_breaker_open").set(if open { 1.0 } else { 0.0 });
}

pub fn record_auth_denied(role: &'static str, code: &'static str) {
    metrics::counter!("gate_auth_denied_total", "role" => role, "code" => code).increment(1);
}

pub fn record_backend_error(op: &'static str) {
    metrics::counter!("gate_backend_errors_total", "op" => op).increment(1);
}
