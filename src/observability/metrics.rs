//! Metrics collection and exposition.
//!
//! # Metrics
//! - `tinyweb_connections_total` (counter): accepted connections by program
//! - `tinyweb_responses_total` (counter): origin responses by status code
//! - `tinyweb_relay_bytes_total` (counter): relayed bytes by direction
//! - `tinyweb_relay_failures_total` (counter): failed relay directions
//!
//! Updates are atomic increments and are no-ops until a recorder is
//! installed.

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::proxy::RelayResult;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connection(program: &str) {
    counter!("tinyweb_connections_total", "program" => program.to_string()).increment(1);
}

pub fn record_response(code: u16) {
    counter!("tinyweb_responses_total", "code" => code.to_string()).increment(1);
}

pub fn record_relay(result: &RelayResult) {
    counter!(
        "tinyweb_relay_bytes_total",
        "direction" => result.direction.as_str()
    )
    .increment(result.bytes);

    if result.is_err() {
        counter!(
            "tinyweb_relay_failures_total",
            "direction" => result.direction.as_str()
        )
        .increment(1);
    }
}
