//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatch_requests_total` (counter): resolutions by verb and outcome
//! - `dispatch_duration_seconds` (histogram): resolution latency by verb
//! - `ws_active_sessions` (gauge): live WebSocket sessions
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one finished resolution.
pub fn record_dispatch(verb: &str, outcome: &'static str, start: Instant) {
    metrics::counter!(
        "dispatch_requests_total",
        "verb" => verb.to_string(),
        "outcome" => outcome
    )
    .increment(1);

    metrics::histogram!("dispatch_duration_seconds", "verb" => verb.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn session_opened() {
    metrics::gauge!("ws_active_sessions").increment(1.0);
}

pub fn session_closed() {
    metrics::gauge!("ws_active_sessions").decrement(1.0);
}
