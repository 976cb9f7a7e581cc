//! Prometheus metrics for monitoring table health.
//!
//! Metrics are exposed in Prometheus text format on a dedicated listener
//! when `--metrics-bind` (or `METRICS_BIND`) is set. Without an installed
//! exporter every call below is a no-op.
//!
//! ```rust,no_run
//! use holdem_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//! metrics::websocket_connected();
//! ```

use holdem_engine::recovery::RecoveryReport;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Sets up a Prometheus scrape endpoint at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// WebSocket Metrics
// ============================================================================

pub fn websocket_connected() {
    metrics::counter!("websocket_connections_total").increment(1);
    metrics::gauge!("websocket_connections_active").increment(1.0);
}

pub fn websocket_disconnected() {
    metrics::gauge!("websocket_connections_active").decrement(1.0);
}

pub fn websocket_messages_received() {
    metrics::counter!("websocket_messages_received").increment(1);
}

pub fn websocket_messages_sent() {
    metrics::counter!("websocket_messages_sent").increment(1);
}

// ============================================================================
// Game Metrics
// ============================================================================

/// Set current active tables count.
pub fn active_tables(count: usize) {
    metrics::gauge!("active_tables").set(count as f64);
}

/// Counts a client command by kind and whether the table accepted it.
pub fn client_commands_total(command: &'static str, accepted: bool) {
    metrics::counter!("client_commands_total",
        "command" => command,
        "accepted" => accepted.to_string()
    )
    .increment(1);
}

/// Increment rate limit hits counter.
pub fn rate_limit_hits_total() {
    metrics::counter!("rate_limit_hits_total").increment(1);
}

/// Records the outcome of startup recovery.
pub fn recovery(report: &RecoveryReport) {
    metrics::counter!("recovery_tables_restored_total").increment(report.recovered.len() as u64);
    metrics::counter!("recovery_hands_cancelled_total").increment(report.cancelled_hands.len() as u64);
    metrics::counter!("recovery_failures_total").increment(report.failures.len() as u64);
}
