//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, status
//! - `http_request_duration_seconds` (histogram): handling latency
//! - `http_active_connections` (gauge): connections being served
//! - `rate_limited_requests_total` (counter)
//! - `session_cache_requests_total` (counter): by result (hit/miss)
//! - `session_cache_entries` (gauge), `session_cache_evictions_total` (counter)
//! - `db_pool_available` (gauge), `db_pool_waits_total`,
//!   `db_pool_replacements_total` (counters)
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("http_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_active_connections(count: u64) {
    ::metrics::gauge!("http_active_connections").set(count as f64);
}

pub fn record_rate_limited() {
    ::metrics::counter!("rate_limited_requests_total").increment(1);
}

pub fn record_session_cache(result: &'static str) {
    ::metrics::counter!("session_cache_requests_total", "result" => result).increment(1);
}

pub fn record_session_cache_size(size: usize) {
    ::metrics::gauge!("session_cache_entries").set(size as f64);
}

pub fn record_session_eviction() {
    ::metrics::counter!("session_cache_evictions_total").increment(1);
}

pub fn record_pool_available(available: usize) {
    ::metrics::gauge!("db_pool_available").set(available as f64);
}

pub fn record_pool_wait() {
    ::metrics::counter!("db_pool_waits_total").increment(1);
}

pub fn record_pool_replacement() {
    ::metrics::counter!("db_pool_replacements_total").increment(1);
}
