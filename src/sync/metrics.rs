//! Prometheus metrics for the daemon
//!
//! Counters live in the default registry; nothing serves them over HTTP, but
//! they are logged on shutdown.

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge, CounterVec, Encoder, Gauge, TextEncoder};

lazy_static! {
    /// Counter: processed notifications by outcome
    pub static ref NOTIFICATIONS: CounterVec = register_counter_vec!(
        "icinga2rt_notifications_total",
        "Processed notifications by outcome",
        &["outcome"]
    )
    .expect("Failed to create notifications metric");

    /// Counter: ticket system mutations by operation and result
    pub static ref TICKET_OPERATIONS: CounterVec = register_counter_vec!(
        "icinga2rt_ticket_operations_total",
        "Ticket system mutations by operation and result",
        &["operation", "result"]
    )
    .expect("Failed to create ticket_operations metric");

    /// Counter: event stream reconnects by reason
    pub static ref RECONNECTS: CounterVec = register_counter_vec!(
        "icinga2rt_stream_reconnects_total",
        "Event stream reconnects by reason",
        &["reason"]
    )
    .expect("Failed to create stream_reconnects metric");

    /// Gauge: tracked cache entries
    pub static ref CACHE_ENTRIES: Gauge = register_gauge!(
        "icinga2rt_cache_entries",
        "Number of host/service entries in the event cache"
    )
    .expect("Failed to create cache_entries metric");

    /// Gauge: daemon health status (1 = connected and running, 0 = stopped)
    pub static ref HEALTH_STATUS: Gauge = register_gauge!(
        "icinga2rt_health_status",
        "Daemon health status (1 = healthy, 0 = unhealthy)"
    )
    .expect("Failed to create health_status metric");
}

/// Record a processed notification
pub fn record_notification(outcome: &str) {
    NOTIFICATIONS.with_label_values(&[outcome]).inc();
}

/// Record a ticket mutation (`create`, `comment`, `update_status`)
pub fn record_ticket_operation(operation: &str, success: bool) {
    let result = if success { "success" } else { "error" };
    TICKET_OPERATIONS
        .with_label_values(&[operation, result])
        .inc();
}

/// Record a stream reconnect
pub fn record_reconnect(reason: &str) {
    RECONNECTS.with_label_values(&[reason]).inc();
}

pub fn set_cache_entries(count: usize) {
    CACHE_ENTRIES.set(count as f64);
}

/// Set health status
pub fn set_health_status(healthy: bool) {
    HEALTH_STATUS.set(if healthy { 1.0 } else { 0.0 });
}

/// Encode all metrics as Prometheus text format
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
