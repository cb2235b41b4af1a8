//! Prometheus Metrics Module
//!
//! Pre-registered metrics for the trade-update stream and the order ledger.

use lazy_static::lazy_static;
use prometheus::{
    opts, register_int_counter_vec, register_int_gauge, register_int_gauge_vec, Encoder,
    IntCounterVec, IntGauge, IntGaugeVec, TextEncoder,
};

lazy_static! {
    // --- Stream Metrics ---

    /// Inbound frames received (by declared stream name)
    pub static ref STREAM_FRAMES_TOTAL: IntCounterVec = register_int_counter_vec!(
        opts!("orderstream_frames_total", "Inbound stream frames received"),
        &["stream"]
    ).expect("FATAL: Failed to register STREAM_FRAMES_TOTAL metric - check for duplicate registration");

    /// Frames dropped because they could not be decoded
    pub static ref STREAM_MALFORMED_TOTAL: IntCounterVec = register_int_counter_vec!(
        opts!("orderstream_malformed_frames_total", "Inbound frames dropped as malformed"),
        &["reason"]
    ).expect("FATAL: Failed to register STREAM_MALFORMED_TOTAL metric - check for duplicate registration");

    /// Connection cycles that ended in failure
    pub static ref STREAM_RECONNECTIONS: IntCounterVec = register_int_counter_vec!(
        opts!("orderstream_reconnections_total", "Connection attempts that failed and were retried"),
        &["reason"]
    ).expect("FATAL: Failed to register STREAM_RECONNECTIONS metric - check for duplicate registration");

    /// Current connection state (1 for the active state, 0 otherwise)
    pub static ref CONNECTION_STATE: IntGaugeVec = register_int_gauge_vec!(
        opts!("orderstream_connection_state", "Connection state (1 = current)"),
        &["state"]
    ).expect("FATAL: Failed to register CONNECTION_STATE metric - check for duplicate registration");

    // --- Order Metrics ---

    /// Trade updates applied to the ledger (by event kind)
    pub static ref TRADE_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        opts!("orderstream_trade_events_total", "Trade updates reconciled"),
        &["event"]
    ).expect("FATAL: Failed to register TRADE_EVENTS_TOTAL metric - check for duplicate registration");

    /// Portfolio refreshes triggered by fills
    pub static ref PORTFOLIO_REFRESHES: IntCounterVec = register_int_counter_vec!(
        opts!("orderstream_portfolio_refreshes_total", "Portfolio refreshes after fills"),
        &["status"]
    ).expect("FATAL: Failed to register PORTFOLIO_REFRESHES metric - check for duplicate registration");

    /// Orders currently held in the ledger
    pub static ref OPEN_ORDERS: IntGauge = register_int_gauge!(
        opts!("orderstream_open_orders", "Open orders held in the ledger")
    ).expect("FATAL: Failed to register OPEN_ORDERS metric - check for duplicate registration");
}

/// Record an inbound frame
pub fn record_frame(stream: &str) {
    STREAM_FRAMES_TOTAL.with_label_values(&[stream]).inc();
}

/// Record a dropped frame
pub fn record_malformed(reason: &str) {
    STREAM_MALFORMED_TOTAL.with_label_values(&[reason]).inc();
}

/// Record a failed connection cycle
pub fn record_reconnection(reason: &str) {
    STREAM_RECONNECTIONS.with_label_values(&[reason]).inc();
}

/// Mark `current` as the only active connection state
pub fn set_connection_state(current: &str, all: &[&str]) {
    for state in all {
        let value = i64::from(*state == current);
        CONNECTION_STATE.with_label_values(&[state]).set(value);
    }
}

/// Record a reconciled trade update
pub fn record_trade_event(event: &str) {
    TRADE_EVENTS_TOTAL.with_label_values(&[event]).inc();
}

/// Record the outcome of a portfolio refresh
pub fn record_refresh(success: bool) {
    let status = if success { "success" } else { "failure" };
    PORTFOLIO_REFRESHES.with_label_values(&[status]).inc();
}

/// Get metrics as text for /metrics endpoint
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode Prometheus metrics: {}", e);
        return String::new();
    }

    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Prometheus metrics buffer is not valid UTF-8: {}", e);
            String::new()
        }
    }
}
