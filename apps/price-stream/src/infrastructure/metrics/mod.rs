//! Prometheus Metrics Module
//!
//! Records client metrics through the `metrics` facade. Without an installed
//! recorder every call is a no-op, so the library can record unconditionally.
//!
//! # Metrics Categories
//!
//! - **Events**: Events queued, dropped on overflow and failed in the callback
//! - **Control frames**: Frames sent by action
//! - **Connections**: Attempts, failures and readiness
//! - **Subscriptions**: Symbols currently subscribed
//!
//! # Integration
//!
//! The binary calls [`init_metrics`] with a listen address to serve
//! `/metrics` from the Prometheus exporter's own HTTP listener.

use std::net::SocketAddr;
use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

static METRICS_INSTALLED: OnceLock<SocketAddr> = OnceLock::new();

// =============================================================================
// Installation
// =============================================================================

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a tokio runtime. Calling it again after a
/// successful install is a no-op that returns the original address.
///
/// # Errors
///
/// Returns an error if the recorder cannot be installed.
pub fn init_metrics(addr: SocketAddr) -> Result<SocketAddr, BuildError> {
    if let Some(existing) = METRICS_INSTALLED.get() {
        return Ok(*existing);
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    register_metrics();

    Ok(*METRICS_INSTALLED.get_or_init(|| addr))
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "price_stream_events_received_total",
        "Total decoded events placed on the event queue"
    );
    describe_counter!(
        "price_stream_events_dropped_total",
        "Total events dropped because the event queue was full"
    );
    describe_counter!(
        "price_stream_callback_failures_total",
        "Total callback invocations that returned an error or panicked"
    );
    describe_counter!(
        "price_stream_decode_errors_total",
        "Total inbound frames that were not valid JSON"
    );
    describe_counter!(
        "price_stream_control_frames_sent_total",
        "Total control frames queued by action"
    );
    describe_counter!(
        "price_stream_connection_attempts_total",
        "Total connection attempts"
    );
    describe_counter!(
        "price_stream_connection_failures_total",
        "Total connection failures by reason"
    );
    describe_gauge!(
        "price_stream_session_ready",
        "1 while the session is ready, 0 otherwise"
    );
    describe_gauge!(
        "price_stream_subscribed_symbols",
        "Number of symbols currently subscribed"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record an event placed on the queue.
pub fn record_event_received() {
    counter!("price_stream_events_received_total").increment(1);
}

/// Record an event dropped on overflow.
pub fn record_event_dropped() {
    counter!("price_stream_events_dropped_total").increment(1);
}

/// Record a failed callback invocation (`kind` is `error` or `panic`).
pub fn record_callback_failure(kind: &'static str) {
    counter!("price_stream_callback_failures_total", "kind" => kind).increment(1);
}

/// Record an undecodable inbound frame.
pub fn record_decode_error() {
    counter!("price_stream_decode_errors_total").increment(1);
}

/// Record a control frame queued for sending.
pub fn record_control_frame(action: &'static str) {
    counter!("price_stream_control_frames_sent_total", "action" => action).increment(1);
}

/// Record a connection attempt.
pub fn record_connection_attempt() {
    counter!("price_stream_connection_attempts_total").increment(1);
}

/// Record a connection failure.
pub fn record_connection_failure(reason: &'static str) {
    counter!("price_stream_connection_failures_total", "reason" => reason).increment(1);
}

/// Update the readiness gauge.
pub fn set_session_ready(ready: bool) {
    gauge!("price_stream_session_ready").set(if ready { 1.0 } else { 0.0 });
}

/// Update the subscribed symbol count.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscribed_symbols(count: usize) {
    gauge!("price_stream_subscribed_symbols").set(count as f64);
}
