//! Metrics collection and exposition.
//!
//! # Metrics
//! - `breaker_failures_reported_total` (counter): reports by outcome
//! - `breaker_trips_total` (counter): circuits tripped
//! - `breaker_circuit_transitions_total` (counter): manual open/close by target state
//! - `breaker_controller_calls_total` (counter): stop/start attempts by outcome
//! - `breaker_workflow_transitions_total` (counter): workflow state changes
//! - `breaker_active_workflows` (gauge): instances not terminal or still closing their circuit
//!
//! Recording is a no-op until a recorder is installed.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and serve it on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus exporter"),
    }
}

pub fn record_failure_reported(outcome: &'static str) {
    counter!("breaker_failures_reported_total", "outcome" => outcome).increment(1);
}

pub fn record_trip() {
    counter!("breaker_trips_total").increment(1);
}

pub fn record_circuit_transition(state: &'static str) {
    counter!("breaker_circuit_transitions_total", "state" => state).increment(1);
}

pub fn record_controller_call(operation: &'static str, outcome: &'static str) {
    counter!(
        "breaker_controller_calls_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_workflow_transition(state: &'static str) {
    counter!("breaker_workflow_transitions_total", "state" => state).increment(1);
}

pub fn record_active_workflows(count: usize) {
    gauge!("breaker_active_workflows").set(count as f64);
}
