//! Metrics collection and exposition.
//!
//! # Metrics
//! - `exchange_transitions_total` (counter): phase transitions by target phase
//! - `exchange_deadline_elapsed_total` (counter): fired deadlines by kind and action
//! - `exchange_aborted_total` (counter): connections aborted by a handler
//! - `exchange_duration_seconds` (histogram): open-to-release time by final phase
//! - `server_active_connections` (gauge): open connections
//!
//! Recording is a no-op until a recorder is installed with [`init_metrics`].

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;

use crate::exchange::{Phase, TimeoutAction, TimeoutKind};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_transition(to: Phase) {
    counter!("exchange_transitions_total", "phase" => to.as_str()).increment(1);
}

pub fn record_deadline(kind: TimeoutKind, action: TimeoutAction) {
    let action = match action {
        TimeoutAction::LogOnly => "log",
        TimeoutAction::Respond(_) => "respond",
        TimeoutAction::Abort => "abort",
    };
    counter!(
        "exchange_deadline_elapsed_total",
        "kind" => kind.as_str(),
        "action" => action
    )
    .increment(1);
}

pub fn record_abort() {
    counter!("exchange_aborted_total").increment(1);
}

pub fn record_released(phase: Phase, age: Duration) {
    histogram!("exchange_duration_seconds", "phase" => phase.as_str()).record(age.as_secs_f64());
}

pub fn record_connection_opened() {
    gauge!("server_active_connections").increment(1.0);
}

pub fn record_connection_closed() {
    gauge!("server_active_connections").decrement(1.0);
}
