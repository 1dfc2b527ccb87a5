//! Default lifecycle observer: structured logs plus metrics.

use crate::exchange::{ExchangeId, ExchangeObserver, LifecycleEvent};
use crate::observability::metrics;

/// Logs every lifecycle event and records it in metrics.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ExchangeObserver for TracingObserver {
    fn on_event(&self, exchange: ExchangeId, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::Transition { from, to } => {
                tracing::debug!(exchange = %exchange, from = %from, to = %to, "Phase transition");
                metrics::record_transition(*to);
            }
            LifecycleEvent::DeadlineElapsed {
                kind,
                elapsed,
                action,
            } => {
                tracing::info!(
                    exchange = %exchange,
                    kind = %kind,
                    elapsed_ms = elapsed.as_millis() as u64,
                    action = ?action,
                    "Deadline elapsed"
                );
                metrics::record_deadline(*kind, *action);
            }
            LifecycleEvent::Aborted => {
                tracing::warn!(exchange = %exchange, "Exchange aborted, closing connection");
                metrics::record_abort();
            }
            LifecycleEvent::Released {
                phase,
                bytes_received,
                response_sent,
                age,
            } => {
                match phase.outcome() {
                    Some(Err(error)) => tracing::info!(
                        exchange = %exchange,
                        error = %error,
                        bytes_received,
                        response_sent,
                        duration_ms = age.as_millis() as u64,
                        "Exchange ended"
                    ),
                    _ => tracing::debug!(
                        exchange = %exchange,
                        phase = %phase,
                        duration_ms = age.as_millis() as u64,
                        "Exchange completed"
                    ),
                }
                metrics::record_released(*phase, *age);
            }
        }
    }
}
