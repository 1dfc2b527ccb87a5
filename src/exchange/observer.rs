//! Lifecycle observation hooks.
//!
//! Observers see every phase transition, every elapsed deadline and the final
//! release of an exchange. They are notified after the fact and cannot alter
//! the exchange; an observer must not call back into the exchange it is
//! observing.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::deadline::{TimeoutAction, TimeoutKind};
use super::phase::Phase;
use super::ExchangeId;

/// Something that happened to an exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// The phase moved forward.
    Transition { from: Phase, to: Phase },
    /// A deadline elapsed before its side of the exchange finished.
    DeadlineElapsed {
        kind: TimeoutKind,
        elapsed: Duration,
        action: TimeoutAction,
    },
    /// The handler closed the connection without a response.
    Aborted,
    /// The exchange was torn down; no further events follow.
    Released {
        phase: Phase,
        bytes_received: bool,
        response_sent: bool,
        age: Duration,
    },
}

/// Receives lifecycle events for exchanges.
pub trait ExchangeObserver: Send + Sync + 'static {
    fn on_event(&self, exchange: ExchangeId, event: &LifecycleEvent);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ExchangeObserver for NoopObserver {
    fn on_event(&self, _exchange: ExchangeId, _event: &LifecycleEvent) {}
}

/// Observer that keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct Recorder {
    events: Mutex<Vec<(ExchangeId, LifecycleEvent)>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events.
    pub fn events(&self) -> Vec<(ExchangeId, LifecycleEvent)> {
        self.lock().clone()
    }

    /// Events recorded for one exchange.
    pub fn events_for(&self, exchange: ExchangeId) -> Vec<LifecycleEvent> {
        self.events()
            .into_iter()
            .filter(|(id, _)| *id == exchange)
            .map(|(_, event)| event)
            .collect()
    }

    /// Elapsed deadlines of the given kind, with their measured elapsed time.
    pub fn timeouts(&self, kind: TimeoutKind) -> Vec<(ExchangeId, Duration)> {
        self.events()
            .into_iter()
            .filter_map(|(id, event)| match event {
                LifecycleEvent::DeadlineElapsed { kind: k, elapsed, .. } if k == kind => {
                    Some((id, elapsed))
                }
                _ => None,
            })
            .collect()
    }

    /// Every terminal phase entered by the exchange.
    pub fn terminal_phases(&self, exchange: ExchangeId) -> Vec<Phase> {
        self.events_for(exchange)
            .into_iter()
            .filter_map(|event| match event {
                LifecycleEvent::Transition { to, .. } if to.is_terminal() => Some(to),
                _ => None,
            })
            .collect()
    }

    /// Released exchanges with their final phase.
    pub fn released(&self) -> Vec<(ExchangeId, Phase)> {
        self.events()
            .into_iter()
            .filter_map(|(id, event)| match event {
                LifecycleEvent::Released { phase, .. } => Some((id, phase)),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(ExchangeId, LifecycleEvent)>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ExchangeObserver for Recorder {
    fn on_event(&self, exchange: ExchangeId, event: &LifecycleEvent) {
        self.lock().push((exchange, event.clone()));
    }
}
