//! Per-exchange lifecycle: phase, deadlines, and release.
//!
//! # Responsibilities
//! - Hold the exchange phase and move it forward atomically
//! - Arm one timer per direction and cancel it when that side finishes
//! - Report deadline events without acting on them
//! - Hand non-log-only deadline events to the handler via [`Exchange::run`]
//! - Release the exchange exactly once, after which no callback runs
//!
//! # Concurrency
//! Phase changes are a compare-and-swap on an `AtomicU8`; the first writer of
//! a terminal phase wins and every later attempt is a no-op. Timer tasks hold
//! a `Weak` reference and take the `timers` lock before reporting, and release
//! sets `released` under that same lock, so a cancelled timer can never report
//! after teardown even if it already woke up.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::response::{IntoResponse, Response};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::deadline::{Deadline, Escalation, TimeoutKind};
use super::observer::{ExchangeObserver, LifecycleEvent};
use super::phase::Phase;
use super::ExchangeId;
use crate::net::connection::ConnectionControl;

/// Timer slot for one direction.
enum Slot {
    /// No deadline armed yet.
    Idle,
    /// Timer running.
    Armed {
        deadline: Deadline,
        timer: JoinHandle<()>,
    },
    /// Deadline fired, or the direction finished first.
    Done,
}

impl Slot {
    fn settle(&mut self) {
        if let Slot::Armed { timer, .. } = std::mem::replace(self, Slot::Done) {
            timer.abort();
        }
    }
}

struct Timers {
    released: bool,
    read: Slot,
    write: Slot,
}

impl Timers {
    fn slot(&mut self, kind: TimeoutKind) -> &mut Slot {
        match kind {
            TimeoutKind::Read => &mut self.read,
            TimeoutKind::Write => &mut self.write,
        }
    }
}

struct Inner {
    id: ExchangeId,
    opened: Instant,
    phase: AtomicU8,
    bytes_received: AtomicBool,
    response_sent: AtomicBool,
    timers: Mutex<Timers>,
    escalation: watch::Sender<Option<Escalation>>,
    observer: Arc<dyn ExchangeObserver>,
    connection: ConnectionControl,
}

impl Inner {
    fn timers(&self) -> MutexGuard<'_, Timers> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn phase(&self) -> Phase {
        Phase::from(self.phase.load(Ordering::SeqCst))
    }

    /// Move the phase forward. Returns false if the move was not legal anymore.
    fn advance(&self, to: Phase) -> bool {
        let mut current = self.phase.load(Ordering::SeqCst);
        loop {
            let from = Phase::from(current);
            if !from.can_advance_to(to) {
                return false;
            }
            match self
                .phase
                .compare_exchange(current, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => {
                    self.observer
                        .on_event(self.id, &LifecycleEvent::Transition { from, to });
                    return true;
                }
                Err(actual) => current = actual,
            }
        }
    }

    fn deadline_elapsed(&self, kind: TimeoutKind, started: Instant) {
        let mut timers = self.timers();
        if timers.released {
            return;
        }
        let slot = timers.slot(kind);
        let deadline = match std::mem::replace(slot, Slot::Done) {
            Slot::Armed { deadline, .. } => deadline,
            other => {
                *slot = other;
                return;
            }
        };

        let timed_out = match kind {
            TimeoutKind::Read => Phase::ReadTimedOut,
            TimeoutKind::Write => Phase::WriteTimedOut,
        };
        let decided = self.advance(timed_out);
        self.observer.on_event(
            self.id,
            &LifecycleEvent::DeadlineElapsed {
                kind,
                elapsed: started.elapsed(),
                action: deadline.action,
            },
        );

        // A deadline that lost the terminal race is reported but never acts.
        if !decided {
            return;
        }
        if let Some(escalation) = Escalation::for_deadline(kind, &deadline) {
            self.escalation.send_replace(Some(escalation));
        }
    }

    fn emit_if_live(&self, event: LifecycleEvent) {
        let timers = self.timers();
        if !timers.released {
            self.observer.on_event(self.id, &event);
        }
    }

    fn release(&self) {
        let mut timers = self.timers();
        if timers.released {
            return;
        }
        timers.released = true;
        timers.read.settle();
        timers.write.settle();

        // Torn down mid-flight, e.g. the peer hung up and the handler was dropped.
        if !self.phase().is_terminal() {
            self.advance(Phase::Aborted);
        }

        self.observer.on_event(
            self.id,
            &LifecycleEvent::Released {
                phase: self.phase(),
                bytes_received: self.bytes_received.load(Ordering::SeqCst),
                response_sent: self.response_sent.load(Ordering::SeqCst),
                age: self.opened.elapsed(),
            },
        );
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.release();
    }
}

/// Handle to one in-flight exchange.
///
/// Cloning is cheap; the exchange is released when it completes, is aborted,
/// or when the last handle is dropped. Dropping the last handle before a
/// terminal phase counts as an aborted connection.
#[derive(Clone)]
pub struct Exchange {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Exchange")
            .field("id", &self.inner.id)
            .field("phase", &self.phase())
            .finish()
    }
}

impl Exchange {
    pub(crate) fn new(
        id: ExchangeId,
        connection: ConnectionControl,
        observer: Arc<dyn ExchangeObserver>,
    ) -> Self {
        let (escalation, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                id,
                opened: Instant::now(),
                phase: AtomicU8::new(Phase::Reading as u8),
                bytes_received: AtomicBool::new(false),
                response_sent: AtomicBool::new(false),
                timers: Mutex::new(Timers {
                    released: false,
                    read: Slot::Idle,
                    write: Slot::Idle,
                }),
                escalation,
                observer,
                connection,
            }),
        }
    }

    pub fn id(&self) -> ExchangeId {
        self.inner.id
    }

    pub fn phase(&self) -> Phase {
        self.inner.phase()
    }

    pub fn bytes_received(&self) -> bool {
        self.inner.bytes_received.load(Ordering::SeqCst)
    }

    pub fn response_sent(&self) -> bool {
        self.inner.response_sent.load(Ordering::SeqCst)
    }

    /// Start accepting the request body, guarded by `deadline`.
    ///
    /// The read deadline is measured as total elapsed time from this call, so
    /// it fires even while chunks are still arriving.
    pub fn begin_read(&self, deadline: Option<Deadline>) {
        self.arm(TimeoutKind::Read, deadline);
    }

    /// The request body reached end-of-stream.
    pub fn complete_read(&self) {
        self.inner.bytes_received.store(true, Ordering::SeqCst);
        self.inner.timers().read.settle();
        self.inner.advance(Phase::Processing);
    }

    /// Start producing the response, guarded by `deadline`.
    ///
    /// May be called while the request body is still arriving.
    pub fn begin_write(&self, deadline: Option<Deadline>) {
        self.inner.advance(Phase::Writing);
        self.arm(TimeoutKind::Write, deadline);
    }

    /// The response has been handed to the connection in full.
    pub fn complete_write(&self) {
        self.inner.response_sent.store(true, Ordering::SeqCst);
        self.inner.advance(Phase::Completed);
        self.inner.release();
    }

    /// Close the underlying connection without sending a status.
    pub fn abort(&self) {
        self.inner.advance(Phase::Aborted);
        self.inner.emit_if_live(LifecycleEvent::Aborted);
        self.inner.connection.abort();
        self.inner.release();
    }

    /// Drive handler `work` while honoring deadline escalations.
    ///
    /// Log-only deadlines leave `work` untouched. A `Respond` escalation drops
    /// `work` and answers with the configured status. An `Abort` escalation
    /// closes the connection and never yields a response.
    pub async fn run<F>(&self, work: F) -> Response
    where
        F: Future<Output = Response>,
    {
        let mut escalations = self.inner.escalation.subscribe();
        tokio::select! {
            response = work => response,
            escalation = next_escalation(&mut escalations) => self.escalate(escalation).await,
        }
    }

    async fn escalate(&self, escalation: Escalation) -> Response {
        match escalation {
            Escalation::Respond { kind, status } => {
                tracing::debug!(
                    exchange = %self.id(),
                    kind = %kind,
                    status = %status,
                    "Ending exchange with explicit timeout status"
                );
                let message = match kind {
                    TimeoutKind::Read => "Request body was not received in time",
                    TimeoutKind::Write => "Response was not produced in time",
                };
                (status, message).into_response()
            }
            Escalation::Abort { kind } => {
                tracing::debug!(
                    exchange = %self.id(),
                    kind = %kind,
                    "Aborting connection after deadline"
                );
                self.abort();
                // The connection task drops this future once it sees the abort.
                std::future::pending::<Response>().await
            }
        }
    }

    fn arm(&self, kind: TimeoutKind, deadline: Option<Deadline>) {
        let Some(deadline) = deadline else {
            return;
        };

        let mut timers = self.inner.timers();
        if timers.released {
            return;
        }
        let slot = timers.slot(kind);
        if !matches!(slot, Slot::Idle) {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let started = Instant::now();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(deadline.after).await;
            if let Some(inner) = weak.upgrade() {
                inner.deadline_elapsed(kind, started);
            }
        });
        *slot = Slot::Armed { deadline, timer };

        tracing::trace!(
            exchange = %self.inner.id,
            kind = %kind,
            after_ms = deadline.after.as_millis() as u64,
            "Deadline armed"
        );
    }
}

async fn next_escalation(rx: &mut watch::Receiver<Option<Escalation>>) -> Escalation {
    let fired = match rx.wait_for(Option::is_some).await {
        Ok(current) => *current,
        Err(_) => None,
    };
    match fired {
        Some(escalation) => escalation,
        None => std::future::pending().await,
    }
}
