//! Deadlines and the explicit action attached to each one.

use axum::http::StatusCode;
use std::time::Duration;

/// Which side of the exchange a deadline guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutKind {
    /// Inbound request body.
    Read,
    /// Outbound response.
    Write,
}

impl TimeoutKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TimeoutKind::Read => "read",
            TimeoutKind::Write => "write",
        }
    }

    /// Status used when a `respond` action does not name one.
    pub fn default_status(self) -> StatusCode {
        match self {
            TimeoutKind::Read => StatusCode::REQUEST_TIMEOUT,
            TimeoutKind::Write => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl std::fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the handler does once a deadline has fired.
///
/// The deadline itself only records the event; the action is applied by
/// [`Exchange::run`](super::Exchange::run).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutAction {
    /// Observe only. The late response is still delivered.
    LogOnly,
    /// End the exchange with an explicit status.
    Respond(StatusCode),
    /// Close the connection without any status.
    Abort,
}

/// A maximum duration for one phase plus the action taken when it elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    pub after: Duration,
    pub action: TimeoutAction,
}

impl Deadline {
    pub fn new(after: Duration, action: TimeoutAction) -> Self {
        Self { after, action }
    }

    pub fn log_only(after: Duration) -> Self {
        Self::new(after, TimeoutAction::LogOnly)
    }

    pub fn respond(after: Duration, status: StatusCode) -> Self {
        Self::new(after, TimeoutAction::Respond(status))
    }

    pub fn abort(after: Duration) -> Self {
        Self::new(after, TimeoutAction::Abort)
    }
}

/// A fired deadline whose action requires the handler to act.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    Respond { kind: TimeoutKind, status: StatusCode },
    Abort { kind: TimeoutKind },
}

impl Escalation {
    /// Build the escalation for a fired deadline. Log-only deadlines never escalate.
    pub fn for_deadline(kind: TimeoutKind, deadline: &Deadline) -> Option<Self> {
        match deadline.action {
            TimeoutAction::LogOnly => None,
            TimeoutAction::Respond(status) => Some(Escalation::Respond { kind, status }),
            TimeoutAction::Abort => Some(Escalation::Abort { kind }),
        }
    }
}
