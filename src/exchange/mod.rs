//! Request lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! Request head parsed
//!     → controller.rs (open exchange on the connection)
//!     → lifecycle.rs begin_read (arm read deadline)
//!     → body end-of-stream → complete_read
//!     → lifecycle.rs begin_write (arm write deadline)
//!     → response end-of-stream → complete_write → release
//!
//! Deadline elapsed:
//!     → phase → ReadTimedOut | WriteTimedOut (first terminal wins)
//!     → observer.rs (event only)
//!     → escalation to the handler if the deadline's action is not log-only
//! ```
//!
//! # Design Decisions
//! - A deadline firing is an event, not an action
//! - Every client-visible consequence comes from an explicit `TimeoutAction`
//! - Read deadline is total elapsed time since `begin_read`, not inactivity
//! - One connection may carry many exchanges; ids are (connection, sequence)

pub mod controller;
pub mod deadline;
pub mod lifecycle;
pub mod observer;
pub mod phase;

pub use controller::LifecycleController;
pub use deadline::{Deadline, Escalation, TimeoutAction, TimeoutKind};
pub use lifecycle::Exchange;
pub use observer::{ExchangeObserver, LifecycleEvent, NoopObserver, Recorder};
pub use phase::Phase;

use crate::net::connection::ConnectionId;

/// Identifies one exchange: the connection it arrived on and its position there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExchangeId {
    connection: ConnectionId,
    sequence: u64,
}

impl ExchangeId {
    pub fn new(connection: ConnectionId, sequence: u64) -> Self {
        Self {
            connection,
            sequence,
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// 1-based position of this exchange on its connection.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl std::fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.connection, self.sequence)
    }
}
