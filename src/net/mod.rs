//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (id, abort control, tracking)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - A connection may carry several exchanges; abort closes all of it

pub mod connection;
pub mod listener;

pub use connection::{ConnectionControl, ConnectionId, ConnectionTracker};
pub use listener::{Listener, ListenerError};
