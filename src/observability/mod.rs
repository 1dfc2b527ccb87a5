//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Exchange lifecycle events
//!     → observer.rs (TracingObserver)
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Observers never change an exchange; they only see what already happened
//! - Metrics are cheap (atomic increments) and no-ops without a recorder

pub mod logging;
pub mod metrics;
pub mod observer;

pub use observer::TracingObserver;
