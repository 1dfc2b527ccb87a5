//! Exchange phase state machine.
//!
//! # States
//! - Reading: request head parsed, body may still be arriving
//! - Processing: body fully received, handler working
//! - Writing: response production has started
//! - Completed / ReadTimedOut / WriteTimedOut / Aborted: terminal
//!
//! # State Transitions
//! ```text
//! Reading → Processing → Writing → Completed
//!    │          │           │
//!    └──────────┴───────────┴──→ ReadTimedOut | WriteTimedOut | Aborted
//! ```
//!
//! Transitions only move forward. Once a terminal phase is set it is never
//! left, so exactly one terminal phase is ever observed per exchange.

use crate::error::ExchangeError;

/// Lifecycle phase of a single exchange.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Reading = 0,
    Processing = 1,
    Writing = 2,
    Completed = 3,
    ReadTimedOut = 4,
    WriteTimedOut = 5,
    Aborted = 6,
}

impl From<u8> for Phase {
    fn from(val: u8) -> Self {
        match val {
            0 => Phase::Reading,
            1 => Phase::Processing,
            2 => Phase::Writing,
            3 => Phase::Completed,
            4 => Phase::ReadTimedOut,
            5 => Phase::WriteTimedOut,
            _ => Phase::Aborted,
        }
    }
}

impl Phase {
    /// Return true for phases that end the exchange.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Phase::Completed | Phase::ReadTimedOut | Phase::WriteTimedOut | Phase::Aborted
        )
    }

    /// Whether `next` is a legal forward move from `self`.
    pub fn can_advance_to(self, next: Phase) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.is_terminal() || (next as u8) > (self as u8)
    }

    /// Map a terminal phase to the caller-visible outcome.
    ///
    /// Returns `None` while the exchange is still in flight.
    pub fn outcome(self) -> Option<Result<(), ExchangeError>> {
        match self {
            Phase::Completed => Some(Ok(())),
            Phase::ReadTimedOut => Some(Err(ExchangeError::ReadTimeout)),
            Phase::WriteTimedOut => Some(Err(ExchangeError::WriteTimeout)),
            Phase::Aborted => Some(Err(ExchangeError::AbortedConnection)),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Reading => "reading",
            Phase::Processing => "processing",
            Phase::Writing => "writing",
            Phase::Completed => "completed",
            Phase::ReadTimedOut => "read_timed_out",
            Phase::WriteTimedOut => "write_timed_out",
            Phase::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Phase; 7] = [
        Phase::Reading,
        Phase::Processing,
        Phase::Writing,
        Phase::Completed,
        Phase::ReadTimedOut,
        Phase::WriteTimedOut,
        Phase::Aborted,
    ];

    #[test]
    fn u8_conversion_preserves_phase() {
        for phase in ALL {
            assert_eq!(Phase::from(phase as u8), phase);
        }
    }

    #[test]
    fn terminal_phases_never_advance() {
        for from in ALL.into_iter().filter(|p| p.is_terminal()) {
            for to in ALL {
                assert!(!from.can_advance_to(to), "{} -> {} must be rejected", from, to);
            }
        }
    }

    #[test]
    fn forward_only_between_live_phases() {
        assert!(Phase::Reading.can_advance_to(Phase::Processing));
        assert!(Phase::Reading.can_advance_to(Phase::Writing));
        assert!(Phase::Processing.can_advance_to(Phase::Writing));
        assert!(!Phase::Writing.can_advance_to(Phase::Processing));
        assert!(!Phase::Processing.can_advance_to(Phase::Reading));
        assert!(!Phase::Writing.can_advance_to(Phase::Writing));
    }

    #[test]
    fn any_live_phase_can_terminate() {
        for from in [Phase::Reading, Phase::Processing, Phase::Writing] {
            assert!(from.can_advance_to(Phase::Completed));
            assert!(from.can_advance_to(Phase::ReadTimedOut));
            assert!(from.can_advance_to(Phase::WriteTimedOut));
            assert!(from.can_advance_to(Phase::Aborted));
        }
    }

    #[test]
    fn outcome_only_for_terminal() {
        assert!(Phase::Writing.outcome().is_none());
        assert!(matches!(Phase::Completed.outcome(), Some(Ok(()))));
        assert!(matches!(
            Phase::WriteTimedOut.outcome(),
            Some(Err(ExchangeError::WriteTimeout))
        ));
    }
}
