//! The driver state machine (spec.md §2):
//! `CREATED -> INITIALIZING -> READY -> (DRAINING ->) CLOSED`, with `FAILED`
//! reachable from any non-terminal state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    Created,
    Initializing,
    Ready,
    Draining,
    Closed,
    Failed,
}

impl DriverState {
    /// Whether `replicate`/`replicate_batch` may be called.
    pub fn accepts_events(self) -> bool {
        matches!(self, DriverState::Ready)
    }

    /// Whether `to` is a legal transition from `self`.
    pub fn can_transition_to(self, to: DriverState) -> bool {
        use DriverState::*;
        match (self, to) {
            (Created, Initializing) => true,
            (Initializing, Ready) => true,
            (Ready, Draining) => true,
            (Ready, Closed) => true,
            (Draining, Closed) => true,
            // FAILED is reachable from any non-terminal state.
            (Created | Initializing | Ready | Draining, Failed) => true,
            // Idempotent re-entry into the same state is always allowed.
            (a, b) if a == b => true,
            _ => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("illegal driver state transition: {from:?} -> {to:?}")]
pub struct IllegalTransition {
    pub from: DriverState,
    pub to: DriverState,
}

/// Validates and returns the new state, or an error describing the
/// rejected transition. Drivers hold a `DriverState` field and route every
/// transition through this to keep the invariant centrally enforced.
pub fn transition(from: DriverState, to: DriverState) -> Result<DriverState, IllegalTransition> {
    if from.can_transition_to(to) {
        Ok(to)
    } else {
        Err(IllegalTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DriverState::*;

    #[test]
    fn happy_path_transitions_are_legal() {
        assert!(transition(Created, Initializing).is_ok());
        assert!(transition(Initializing, Ready).is_ok());
        assert!(transition(Ready, Draining).is_ok());
        assert!(transition(Draining, Closed).is_ok());
    }

    #[test]
    fn failed_reachable_from_any_non_terminal_state() {
        assert!(transition(Created, Failed).is_ok());
        assert!(transition(Initializing, Failed).is_ok());
        assert!(transition(Ready, Failed).is_ok());
    }

    #[test]
    fn skipping_initializing_is_rejected() {
        assert!(transition(Created, Ready).is_err());
    }

    #[test]
    fn closed_is_terminal() {
        assert!(transition(Closed, Ready).is_err());
        assert!(transition(Closed, Closed).is_ok());
    }

    #[test]
    fn only_ready_accepts_events() {
        assert!(Ready.accepts_events());
        assert!(!Draining.accepts_events());
        assert!(!Initializing.accepts_events());
    }
}
