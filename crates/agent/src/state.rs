//! Orchestrator lifecycle states
//!
//! `Init -> Running -> Draining -> Stopped`, forward only. A failed startup
//! goes straight from `Init` to `Stopped`.

use std::fmt;

use tokio::sync::watch;
use tracing::info;

use crate::error::AgentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AgentState {
    Init,
    Running,
    Draining,
    Stopped,
}

impl AgentState {
    pub fn ordinal(self) -> u8 {
        match self {
            Self::Init => 0,
            Self::Running => 1,
            Self::Draining => 2,
            Self::Stopped => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Running => "RUNNING",
            Self::Draining => "DRAINING",
            Self::Stopped => "STOPPED",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Stopped
    }

    /// Only forward moves; `Init -> Draining` is not a thing
    pub fn can_advance_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Init, Self::Running)
                | (Self::Init, Self::Stopped)
                | (Self::Running, Self::Draining)
                | (Self::Draining, Self::Stopped)
        )
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state plus change notification for observers
#[derive(Debug)]
pub struct StateMachine {
    tx: watch::Sender<AgentState>,
}

impl StateMachine {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(AgentState::Init);
        observability::record_agent_state(AgentState::Init.ordinal());
        Self { tx }
    }

    pub fn current(&self) -> AgentState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<AgentState> {
        self.tx.subscribe()
    }

    /// Move to `next`, logging the transition.
    ///
    /// # Errors
    /// [`AgentError::InvalidTransition`] for anything but a forward step.
    pub fn advance(&self, next: AgentState) -> Result<(), AgentError> {
        let current = self.current();
        if !current.can_advance_to(next) {
            return Err(AgentError::InvalidTransition {
                from: current,
                to: next,
            });
        }
        self.tx.send_replace(next);
        observability::record_agent_state(next.ordinal());
        info!(from = %current, to = %next, "Agent state transition");
        Ok(())
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_lifecycle() {
        let machine = StateMachine::new();
        let mut rx = machine.subscribe();
        assert_eq!(machine.current(), AgentState::Init);

        machine.advance(AgentState::Running).unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), AgentState::Running);

        machine.advance(AgentState::Draining).unwrap();
        machine.advance(AgentState::Stopped).unwrap();
        assert!(machine.current().is_terminal());
    }

    #[test]
    fn test_no_backward_or_skipping_moves() {
        let machine = StateMachine::new();
        assert!(machine.advance(AgentState::Draining).is_err());

        machine.advance(AgentState::Running).unwrap();
        assert!(matches!(
            machine.advance(AgentState::Init),
            Err(AgentError::InvalidTransition {
                from: AgentState::Running,
                to: AgentState::Init
            })
        ));
        assert!(machine.advance(AgentState::Stopped).is_err());
        assert_eq!(machine.current(), AgentState::Running);
    }

    #[test]
    fn test_failed_startup_stops_from_init() {
        let machine = StateMachine::new();
        machine.advance(AgentState::Stopped).unwrap();
        assert!(machine.advance(AgentState::Running).is_err());
    }
}
