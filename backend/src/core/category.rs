//! State categories
//!
//! Every state of a model is in exactly one phase. The phase decides which
//! step-engine operation is legal next:
//!
//! ```text
//! AwaitEvent(i)  → incorporate_event   (draws from event stream i)
//! AwaitAction(i) → incorporate_action  (i distinguishes multi-stage decisions)
//! Final          → nothing; the trajectory is finished
//! EndOfHorizon   → nothing; the trajectory was truncated
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase marker of a state
///
/// # Example
/// ```
/// use decision_simulator_core_rs::StateCategory;
///
/// let cat = StateCategory::await_action();
/// assert!(cat.is_await_action());
/// assert_eq!(cat.index(), Some(0));
/// assert!(!StateCategory::Final.is_await_event());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StateCategory {
    /// Waiting for an event drawn from the given event stream
    AwaitEvent(usize),

    /// Waiting for an action; the index identifies the decision stage
    AwaitAction(usize),

    /// Terminal state reached through the model dynamics
    Final,

    /// Simulation truncated because a horizon was reached
    EndOfHorizon,
}

impl StateCategory {
    /// `AwaitEvent` on the first (and usually only) event stream
    pub fn await_event() -> Self {
        StateCategory::AwaitEvent(0)
    }

    /// `AwaitAction` for the first (and usually only) decision stage
    pub fn await_action() -> Self {
        StateCategory::AwaitAction(0)
    }

    pub fn is_await_event(&self) -> bool {
        matches!(self, StateCategory::AwaitEvent(_))
    }

    pub fn is_await_action(&self) -> bool {
        matches!(self, StateCategory::AwaitAction(_))
    }

    pub fn is_final(&self) -> bool {
        matches!(self, StateCategory::Final)
    }

    pub fn is_end_of_horizon(&self) -> bool {
        matches!(self, StateCategory::EndOfHorizon)
    }

    /// True for `Final` and `EndOfHorizon`: no engine operation applies anymore
    pub fn is_terminal(&self) -> bool {
        self.is_final() || self.is_end_of_horizon()
    }

    /// Stream / stage index for the awaiting categories
    pub fn index(&self) -> Option<usize> {
        match self {
            StateCategory::AwaitEvent(i) | StateCategory::AwaitAction(i) => Some(*i),
            StateCategory::Final | StateCategory::EndOfHorizon => None,
        }
    }
}

impl fmt::Display for StateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateCategory::AwaitEvent(i) => write!(f, "AwaitEvent({})", i),
            StateCategory::AwaitAction(i) => write!(f, "AwaitAction({})", i),
            StateCategory::Final => write!(f, "Final"),
            StateCategory::EndOfHorizon => write!(f, "EndOfHorizon"),
        }
    }
}
