//! Build-step state machine.

use serde::{Deserialize, Serialize};

/// States of one compliance gate invocation.
///
/// `Collecting → Submitting → Evaluating → Reporting → {Passed | Failed}`.
/// Any state may jump to `Failed`; a failure after a result was obtained
/// passes through `Reporting` first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepState {
    Collecting,
    Submitting,
    Evaluating,
    Reporting,
    Passed,
    Failed,
}

impl StepState {
    pub fn name(&self) -> &'static str {
        match self {
            StepState::Collecting => "collecting",
            StepState::Submitting => "submitting",
            StepState::Evaluating => "evaluating",
            StepState::Reporting => "reporting",
            StepState::Passed => "passed",
            StepState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StepState::Passed | StepState::Failed)
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(&self, next: StepState) -> bool {
        use StepState::*;
        match (self, next) {
            (Passed | Failed, _) => false,
            (_, Failed) => true,
            (Collecting, Submitting) => true,
            (Submitting, Evaluating) => true,
            (Evaluating, Reporting) => true,
            (Reporting, Passed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for StepState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Records the states an invocation passes through.
#[derive(Debug, Clone)]
pub struct StateTracker {
    visited: Vec<StepState>,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StateTracker {
    pub fn new() -> Self {
        Self {
            visited: vec![StepState::Collecting],
        }
    }

    pub fn current(&self) -> StepState {
        *self.visited.last().unwrap_or(&StepState::Collecting)
    }

    /// Move to `next`. Illegal transitions are ignored and logged.
    pub fn advance(&mut self, next: StepState) {
        let current = self.current();
        if current.can_transition_to(next) {
            cgate_core::emit_state_transition(current.name(), next.name());
            self.visited.push(next);
        } else {
            tracing::warn!(from = %current, to = %next, "ignoring illegal state transition");
        }
    }

    pub fn visited(&self) -> &[StepState] {
        &self.visited
    }

    pub fn into_visited(self) -> Vec<StepState> {
        self.visited
    }
}
