//! Compliance gate build step.
//!
//! Drives one invocation through `Collecting → Submitting → Evaluating →
//! Reporting → {Passed | Failed}` and returns the verdict to the host.

pub mod state;
pub mod step;

pub use state::{StateTracker, StepState};
pub use step::{ComplianceStep, StepOutcome};
