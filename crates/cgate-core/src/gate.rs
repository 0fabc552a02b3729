//! Gate decision engine.
//!
//! Turns a [`ComplianceResult`] into a continue/fail decision for the build
//! using the configured severity threshold. Pure: no I/O.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::{ComplianceResult, Severity};

/// Outcome of the gate decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    /// Whether the build may continue.
    pub continue_build: bool,

    /// Human-readable reason for the decision.
    pub reason: String,

    /// Blocking violations per severity; empty when the build continues.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocking: BTreeMap<Severity, usize>,
}

impl GateDecision {
    fn pass(reason: impl Into<String>) -> Self {
        Self {
            continue_build: true,
            reason: reason.into(),
            blocking: BTreeMap::new(),
        }
    }

    fn fail(reason: impl Into<String>, blocking: BTreeMap<Severity, usize>) -> Self {
        Self {
            continue_build: false,
            reason: reason.into(),
            blocking,
        }
    }

    /// `critical: 1, high: 2`, most severe first.
    pub fn blocking_summary(&self) -> String {
        self.blocking
            .iter()
            .rev()
            .map(|(severity, n)| format!("{}: {}", severity, n))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Gate policy applied to a compliance result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatePolicy {
    /// Minimum severity that fails the build.
    pub severity_threshold: Severity,

    /// When false, the build always continues.
    pub fail_on_violations: bool,
}

impl Default for GatePolicy {
    fn default() -> Self {
        Self {
            severity_threshold: Severity::Medium,
            fail_on_violations: true,
        }
    }
}

/// Compliance gate decision rules.
pub struct ComplianceGate;

impl ComplianceGate {
    /// Decide whether the build continues.
    ///
    /// Rules, in order:
    /// - `fail_on_violations == false` always continues
    /// - no violations continues
    /// - any violation with severity >= threshold fails
    /// - otherwise continues
    pub fn decide(
        result: &ComplianceResult,
        severity_threshold: Severity,
        fail_on_violations: bool,
    ) -> GateDecision {
        if !fail_on_violations {
            return GateDecision::pass("continuing despite violations");
        }

        if result.violations.is_empty() {
            return GateDecision::pass("no violations found");
        }

        let threshold_index = severity_threshold.index();
        let blocking = result
            .violations
            .iter()
            .filter(|v| v.severity.index() >= threshold_index)
            .count();

        if blocking > 0 {
            let counts = Severity::ALL
                .iter()
                .filter(|s| s.index() >= threshold_index)
                .filter_map(|s| match result.count_severity(*s) {
                    0 => None,
                    n => Some((*s, n)),
                })
                .collect();
            GateDecision::fail(
                format!(
                    "{} violations at or above {} severity",
                    blocking, severity_threshold
                ),
                counts,
            )
        } else {
            GateDecision::pass("no violations at or above threshold")
        }
    }

    /// Same as [`ComplianceGate::decide`], taking a [`GatePolicy`].
    pub fn evaluate(result: &ComplianceResult, policy: &GatePolicy) -> GateDecision {
        Self::decide(result, policy.severity_threshold, policy.fail_on_violations)
    }
}
