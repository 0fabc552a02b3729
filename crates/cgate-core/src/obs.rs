//! Structured observability events for the build-step lifecycle.
//!
//! - `InvocationSpan`: RAII guard for an invocation-scoped span
//! - `invocation_span`: the same span, for `Instrument`ing async work
//! - `emit_*` functions for lifecycle events
//!
//! Secrets are never passed to these functions.

use tracing::{info, warn};

/// RAII guard that enters an invocation-scoped span.
///
/// # Example
///
/// ```ignore
/// let _span = InvocationSpan::enter("0b9c...", "payments", 42);
/// // all tracing calls now carry invocation_id, job and build
/// ```
pub struct InvocationSpan {
    _span: tracing::span::EnteredSpan,
}

impl InvocationSpan {
    pub fn enter(invocation_id: &str, job_name: &str, build_number: u64) -> Self {
        Self {
            _span: invocation_span(invocation_id, job_name, build_number).entered(),
        }
    }
}

/// Invocation-scoped span for instrumenting futures.
pub fn invocation_span(invocation_id: &str, job_name: &str, build_number: u64) -> tracing::Span {
    tracing::info_span!(
        "cgate.invocation",
        invocation_id = %invocation_id,
        job = %job_name,
        build = build_number,
    )
}

pub fn emit_step_started(invocation_id: &str, server_url: &str, frameworks: &[String]) {
    info!(
        event = "step.started",
        invocation_id = %invocation_id,
        server_url = %server_url,
        frameworks = %frameworks.join(","),
    );
}

pub fn emit_state_transition(from: &str, to: &str) {
    info!(event = "step.transition", from = %from, to = %to);
}

pub fn emit_submission_sent(endpoint: &str, frameworks: usize, source_files: usize) {
    info!(
        event = "submission.sent",
        endpoint = %endpoint,
        frameworks = frameworks,
        source_files = source_files,
    );
}

pub fn emit_submission_completed(status: u16, duration_ms: u64, violations: usize, score: u8) {
    info!(
        event = "submission.completed",
        status = status,
        duration_ms = duration_ms,
        violations = violations,
        score = score,
    );
}

pub fn emit_gate_decided(continue_build: bool, reason: &str) {
    info!(event = "gate.decided", continue_build = continue_build, reason = %reason);
}

pub fn emit_report_written(path: &str) {
    info!(event = "report.written", path = %path);
}

/// Warning level: report persistence is best-effort.
pub fn emit_report_failed(error: &dyn std::fmt::Display) {
    warn!(event = "report.failed", error = %error);
}

pub fn emit_step_finished(invocation_id: &str, state: &str, duration_ms: u64, continue_build: bool) {
    info!(
        event = "step.finished",
        invocation_id = %invocation_id,
        state = %state,
        duration_ms = duration_ms,
        continue_build = continue_build,
    );
}
