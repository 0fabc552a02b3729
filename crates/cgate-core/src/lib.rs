//! Compliance Gate Core Library
//!
//! Domain model and building blocks of the compliance gate build step:
//! context collection, credential resolution, gate decisions, report
//! artifacts and the build action recorder.

pub mod collector;
pub mod config;
pub mod console;
pub mod credentials;
pub mod domain;
pub mod gate;
pub mod obs;
pub mod recorder;
pub mod reporting;
pub mod telemetry;

pub use collector::{
    BuildContextCollector, BuildHandle, DEFAULT_ENV_VALUE_CAP, MAX_FILES_PER_PATTERN,
    SOURCE_PATTERNS,
};
pub use config::{validate_server_url, GateConfig, GateSettings};
pub use console::{BuildConsole, MemoryConsole, StdoutConsole};
pub use credentials::{
    ApiKey, CredentialResolver, EnvCredentialResolver, FileCredentialResolver,
    MemoryCredentialResolver,
};
pub use domain::{
    parse_frameworks, BuildContext, BuildRef, ComplianceRequest, ComplianceResult,
    ComplianceViolation, GateError, Mode, OutputFormat, RequestOptions, Result, ReviewThreshold,
    Severity,
};
pub use gate::{ComplianceGate, GateDecision, GatePolicy};
pub use recorder::{
    ActionRecorder, ComplianceAction, FileActionRecorder, MemoryActionRecorder, ACTION_JSON_FILE,
};
pub use reporting::{
    render_console_summary, render_report_json, render_summary_md, write_report_json,
    write_reports, write_summary_md, ReportArtifacts, GENERATED_AT_PREFIX, REPORT_JSON_FILE,
    SUMMARY_MD_FILE,
};

pub use obs::{
    emit_gate_decided, emit_report_failed, emit_report_written, emit_state_transition,
    emit_step_finished, emit_step_started, emit_submission_completed, emit_submission_sent,
    invocation_span, InvocationSpan,
};
pub use telemetry::init_tracing;

/// Compliance gate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
