//! Compliance gate build step.

use std::sync::Arc;
use std::time::Instant;

use cgate_client::ComplianceService;
use cgate_core::{
    emit_gate_decided, emit_report_failed, emit_report_written, emit_step_finished,
    emit_step_started, invocation_span, render_console_summary, render_report_json, write_reports,
    ActionRecorder, BuildConsole, BuildContext, BuildContextCollector, BuildHandle, ComplianceAction,
    ComplianceGate, ComplianceRequest, ComplianceResult, CredentialResolver, GateConfig,
    GateDecision, GateError, GateSettings, ReportArtifacts,
};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::state::{StateTracker, StepState};

/// Result of one build-step invocation.
#[derive(Debug)]
pub struct StepOutcome {
    /// Unique id of this invocation.
    pub invocation_id: String,

    /// Terminal state (`Passed` or `Failed`).
    pub state: StepState,

    /// Whether the host should continue the build.
    pub continue_build: bool,

    /// Decision reason, or the error message on failure.
    pub reason: String,

    /// Fatal error, if any.
    pub error: Option<GateError>,

    /// Result obtained from the service, if the submission succeeded.
    pub result: Option<Arc<ComplianceResult>>,

    /// Gate decision, if evaluation ran.
    pub decision: Option<GateDecision>,

    /// Written report artifacts, if publishing succeeded.
    pub artifacts: Option<ReportArtifacts>,

    /// States visited, in order.
    pub transitions: Vec<StepState>,

    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl StepOutcome {
    pub fn passed(&self) -> bool {
        self.state == StepState::Passed && self.continue_build
    }
}

/// The compliance gate build step.
///
/// Runs sequentially: collect context, resolve the credential, submit,
/// evaluate, report. Configuration is validated before construction, so
/// configuration errors never reach the network.
pub struct ComplianceStep {
    settings: GateSettings,
    collector: BuildContextCollector,
    credentials: Arc<dyn CredentialResolver>,
    service: Arc<dyn ComplianceService>,
    recorder: Arc<dyn ActionRecorder>,
    console: Arc<dyn BuildConsole>,
}

impl ComplianceStep {
    pub fn new(
        settings: GateSettings,
        credentials: Arc<dyn CredentialResolver>,
        service: Arc<dyn ComplianceService>,
        recorder: Arc<dyn ActionRecorder>,
        console: Arc<dyn BuildConsole>,
    ) -> Self {
        let collector = BuildContextCollector::new(settings.env_value_cap);
        Self {
            settings,
            collector,
            credentials,
            service,
            recorder,
            console,
        }
    }

    /// Validate a raw config and build the step.
    pub fn from_config(
        config: &GateConfig,
        credentials: Arc<dyn CredentialResolver>,
        service: Arc<dyn ComplianceService>,
        recorder: Arc<dyn ActionRecorder>,
        console: Arc<dyn BuildConsole>,
    ) -> cgate_core::Result<Self> {
        let settings = config.validate()?;
        Ok(Self::new(settings, credentials, service, recorder, console))
    }

    pub fn settings(&self) -> &GateSettings {
        &self.settings
    }

    /// Execute the step for one build.
    pub async fn run(&self, handle: &BuildHandle, cancel: &CancellationToken) -> StepOutcome {
        let invocation_id = Uuid::new_v4().to_string();
        let span = invocation_span(&invocation_id, &handle.job_name, handle.build_number);
        self.run_invocation(invocation_id, handle, cancel)
            .instrument(span)
            .await
    }

    async fn run_invocation(
        &self,
        invocation_id: String,
        handle: &BuildHandle,
        cancel: &CancellationToken,
    ) -> StepOutcome {
        let start = Instant::now();
        let mut tracker = StateTracker::new();

        emit_step_started(
            &invocation_id,
            &self.settings.server_url,
            &self.settings.frameworks,
        );
        self.console.line(&format!(
            "🛡️ Compliance gate: frameworks [{}], mode {}, severity threshold {}",
            self.settings.frameworks.join(", "),
            self.settings.mode,
            self.settings.severity_threshold
        ));

        let context = self.collector.collect(handle, self.console.as_ref());

        tracker.advance(StepState::Submitting);
        let result = match self.submit(&context, cancel).await {
            Ok(result) => Arc::new(result),
            Err(err) => {
                return self
                    .fail(invocation_id, tracker, start, &context, err, None, None)
                    .await;
            }
        };
        self.console.line(&format!(
            "✓ Compliance service returned score {}/100 with {} violation(s)",
            result.compliance_score,
            result.violations.len()
        ));

        tracker.advance(StepState::Evaluating);
        let decision = ComplianceGate::evaluate(&result, &self.settings.gate_policy());
        emit_gate_decided(decision.continue_build, &decision.reason);

        if cancel.is_cancelled() {
            return self.fail(
                invocation_id,
                tracker,
                start,
                &context,
                GateError::Cancelled,
                Some(result),
                Some(decision),
            )
            .await;
        }

        tracker.advance(StepState::Reporting);
        let artifacts = self.report(&context, &result).await;

        let state = if decision.continue_build {
            self.console
                .line(&format!("✓ Compliance gate passed: {}", decision.reason));
            StepState::Passed
        } else {
            self.console.error(&format!(
                "Compliance gate failed: {} ({})",
                decision.reason,
                decision.blocking_summary()
            ));
            StepState::Failed
        };
        tracker.advance(state);

        let duration_ms = start.elapsed().as_millis() as u64;
        emit_step_finished(&invocation_id, state.name(), duration_ms, decision.continue_build);

        StepOutcome {
            invocation_id,
            state,
            continue_build: decision.continue_build,
            reason: decision.reason.clone(),
            error: None,
            result: Some(result),
            decision: Some(decision),
            artifacts,
            transitions: tracker.into_visited(),
            duration_ms,
        }
    }

    async fn submit(
        &self,
        context: &BuildContext,
        cancel: &CancellationToken,
    ) -> cgate_core::Result<ComplianceResult> {
        let api_key = self.credentials.resolve(&self.settings.credentials_id)?;
        let request = ComplianceRequest::new(
            context.clone(),
            self.settings.frameworks.clone(),
            self.settings.mode,
            self.settings.request_options(),
        )?;

        self.console
            .line(&format!("📤 Submitting to {}", self.settings.server_url));
        self.service.submit(&request, &api_key, cancel).await
    }

    /// Publish artifacts and attach the action. Never fails the step.
    async fn report(
        &self,
        context: &BuildContext,
        result: &Arc<ComplianceResult>,
    ) -> Option<ReportArtifacts> {
        let format = self.settings.output_format;
        if format.shows_summary() {
            for line in render_console_summary(result) {
                self.console.line(&line);
            }
        }

        let mut artifacts = None;
        if self.settings.publish_results {
            let dir = self.settings.reports_dir_in(&context.workspace);
            match write_reports(&dir, result, Utc::now()) {
                Ok(written) => {
                    emit_report_written(&written.json_path.display().to_string());
                    emit_report_written(&written.summary_path.display().to_string());
                    if format.shows_json() {
                        self.console.line(&format!(
                            "📄 JSON report: {}",
                            written.json_path.display()
                        ));
                    }
                    if format.shows_summary() {
                        self.console.line(&format!(
                            "📝 Summary report: {}",
                            written.summary_path.display()
                        ));
                    }
                    artifacts = Some(written);
                }
                Err(err) => {
                    emit_report_failed(&err);
                    self.console.warn(&format!("Could not write reports: {}", err));
                }
            }
        } else if format.shows_json() {
            match render_report_json(result) {
                Ok(json) => self.console.line(&json),
                Err(err) => self.console.warn(&err.to_string()),
            }
        }

        let action = ComplianceAction::new(context.build_ref(), Arc::clone(result));
        if let Err(err) = self.recorder.attach(action).await {
            emit_report_failed(&err);
            self.console
                .warn(&format!("Could not attach compliance results to build: {}", err));
        }

        artifacts
    }

    #[allow(clippy::too_many_arguments)]
    async fn fail(
        &self,
        invocation_id: String,
        mut tracker: StateTracker,
        start: Instant,
        context: &BuildContext,
        err: GateError,
        result: Option<Arc<ComplianceResult>>,
        decision: Option<GateDecision>,
    ) -> StepOutcome {
        error!(state = %tracker.current(), error = %err, "compliance gate step failed");
        self.console.error(&format!("Compliance check failed: {}", err));

        // A result obtained before the failure is still published.
        let artifacts = match &result {
            Some(result) => {
                tracker.advance(StepState::Reporting);
                self.report(context, result).await
            }
            None => None,
        };
        tracker.advance(StepState::Failed);

        let duration_ms = start.elapsed().as_millis() as u64;
        emit_step_finished(&invocation_id, StepState::Failed.name(), duration_ms, false);
        info!(reason = %err, "build marked failed");

        StepOutcome {
            invocation_id,
            state: StepState::Failed,
            continue_build: false,
            reason: err.to_string(),
            error: Some(err),
            result,
            decision,
            artifacts,
            transitions: tracker.into_visited(),
            duration_ms,
        }
    }
}
