//! Build action recorder.
//!
//! Attaches a read-only [`ComplianceAction`] to the build record so that a
//! host UI can display it later.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::domain::{
    BuildRef, ComplianceResult, ComplianceViolation, GateError, Result, Severity,
};

pub const ACTION_JSON_FILE: &str = "compliance-action.json";

/// Compliance result attached to a build.
///
/// Severity counts are recomputed from the violation list on every call.
#[derive(Debug, Clone)]
pub struct ComplianceAction {
    build: BuildRef,
    result: Arc<ComplianceResult>,
    recorded_at: DateTime<Utc>,
    result_digest: String,
}

impl ComplianceAction {
    pub fn new(build: BuildRef, result: Arc<ComplianceResult>) -> Self {
        let result_digest = digest_result(&result);
        Self {
            build,
            result,
            recorded_at: Utc::now(),
            result_digest,
        }
    }

    pub fn build(&self) -> &BuildRef {
        &self.build
    }

    pub fn score(&self) -> u8 {
        self.result.compliance_score
    }

    pub fn frameworks_checked(&self) -> &[String] {
        &self.result.frameworks_checked
    }

    pub fn violations(&self) -> &[ComplianceViolation] {
        &self.result.violations
    }

    pub fn human_review_required(&self) -> bool {
        self.result.human_review_required
    }

    pub fn critical_count(&self) -> usize {
        self.result.count_severity(Severity::Critical)
    }

    pub fn high_count(&self) -> usize {
        self.result.count_severity(Severity::High)
    }

    pub fn medium_count(&self) -> usize {
        self.result.count_severity(Severity::Medium)
    }

    pub fn low_count(&self) -> usize {
        self.result.count_severity(Severity::Low)
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    /// SHA-256 of the compact result JSON.
    pub fn result_digest(&self) -> &str {
        &self.result_digest
    }

    pub fn result(&self) -> &ComplianceResult {
        &self.result
    }

    fn record(&self) -> ActionRecord<'_> {
        ActionRecord {
            build: &self.build,
            recorded_at: self.recorded_at,
            result_digest: &self.result_digest,
            critical: self.critical_count(),
            high: self.high_count(),
            medium: self.medium_count(),
            low: self.low_count(),
            result: &self.result,
        }
    }
}

#[derive(Serialize)]
struct ActionRecord<'a> {
    build: &'a BuildRef,
    recorded_at: DateTime<Utc>,
    result_digest: &'a str,
    critical: usize,
    high: usize,
    medium: usize,
    low: usize,
    result: &'a ComplianceResult,
}

fn digest_result(result: &ComplianceResult) -> String {
    let bytes = serde_json::to_vec(result).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    hex::encode(hasher.finalize())
}

/// Stores compliance actions on the build record.
#[async_trait]
pub trait ActionRecorder: Send + Sync {
    async fn attach(&self, action: ComplianceAction) -> Result<()>;
}

// ---------------------------------------------------------------------------
// MemoryActionRecorder
// ---------------------------------------------------------------------------

/// Keeps attached actions in memory.
#[derive(Debug, Default)]
pub struct MemoryActionRecorder {
    actions: Mutex<Vec<ComplianceAction>>,
}

impl MemoryActionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> Vec<ComplianceAction> {
        self.actions.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ActionRecorder for MemoryActionRecorder {
    async fn attach(&self, action: ComplianceAction) -> Result<()> {
        let mut actions = self.actions.lock().map_err(|_| GateError::ReportWrite {
            path: "<memory>".to_string(),
            reason: "action store lock poisoned".to_string(),
        })?;
        actions.push(action);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileActionRecorder
// ---------------------------------------------------------------------------

/// Writes the action as `compliance-action.json` into a directory.
#[derive(Debug, Clone)]
pub struct FileActionRecorder {
    dir: PathBuf,
}

impl FileActionRecorder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(ACTION_JSON_FILE)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl ActionRecorder for FileActionRecorder {
    async fn attach(&self, action: ComplianceAction) -> Result<()> {
        let path = self.path();
        let to_err = |reason: String| GateError::ReportWrite {
            path: path.display().to_string(),
            reason,
        };
        std::fs::create_dir_all(&self.dir).map_err(|e| to_err(e.to_string()))?;
        let content =
            serde_json::to_string_pretty(&action.record()).map_err(|e| to_err(e.to_string()))?;
        std::fs::write(&path, content).map_err(|e| to_err(e.to_string()))?;
        Ok(())
    }
}
