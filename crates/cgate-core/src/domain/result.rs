//! Typed compliance result returned by the service.

use serde::{Deserialize, Serialize};

use super::error::{GateError, Result};
use super::severity::Severity;

/// Upper bound of `compliance_score`.
pub const MAX_SCORE: u8 = 100;

/// A single policy violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceViolation {
    pub rule_id: String,
    #[serde(alias = "rule_name")]
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub framework: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ComplianceViolation {
    /// `path[:line]` reference, if the violation points at a file.
    pub fn location(&self) -> Option<String> {
        self.file_path.as_ref().map(|path| match self.line_number {
            Some(line) => format!("{}:{}", path, line),
            None => path.clone(),
        })
    }
}

/// Result of a compliance evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub compliance_score: u8,
    pub frameworks_checked: Vec<String>,
    #[serde(default)]
    pub violations: Vec<ComplianceViolation>,
    #[serde(default)]
    pub human_review_required: bool,
}

impl ComplianceResult {
    /// Parse and validate a service response body.
    pub fn from_json(body: &str) -> Result<Self> {
        let result: ComplianceResult = serde_json::from_str(body)?;
        result.validate()?;
        Ok(result)
    }

    /// Check the constraints serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.compliance_score > MAX_SCORE {
            return Err(GateError::MalformedResponse(format!(
                "compliance_score {} is outside 0..={}",
                self.compliance_score, MAX_SCORE
            )));
        }
        if !self.violations.is_empty() && self.frameworks_checked.is_empty() {
            return Err(GateError::MalformedResponse(
                "violations reported but frameworks_checked is empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Number of violations with exactly the given severity.
    pub fn count_severity(&self, severity: Severity) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity == severity)
            .count()
    }

    /// Number of violations at or above the given severity.
    pub fn count_at_or_above(&self, threshold: Severity) -> usize {
        self.violations
            .iter()
            .filter(|v| v.severity >= threshold)
            .count()
    }
}
