//! Outbound request payload.

use serde::{Deserialize, Serialize};

use super::context::BuildContext;
use super::error::{GateError, Result};
use super::severity::{Mode, ReviewThreshold, Severity};

/// Options bag understood by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    pub severity_threshold: Severity,
    pub human_review_threshold: ReviewThreshold,
    pub include_suggestions: bool,
    pub include_evidence: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            severity_threshold: Severity::Medium,
            human_review_threshold: ReviewThreshold::High,
            include_suggestions: true,
            include_evidence: true,
        }
    }
}

/// Body of `POST /api/v1/compliance/jenkins-validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceRequest {
    pub context: BuildContext,
    pub frameworks: Vec<String>,
    pub mode: Mode,
    pub options: RequestOptions,
}

impl ComplianceRequest {
    /// Build a request; frameworks must be non-empty.
    pub fn new(
        context: BuildContext,
        frameworks: Vec<String>,
        mode: Mode,
        options: RequestOptions,
    ) -> Result<Self> {
        if frameworks.is_empty() {
            return Err(GateError::configuration(
                "at least one framework must be selected",
            ));
        }
        Ok(Self {
            context,
            frameworks,
            mode,
            options,
        })
    }
}

/// Split a comma-separated framework list into an ordered, de-duplicated set.
pub fn parse_frameworks(raw: &str) -> Result<Vec<String>> {
    let mut frameworks: Vec<String> = Vec::new();
    for name in raw.split(',') {
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() || frameworks.contains(&name) {
            continue;
        }
        frameworks.push(name);
    }
    if frameworks.is_empty() {
        return Err(GateError::configuration(format!(
            "framework list '{}' is empty",
            raw
        )));
    }
    Ok(frameworks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn sample_context() -> BuildContext {
        BuildContext {
            job_name: "payments".to_string(),
            build_number: 42,
            build_url: "https://ci.example.com/job/payments/42/".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            workspace: PathBuf::from("/ws/payments"),
            environment: BTreeMap::from([("BRANCH_NAME".to_string(), "main".to_string())]),
            source_files: vec!["src/App.java".to_string()],
            host_version: "2.440".to_string(),
            node_name: "linux-agent".to_string(),
        }
    }

    #[test]
    fn test_parse_frameworks_dedupes_and_keeps_order() {
        let parsed = parse_frameworks(" NISTCSF, essential8 ,nistcsf,,iso27001").unwrap();
        assert_eq!(parsed, vec!["nistcsf", "essential8", "iso27001"]);
    }

    #[test]
    fn test_parse_frameworks_rejects_empty() {
        assert!(matches!(
            parse_frameworks(" , ,"),
            Err(GateError::Configuration(_))
        ));
    }

    #[test]
    fn test_request_wire_shape() {
        let request = ComplianceRequest::new(
            sample_context(),
            vec!["essential8".to_string()],
            Mode::Validate,
            RequestOptions::default(),
        )
        .unwrap();

        let v = serde_json::to_value(&request).unwrap();
        assert_eq!(v["frameworks"], json!(["essential8"]));
        assert_eq!(v["mode"], json!("validate"));
        assert_eq!(v["options"]["severity_threshold"], json!("medium"));
        assert_eq!(v["options"]["human_review_threshold"], json!("high"));
        assert_eq!(v["options"]["include_suggestions"], json!(true));
        assert_eq!(v["options"]["include_evidence"], json!(true));
        assert_eq!(v["context"]["job_name"], json!("payments"));
        assert_eq!(v["context"]["build_number"], json!(42));
        assert_eq!(v["context"]["timestamp"], json!("2026-01-01T00:00:00Z"));
        assert_eq!(v["context"]["environment"]["BRANCH_NAME"], json!("main"));
    }

    #[test]
    fn test_request_requires_framework() {
        let err = ComplianceRequest::new(
            sample_context(),
            vec![],
            Mode::Audit,
            RequestOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, GateError::Configuration(_)));
    }
}
