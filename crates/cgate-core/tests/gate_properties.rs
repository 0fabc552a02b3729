//! Property-style tests for gate decisions and report artifacts.

use std::sync::Arc;

use cgate_core::{
    render_report_json, render_summary_md, write_reports, ActionRecorder, BuildRef,
    ComplianceAction, ComplianceGate, ComplianceResult, ComplianceViolation, FileActionRecorder,
    Severity, ACTION_JSON_FILE, GENERATED_AT_PREFIX,
};
use chrono::{TimeZone, Utc};

fn violation(i: usize, severity: Severity) -> ComplianceViolation {
    ComplianceViolation {
        rule_id: format!("R-{:02}", i),
        title: format!("Rule {}", i),
        description: "Policy violation".to_string(),
        severity,
        framework: "nistcsf".to_string(),
        category: "access-control".to_string(),
        file_path: None,
        line_number: None,
        remediation: None,
    }
}

fn result(severities: &[Severity]) -> ComplianceResult {
    ComplianceResult {
        compliance_score: 70,
        frameworks_checked: vec!["nistcsf".to_string()],
        violations: severities
            .iter()
            .enumerate()
            .map(|(i, s)| violation(i, *s))
            .collect(),
        human_review_required: false,
    }
}

/// Every multiset of up to two severities.
fn samples() -> Vec<Vec<Severity>> {
    let mut out = vec![vec![]];
    for &a in Severity::ALL {
        out.push(vec![a]);
        for &b in Severity::ALL {
            out.push(vec![a, b]);
        }
    }
    out
}

#[test]
fn raising_threshold_never_turns_pass_into_fail() {
    for sample in samples() {
        let r = result(&sample);
        let mut failed_before = true;
        for &threshold in Severity::ALL {
            let failed = !ComplianceGate::decide(&r, threshold, true).continue_build;
            assert!(
                failed_before || !failed,
                "{:?} fails at {} but passed at a lower threshold",
                sample,
                threshold
            );
            failed_before = failed;
        }
    }
}

#[test]
fn disabled_failing_always_continues() {
    for sample in samples() {
        for &threshold in Severity::ALL {
            let decision = ComplianceGate::decide(&result(&sample), threshold, false);
            assert!(decision.continue_build);
            assert_eq!(decision.reason, "continuing despite violations");
        }
    }
}

#[test]
fn fails_iff_some_violation_meets_threshold() {
    for sample in samples() {
        for &threshold in Severity::ALL {
            let expected_fail = sample.iter().any(|s| *s >= threshold);
            let decision = ComplianceGate::decide(&result(&sample), threshold, true);
            assert_eq!(!decision.continue_build, expected_fail, "{:?} @ {}", sample, threshold);
        }
    }
}

#[test]
fn report_json_round_trips() {
    let original = result(&[Severity::Critical, Severity::Low]);
    let json = render_report_json(&original).unwrap();
    let parsed = ComplianceResult::from_json(&json).unwrap();
    assert_eq!(parsed, original);
}

#[test]
fn summary_differs_only_in_timestamp_line() {
    let r = result(&[Severity::High, Severity::Medium]);
    let a = render_summary_md(&r, Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
    let b = render_summary_md(&r, Utc.with_ymd_and_hms(2026, 6, 30, 12, 0, 0).unwrap());

    let strip = |s: &str| -> Vec<String> {
        s.lines()
            .filter(|l| !l.starts_with(GENERATED_AT_PREFIX))
            .map(str::to_string)
            .collect()
    };
    assert_ne!(a, b);
    assert_eq!(strip(&a), strip(&b));
}

#[test]
fn write_reports_creates_directory() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path().join("nested").join("reports");

    let artifacts = write_reports(&dir, &result(&[Severity::Low]), Utc::now()).unwrap();

    let json = std::fs::read_to_string(&artifacts.json_path).unwrap();
    assert!(json.contains("\"compliance_score\": 70"));
    assert!(artifacts.summary_path.is_file());
}

#[tokio::test]
async fn file_recorder_writes_action_with_digest() {
    let temp_dir = tempfile::tempdir().unwrap();
    let recorder = FileActionRecorder::new(temp_dir.path());
    let build = BuildRef {
        job_name: "payments".to_string(),
        build_number: 7,
        build_url: "https://ci.example.com/job/payments/7/".to_string(),
    };
    let action = ComplianceAction::new(
        build,
        Arc::new(result(&[Severity::Critical, Severity::Critical])),
    );
    let digest = action.result_digest().to_string();

    recorder.attach(action).await.unwrap();

    let raw = std::fs::read_to_string(temp_dir.path().join(ACTION_JSON_FILE)).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["critical"], 2);
    assert_eq!(json["result_digest"], digest.as_str());
    assert_eq!(json["build"]["build_number"], 7);
}
