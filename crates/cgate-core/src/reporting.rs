//! Report artifacts for CI consumers.
//!
//! - `compliance-report.json`: the machine-readable [`ComplianceResult`]
//! - `compliance-summary.md`: a human-readable summary
//!
//! Rendering is deterministic. The generation timestamp is the only
//! varying input and sits on its own line starting with [`GENERATED_AT_PREFIX`].

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::domain::{ComplianceResult, GateError, Result, Severity};

pub const REPORT_JSON_FILE: &str = "compliance-report.json";
pub const SUMMARY_MD_FILE: &str = "compliance-summary.md";

/// Prefix of the timestamp line in the markdown summary.
pub const GENERATED_AT_PREFIX: &str = "_Generated: ";

const HUMAN_REVIEW_SECTION: &str = "\
## Human Review Required

The compliance service flagged findings that need human judgment before this build is released:

- **Regulatory interpretation**: whether a control applies to this system and how the framework text should be read.
- **Strategic risk**: whether residual risk is acceptable given the organisation's risk appetite.
- **Business context**: compensating controls, exceptions or deadlines that automated checks cannot see.

Automated gating is unaffected by this flag.
";

/// Paths of the artifacts written by [`write_reports`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifacts {
    pub json_path: PathBuf,
    pub summary_path: PathBuf,
}

/// Serialize the result as pretty JSON.
pub fn render_report_json(result: &ComplianceResult) -> Result<String> {
    serde_json::to_string_pretty(result).map_err(serialize_error)
}

fn serialize_error(err: serde_json::Error) -> GateError {
    GateError::ReportWrite {
        path: REPORT_JSON_FILE.to_string(),
        reason: format!("cannot serialize result: {}", err),
    }
}

/// Render the markdown summary.
pub fn render_summary_md(result: &ComplianceResult, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str("# Compliance Report\n\n");
    out.push_str(&format!(
        "{}{}_\n\n",
        GENERATED_AT_PREFIX,
        generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    out.push_str(&format!(
        "- **Compliance score:** {}/100\n- **Frameworks checked:** {}\n- **Human review required:** {}\n\n",
        result.compliance_score,
        if result.frameworks_checked.is_empty() {
            "none".to_string()
        } else {
            result.frameworks_checked.join(", ")
        },
        if result.human_review_required { "yes" } else { "no" }
    ));

    out.push_str("## Summary\n\n");
    out.push_str("| Severity | Count |\n|----------|-------|\n");
    for severity in Severity::ALL.iter().rev() {
        out.push_str(&format!(
            "| {} {} | {} |\n",
            severity.icon(),
            severity.as_str().to_ascii_uppercase(),
            result.count_severity(*severity)
        ));
    }
    out.push_str(&format!("| **Total** | {} |\n\n", result.violations.len()));

    out.push_str("## Violations\n\n");
    if result.violations.is_empty() {
        out.push_str("No violations found.\n");
    }
    for (i, v) in result.violations.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} **{}** {}\n",
            i + 1,
            v.severity.icon(),
            v.severity.as_str().to_ascii_uppercase(),
            v.title
        ));
        out.push_str(&format!("   - Rule: `{}`\n", v.rule_id));
        out.push_str(&format!("   - Severity: {}\n", v.severity));
        out.push_str(&format!("   - Framework: {}\n", v.framework));
        out.push_str(&format!("   - Category: {}\n", v.category));
        out.push_str(&format!("   - Description: {}\n", v.description));
        if let Some(remediation) = &v.remediation {
            out.push_str(&format!("   - Remediation: {}\n", remediation));
        }
        if let Some(location) = v.location() {
            out.push_str(&format!("   - File: `{}`\n", location));
        }
    }

    if result.human_review_required {
        out.push('\n');
        out.push_str(HUMAN_REVIEW_SECTION);
    }
    out
}

/// Compact lines for the build console.
pub fn render_console_summary(result: &ComplianceResult) -> Vec<String> {
    let mut lines = vec![format!(
        "📊 Compliance score: {}/100 ({})",
        result.compliance_score,
        result.frameworks_checked.join(", ")
    )];
    let counts: Vec<String> = Severity::ALL
        .iter()
        .rev()
        .map(|s| format!("{} {}: {}", s.icon(), s, result.count_severity(*s)))
        .collect();
    lines.push(format!("   {}", counts.join("  ")));
    for v in result.violations.iter().filter(|v| v.severity >= Severity::High) {
        let location = v
            .location()
            .map(|l| format!(" ({})", l))
            .unwrap_or_default();
        lines.push(format!(
            "   {} [{}] {}{}",
            v.severity.icon(),
            v.rule_id,
            v.title,
            location
        ));
    }
    if result.human_review_required {
        lines.push("👤 Human review required".to_string());
    }
    lines
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    let to_err = |e: std::io::Error| GateError::ReportWrite {
        path: path.display().to_string(),
        reason: e.to_string(),
    };
    let file = File::create(path).map_err(to_err)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(content.as_bytes()).map_err(to_err)?;
    writer.flush().map_err(to_err)?;
    Ok(())
}

/// Write `compliance-report.json`.
pub fn write_report_json(path: &Path, result: &ComplianceResult) -> Result<()> {
    write_file(path, &render_report_json(result)?)
}

/// Write `compliance-summary.md`.
pub fn write_summary_md(
    path: &Path,
    result: &ComplianceResult,
    generated_at: DateTime<Utc>,
) -> Result<()> {
    write_file(path, &render_summary_md(result, generated_at))
}

/// Write both artifacts into `dir`, creating it if needed.
pub fn write_reports(
    dir: &Path,
    result: &ComplianceResult,
    generated_at: DateTime<Utc>,
) -> Result<ReportArtifacts> {
    std::fs::create_dir_all(dir).map_err(|e| GateError::ReportWrite {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;
    let artifacts = ReportArtifacts {
        json_path: dir.join(REPORT_JSON_FILE),
        summary_path: dir.join(SUMMARY_MD_FILE),
    };
    write_report_json(&artifacts.json_path, result)?;
    write_summary_md(&artifacts.summary_path, result, generated_at)?;
    Ok(artifacts)
}
