//! Build-step configuration.
//!
//! [`GateConfig`] is the raw, string-typed surface (TOML file, CLI flags,
//! environment). [`GateSettings`] is the validated form; every enum is parsed
//! here once and unknown values fail with [`GateError::Configuration`].

use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::DEFAULT_ENV_VALUE_CAP;
use crate::domain::{
    parse_frameworks, GateError, Mode, OutputFormat, RequestOptions, Result, ReviewThreshold,
    Severity,
};
use crate::gate::GatePolicy;

pub const DEFAULT_FRAMEWORKS: &str = "essential8";
pub const DEFAULT_REPORTS_DIR: &str = "compliance-reports";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Raw build-step configuration.
///
/// Unknown keys are rejected so a misspelled setting cannot silently fall
/// back to its default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    pub server_url: String,
    pub credentials_id: String,
    pub frameworks: String,
    pub severity_threshold: String,
    pub mode: String,
    pub output_format: String,
    pub fail_on_violations: bool,
    pub human_review_threshold: String,
    pub publish_results: bool,
    pub reports_dir: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub env_value_cap: usize,
    pub include_suggestions: bool,
    pub include_evidence: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        GateConfig {
            server_url: String::new(),
            credentials_id: String::new(),
            frameworks: DEFAULT_FRAMEWORKS.to_string(),
            severity_threshold: Severity::Medium.to_string(),
            mode: Mode::Validate.to_string(),
            output_format: OutputFormat::Json.to_string(),
            fail_on_violations: true,
            human_review_threshold: ReviewThreshold::High.to_string(),
            publish_results: true,
            reports_dir: DEFAULT_REPORTS_DIR.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            env_value_cap: DEFAULT_ENV_VALUE_CAP,
            include_suggestions: true,
            include_evidence: true,
        }
    }
}

impl GateConfig {
    /// Create a config for a specific server and credential.
    pub fn new(server_url: &str, credentials_id: &str) -> Self {
        GateConfig {
            server_url: server_url.to_string(),
            credentials_id: credentials_id.to_string(),
            ..Default::default()
        }
    }

    /// Load a TOML config file. Missing keys take their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GateError::configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
            .map_err(|e| GateError::configuration(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| GateError::configuration(e.to_string()))
    }

    pub fn with_frameworks(mut self, frameworks: &str) -> Self {
        self.frameworks = frameworks.to_string();
        self
    }

    pub fn with_severity_threshold(mut self, threshold: &str) -> Self {
        self.severity_threshold = threshold.to_string();
        self
    }

    /// Validate into typed settings.
    pub fn validate(&self) -> Result<GateSettings> {
        let server_url = validate_server_url(&self.server_url)?;
        let credentials_id = self.credentials_id.trim();
        if credentials_id.is_empty() {
            return Err(GateError::configuration("credential id is required"));
        }
        if self.connect_timeout_secs == 0 || self.request_timeout_secs == 0 {
            return Err(GateError::configuration("timeouts must be greater than zero"));
        }
        if self.env_value_cap == 0 {
            return Err(GateError::configuration(
                "env value cap must be greater than zero",
            ));
        }
        let reports_dir = PathBuf::from(self.reports_dir.trim());
        let escapes = reports_dir
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if reports_dir.as_os_str().is_empty() || reports_dir.is_absolute() || escapes {
            return Err(GateError::configuration(format!(
                "reports dir '{}' must be a relative path inside the workspace",
                self.reports_dir
            )));
        }

        Ok(GateSettings {
            server_url,
            credentials_id: credentials_id.to_string(),
            frameworks: parse_frameworks(&self.frameworks)?,
            severity_threshold: self.severity_threshold.parse()?,
            mode: self.mode.parse()?,
            output_format: self.output_format.parse()?,
            fail_on_violations: self.fail_on_violations,
            human_review_threshold: self.human_review_threshold.parse()?,
            publish_results: self.publish_results,
            reports_dir,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            env_value_cap: self.env_value_cap,
            include_suggestions: self.include_suggestions,
            include_evidence: self.include_evidence,
        })
    }
}

/// Validated build-step settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateSettings {
    /// Base URL without trailing slash.
    pub server_url: String,
    pub credentials_id: String,
    pub frameworks: Vec<String>,
    pub severity_threshold: Severity,
    pub mode: Mode,
    pub output_format: OutputFormat,
    pub fail_on_violations: bool,
    pub human_review_threshold: ReviewThreshold,
    pub publish_results: bool,
    pub reports_dir: PathBuf,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub env_value_cap: usize,
    pub include_suggestions: bool,
    pub include_evidence: bool,
}

impl GateSettings {
    pub fn gate_policy(&self) -> GatePolicy {
        GatePolicy {
            severity_threshold: self.severity_threshold,
            fail_on_violations: self.fail_on_violations,
        }
    }

    pub fn request_options(&self) -> RequestOptions {
        RequestOptions {
            severity_threshold: self.severity_threshold,
            human_review_threshold: self.human_review_threshold,
            include_suggestions: self.include_suggestions,
            include_evidence: self.include_evidence,
        }
    }

    /// Reports directory resolved against the build workspace.
    pub fn reports_dir_in(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.reports_dir)
    }
}

/// Check that a server URL uses http(s) and names a host.
/// Returns the URL without a trailing slash.
pub fn validate_server_url(raw: &str) -> Result<String> {
    let url = raw.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| {
            GateError::configuration(format!(
                "server URL '{}' must start with http:// or https://",
                raw
            ))
        })?;
    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() || rest.chars().any(char::is_whitespace) {
        return Err(GateError::configuration(format!(
            "server URL '{}' is not a valid URL",
            raw
        )));
    }
    Ok(url.trim_end_matches('/').to_string())
}
