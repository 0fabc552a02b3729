//! Error taxonomy for the compliance gate.

/// Errors produced while running the compliance gate.
///
/// Fatal variants (`CredentialResolution`, `Configuration`,
/// `ServiceUnavailable`, `MalformedResponse`, `Cancelled`) fail the build.
/// `ReportWrite` and `FileEnumeration` are reported as warnings only.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("credential resolution failed for '{id}': {reason}")]
    CredentialResolution { id: String, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("compliance service unavailable{}: {message}", status_suffix(.status))]
    ServiceUnavailable { status: Option<u16>, message: String },

    #[error("malformed compliance response: {0}")]
    MalformedResponse(String),

    #[error("failed to write report {path}: {reason}")]
    ReportWrite { path: String, reason: String },

    #[error("file enumeration failed: {0}")]
    FileEnumeration(String),

    #[error("compliance check cancelled")]
    Cancelled,
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl GateError {
    /// Whether this error must fail the build step.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            GateError::ReportWrite { .. } | GateError::FileEnumeration(_)
        )
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        GateError::Configuration(message.into())
    }

    pub fn credential(id: impl Into<String>, reason: impl Into<String>) -> Self {
        GateError::CredentialResolution {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for GateError {
    fn from(err: serde_json::Error) -> Self {
        GateError::MalformedResponse(err.to_string())
    }
}

/// Result type for compliance gate operations.
pub type Result<T> = std::result::Result<T, GateError>;
