//! Domain model for the compliance gate.

pub mod context;
pub mod error;
pub mod request;
pub mod result;
pub mod severity;

pub use context::{BuildContext, BuildRef};
pub use error::{GateError, Result};
pub use request::{parse_frameworks, ComplianceRequest, RequestOptions};
pub use result::{ComplianceResult, ComplianceViolation, MAX_SCORE};
pub use severity::{Mode, OutputFormat, ReviewThreshold, Severity};
