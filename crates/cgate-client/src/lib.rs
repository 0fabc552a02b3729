//! Compliance service transport.
//!
//! Talks to the remote policy-evaluation service over HTTPS:
//! `POST /api/v1/compliance/jenkins-validate` for submissions and
//! `POST /api/v1/health` for connection tests.

pub mod client;

pub use client::{
    ClientConfig, ComplianceClient, ComplianceService, HEALTH_PATH, USER_AGENT, VALIDATE_PATH,
};
pub use tokio_util::sync::CancellationToken;
