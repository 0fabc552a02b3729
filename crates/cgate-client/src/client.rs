//! Compliance service client
//!
//! Submits build context to the remote compliance service and parses the
//! typed result. Submissions are never retried; the idempotent health check
//! may be.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use cgate_core::{
    emit_submission_completed, emit_submission_sent, ApiKey, ComplianceRequest, ComplianceResult,
    GateError, GateSettings, Result,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Validation endpoint, relative to the server URL.
pub const VALIDATE_PATH: &str = "/api/v1/compliance/jenkins-validate";

/// Health endpoint, relative to the server URL.
pub const HEALTH_PATH: &str = "/api/v1/health";

pub const USER_AGENT: &str = "ComplianceGate-Jenkins-Plugin/1.0";

/// Longest error body echoed into an error message.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base server URL without trailing slash
    pub server_url: String,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Whole-request timeout (connect + send + read)
    pub request_timeout: Duration,
    /// Health check attempts (>= 1)
    pub health_attempts: u32,
    /// Delay between health check attempts
    pub health_backoff: Duration,
}

impl ClientConfig {
    /// Config for a server with the default timeouts (30s connect, 120s request).
    pub fn new(server_url: &str) -> Self {
        ClientConfig {
            server_url: server_url.trim_end_matches('/').to_string(),
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(120),
            health_attempts: 2,
            health_backoff: Duration::from_millis(500),
        }
    }

    pub fn from_settings(settings: &GateSettings) -> Self {
        Self::new(&settings.server_url).with_timeouts(settings.connect_timeout, settings.request_timeout)
    }

    pub fn with_timeouts(mut self, connect: Duration, request: Duration) -> Self {
        self.connect_timeout = connect;
        self.request_timeout = request;
        self
    }

    pub fn with_health_retries(mut self, attempts: u32, backoff: Duration) -> Self {
        self.health_attempts = attempts.max(1);
        self.health_backoff = backoff;
        self
    }
}

/// Remote compliance evaluation service.
#[async_trait]
pub trait ComplianceService: Send + Sync {
    /// Submit a request and return the validated result.
    ///
    /// Fails with `ServiceUnavailable` on transport errors or non-2xx status,
    /// `MalformedResponse` when the body does not match the schema, and
    /// `Cancelled` when `cancel` fires first.
    async fn submit(
        &self,
        request: &ComplianceRequest,
        api_key: &ApiKey,
        cancel: &CancellationToken,
    ) -> Result<ComplianceResult>;

    /// Check that the service is reachable and healthy.
    async fn health_check(&self, api_key: Option<&ApiKey>) -> Result<()>;
}

/// HTTP implementation of [`ComplianceService`].
pub struct ComplianceClient {
    config: ClientConfig,
    http_client: reqwest::Client,
}

impl ComplianceClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| GateError::configuration(format!("failed to create HTTP client: {}", e)))?;

        Ok(ComplianceClient {
            config,
            http_client,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.server_url, path)
    }

    fn transport_error(&self, err: reqwest::Error) -> GateError {
        let message = if err.is_timeout() {
            format!(
                "request timed out (connect {}s, request {}s)",
                self.config.connect_timeout.as_secs(),
                self.config.request_timeout.as_secs()
            )
        } else if err.is_connect() {
            format!("could not connect to {}: {}", self.config.server_url, err)
        } else {
            err.to_string()
        };
        GateError::ServiceUnavailable {
            status: err.status().map(|s| s.as_u16()),
            message,
        }
    }

    async fn health_once(&self, api_key: Option<&ApiKey>) -> Result<()> {
        let mut request = self.http_client.post(self.endpoint(HEALTH_PATH));
        if let Some(key) = api_key {
            request = request.bearer_auth(key.expose());
        }
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if status == reqwest::StatusCode::OK {
            Ok(())
        } else {
            Err(GateError::ServiceUnavailable {
                status: Some(status.as_u16()),
                message: format!("health check returned {}", status),
            })
        }
    }
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        trimmed.to_string()
    } else {
        let head: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{}...", head)
    }
}

#[async_trait]
impl ComplianceService for ComplianceClient {
    async fn submit(
        &self,
        request: &ComplianceRequest,
        api_key: &ApiKey,
        cancel: &CancellationToken,
    ) -> Result<ComplianceResult> {
        let url = self.endpoint(VALIDATE_PATH);
        emit_submission_sent(&url, request.frameworks.len(), request.context.source_files.len());
        let start = Instant::now();

        let send = self
            .http_client
            .post(&url)
            .bearer_auth(api_key.expose())
            .json(request)
            .send();

        // Dropping the in-flight future aborts the request and releases the connection.
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GateError::Cancelled),
            sent = send => sent.map_err(|e| self.transport_error(e))?,
        };

        let status = response.status();
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GateError::Cancelled),
            body = response.text() => body.map_err(|e| self.transport_error(e))?,
        };

        if !status.is_success() {
            warn!(status = status.as_u16(), "compliance service rejected submission");
            return Err(GateError::ServiceUnavailable {
                status: Some(status.as_u16()),
                message: if body.trim().is_empty() {
                    status.to_string()
                } else {
                    truncate(&body)
                },
            });
        }

        debug!(bytes = body.len(), "received compliance response");
        let result = ComplianceResult::from_json(&body)?;
        emit_submission_completed(
            status.as_u16(),
            start.elapsed().as_millis() as u64,
            result.violations.len(),
            result.compliance_score,
        );
        Ok(result)
    }

    async fn health_check(&self, api_key: Option<&ApiKey>) -> Result<()> {
        let attempts = self.config.health_attempts.max(1);
        let mut last_err = None;
        for attempt in 1..=attempts {
            match self.health_once(api_key).await {
                Ok(()) => {
                    info!(attempt = attempt, "compliance service is healthy");
                    return Ok(());
                }
                Err(err) => {
                    warn!(attempt = attempt, error = %err, "health check failed");
                    last_err = Some(err);
                    if attempt < attempts {
                        tokio::time::sleep(self.config.health_backoff).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or(GateError::ServiceUnavailable {
            status: None,
            message: "health check was not attempted".to_string(),
        }))
    }
}
