//! Credential resolution.
//!
//! The gate only depends on [`CredentialResolver`]; concrete stores are
//! injected by the host adapter. Resolvers never return an empty secret:
//! absence is always a [`GateError::CredentialResolution`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::domain::{GateError, Result};

/// API key for the compliance service. Redacted in `Debug` and `Display`.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a secret; empty or whitespace-only values are rejected.
    pub fn new(id: &str, secret: impl Into<String>) -> Result<Self> {
        let secret = secret.into();
        if secret.trim().is_empty() {
            return Err(GateError::credential(id, "credential resolved to an empty secret"));
        }
        Ok(ApiKey(secret))
    }

    /// The raw secret. Only the HTTP client should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(****)")
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

/// Looks up an API key by credential identifier.
pub trait CredentialResolver: Send + Sync {
    fn resolve(&self, credential_id: &str) -> Result<ApiKey>;
}

fn require_id(credential_id: &str) -> Result<()> {
    if credential_id.trim().is_empty() {
        return Err(GateError::credential(
            credential_id,
            "credential identifier is empty",
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// EnvCredentialResolver
// ---------------------------------------------------------------------------

/// Resolves `<id>` from the environment variable `CGATE_CREDENTIAL_<ID>`,
/// where `<ID>` is upper-cased with non-alphanumerics mapped to `_`.
#[derive(Debug, Clone)]
pub struct EnvCredentialResolver {
    prefix: String,
}

impl Default for EnvCredentialResolver {
    fn default() -> Self {
        Self {
            prefix: "CGATE_CREDENTIAL_".to_string(),
        }
    }
}

impl EnvCredentialResolver {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn variable_for(&self, credential_id: &str) -> String {
        let suffix: String = credential_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}{}", self.prefix, suffix)
    }
}

impl CredentialResolver for EnvCredentialResolver {
    fn resolve(&self, credential_id: &str) -> Result<ApiKey> {
        require_id(credential_id)?;
        let var = self.variable_for(credential_id);
        debug!(credential_id = %credential_id, variable = %var, "resolving credential from environment");
        match std::env::var(&var) {
            Ok(secret) => ApiKey::new(credential_id, secret),
            Err(_) => Err(GateError::credential(
                credential_id,
                format!("environment variable {} is not set", var),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// FileCredentialResolver
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    credentials: HashMap<String, String>,
}

/// Resolves credentials from a TOML store:
///
/// ```toml
/// [credentials]
/// compliance-api = "sk-live-..."
/// ```
///
/// The file is read on every lookup so rotated secrets are picked up.
#[derive(Debug, Clone)]
pub struct FileCredentialResolver {
    path: PathBuf,
}

impl FileCredentialResolver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialResolver for FileCredentialResolver {
    fn resolve(&self, credential_id: &str) -> Result<ApiKey> {
        require_id(credential_id)?;
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            GateError::credential(
                credential_id,
                format!("credential store {} is unreachable: {}", self.path.display(), e),
            )
        })?;
        let store: CredentialFile = toml::from_str(&raw).map_err(|e| {
            GateError::credential(
                credential_id,
                format!("credential store {} is invalid: {}", self.path.display(), e),
            )
        })?;
        match store.credentials.get(credential_id) {
            Some(secret) => ApiKey::new(credential_id, secret.clone()),
            None => Err(GateError::credential(
                credential_id,
                "no such credential in store",
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// MemoryCredentialResolver
// ---------------------------------------------------------------------------

/// In-memory credential store (testing only).
#[derive(Debug, Default, Clone)]
pub struct MemoryCredentialResolver {
    secrets: HashMap<String, String>,
}

impl MemoryCredentialResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: &str, secret: &str) -> Self {
        self.secrets.insert(id.to_string(), secret.to_string());
        self
    }
}

impl CredentialResolver for MemoryCredentialResolver {
    fn resolve(&self, credential_id: &str) -> Result<ApiKey> {
        require_id(credential_id)?;
        match self.secrets.get(credential_id) {
            Some(secret) => ApiKey::new(credential_id, secret.clone()),
            None => Err(GateError::credential(credential_id, "no such credential")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_is_redacted() {
        let key = ApiKey::new("id", "sk-very-secret").unwrap();
        assert_eq!(format!("{:?}", key), "ApiKey(****)");
        assert_eq!(key.to_string(), "****");
        assert_eq!(key.expose(), "sk-very-secret");
    }

    #[test]
    fn test_unknown_id_is_an_error_not_empty_string() {
        let resolver = MemoryCredentialResolver::new().with("known", "secret");
        let err = resolver.resolve("unknown").unwrap_err();
        assert!(matches!(err, GateError::CredentialResolution { .. }));
        assert_eq!(resolver.resolve("known").unwrap().expose(), "secret");
    }

    #[test]
    fn test_empty_secret_is_a_failure() {
        let resolver = MemoryCredentialResolver::new().with("blank", "   ");
        assert!(resolver.resolve("blank").is_err());
        assert!(resolver.resolve("").is_err());
    }

    #[test]
    fn test_env_variable_name_mapping() {
        let resolver = EnvCredentialResolver::default();
        assert_eq!(
            resolver.variable_for("compliance-api.prod"),
            "CGATE_CREDENTIAL_COMPLIANCE_API_PROD"
        );
    }

    #[test]
    fn test_env_resolver() {
        let resolver = EnvCredentialResolver::with_prefix("CGATE_TEST_CRED_ENV_");
        std::env::set_var("CGATE_TEST_CRED_ENV_PRESENT", "sk-env");
        assert_eq!(resolver.resolve("present").unwrap().expose(), "sk-env");
        assert!(matches!(
            resolver.resolve("absent"),
            Err(GateError::CredentialResolution { .. })
        ));
    }

    #[test]
    fn test_file_resolver() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.toml");
        std::fs::write(&path, "[credentials]\ncompliance-api = \"sk-file\"\n").unwrap();

        let resolver = FileCredentialResolver::new(&path);
        assert_eq!(resolver.resolve("compliance-api").unwrap().expose(), "sk-file");
        assert!(resolver.resolve("other").is_err());
    }

    #[test]
    fn test_file_resolver_unreachable_store() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FileCredentialResolver::new(dir.path().join("missing.toml"));
        let err = resolver.resolve("compliance-api").unwrap_err();
        assert!(err.to_string().contains("unreachable"));
    }
}
