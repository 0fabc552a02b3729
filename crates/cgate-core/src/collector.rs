//! Build context collector.
//!
//! Gathers job metadata, a filtered environment and a bounded sample of
//! source files from the workspace. File enumeration problems are logged
//! and never abort collection.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::console::BuildConsole;
use crate::domain::{BuildContext, GateError};

/// Glob patterns scanned for candidate source files.
pub const SOURCE_PATTERNS: &[&str] = &[
    "**/*.java",
    "**/*.py",
    "**/*.js",
    "**/*.ts",
    "**/*.yml",
    "**/*.yaml",
    "**/*.json",
];

/// Maximum number of files collected per pattern.
pub const MAX_FILES_PER_PATTERN: usize = 50;

/// Default cap on environment variable value length.
pub const DEFAULT_ENV_VALUE_CAP: usize = 1024;

const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", "target"];

const SECRET_KEY_PATTERN: &str =
    r"(?i)(TOKEN|SECRET|PASSWORD|PASSWD|API_?KEY|CREDENTIAL|PRIVATE_KEY)";

fn secret_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(SECRET_KEY_PATTERN).expect("secret key pattern is valid"))
}

/// Host build reference the collector reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildHandle {
    pub job_name: String,
    pub build_number: u64,
    pub build_url: String,
    pub workspace: PathBuf,
    pub node_name: String,
    pub host_version: String,
    pub started_at: DateTime<Utc>,
    pub environment: BTreeMap<String, String>,
}

impl BuildHandle {
    /// Read a build handle from Jenkins-style environment variables.
    ///
    /// Missing variables fall back to neutral defaults; the workspace
    /// defaults to the current directory.
    pub fn from_env() -> Self {
        let environment = utf8_environment(std::env::vars_os());
        let get = |key: &str, default: &str| {
            environment
                .get(key)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        let workspace = environment
            .get("WORKSPACE")
            .map(PathBuf::from)
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            job_name: get("JOB_NAME", "local"),
            build_number: environment
                .get("BUILD_NUMBER")
                .and_then(|n| n.parse().ok())
                .unwrap_or(0),
            build_url: get("BUILD_URL", ""),
            workspace,
            node_name: get("NODE_NAME", "built-in"),
            host_version: get("JENKINS_VERSION", "unknown"),
            started_at: Utc::now(),
            environment,
        }
    }
}

/// Keep the variables whose key and value are both valid UTF-8.
pub fn utf8_environment<I>(vars: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
            (Ok(key), Ok(value)) => Some((key, value)),
            (Ok(key), Err(_)) => {
                debug!(key = %key, "skipping environment variable with non-UTF-8 value");
                None
            }
            (Err(key), _) => {
                debug!(key = %key.to_string_lossy(), "skipping environment variable with non-UTF-8 name");
                None
            }
        })
        .collect()
}

/// Collects a [`BuildContext`] from a [`BuildHandle`].
#[derive(Debug, Clone)]
pub struct BuildContextCollector {
    env_value_cap: usize,
    patterns: GlobSet,
}

impl Default for BuildContextCollector {
    fn default() -> Self {
        Self::new(DEFAULT_ENV_VALUE_CAP)
    }
}

impl BuildContextCollector {
    pub fn new(env_value_cap: usize) -> Self {
        let mut builder = GlobSetBuilder::new();
        for pattern in SOURCE_PATTERNS {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }
        let patterns = builder
            .build()
            .unwrap_or_else(|_| GlobSet::empty());
        Self {
            env_value_cap,
            patterns,
        }
    }

    /// Build the context for one invocation.
    pub fn collect(&self, handle: &BuildHandle, console: &dyn BuildConsole) -> BuildContext {
        console.line(&format!(
            "🔍 Collecting build context for {} #{}",
            handle.job_name, handle.build_number
        ));

        let environment = self.filter_environment(&handle.environment);
        let source_files = match self.scan_workspace(&handle.workspace) {
            Ok((files, errors)) => {
                for err in &errors {
                    warn!(error = %err, "skipping unreadable workspace entry");
                }
                if !errors.is_empty() {
                    console.warn(&format!(
                        "{} workspace entries could not be read; continuing with a partial file list",
                        errors.len()
                    ));
                }
                files
            }
            Err(err) => {
                warn!(error = %err, "workspace scan failed");
                console.warn(&format!("{}; continuing without source files", err));
                Vec::new()
            }
        };

        console.line(&format!(
            "📁 Collected {} candidate source files and {} environment variables",
            source_files.len(),
            environment.len()
        ));

        BuildContext {
            job_name: handle.job_name.clone(),
            build_number: handle.build_number,
            build_url: handle.build_url.clone(),
            timestamp: handle.started_at,
            workspace: handle.workspace.clone(),
            environment,
            source_files,
            host_version: handle.host_version.clone(),
            node_name: handle.node_name.clone(),
        }
    }

    /// Drop oversized values and secret-looking variables.
    pub fn filter_environment(&self, env: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let secret_keys = secret_key_regex();
        env.iter()
            .filter(|(key, value)| {
                if secret_keys.is_match(key) {
                    debug!(key = %key, "excluding secret-looking environment variable");
                    return false;
                }
                value.len() <= self.env_value_cap
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Walk the workspace and keep at most [`MAX_FILES_PER_PATTERN`] matches
    /// per pattern. Returns the files plus per-entry errors.
    pub fn scan_workspace(
        &self,
        workspace: &Path,
    ) -> Result<(Vec<String>, Vec<GateError>), GateError> {
        if !workspace.is_dir() {
            return Err(GateError::FileEnumeration(format!(
                "workspace {} is not a readable directory",
                workspace.display()
            )));
        }

        let mut per_pattern = vec![0usize; SOURCE_PATTERNS.len()];
        let mut files = Vec::new();
        let mut errors = Vec::new();

        let walker = WalkDir::new(workspace)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                !(e.file_type().is_dir()
                    && e.depth() > 0
                    && SKIPPED_DIRS.iter().any(|d| e.file_name() == *d))
            });

        for entry in walker {
            if per_pattern.iter().all(|n| *n >= MAX_FILES_PER_PATTERN) {
                break;
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    errors.push(GateError::FileEnumeration(err.to_string()));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(workspace)
                .unwrap_or_else(|_| entry.path());

            let Some(slot) = self
                .patterns
                .matches(relative)
                .into_iter()
                .find(|i| per_pattern[*i] < MAX_FILES_PER_PATTERN)
            else {
                continue;
            };
            per_pattern[slot] += 1;
            files.push(relative.to_string_lossy().replace('\\', "/"));
        }

        Ok((files, errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::console::MemoryConsole;

    fn handle_for(workspace: &Path) -> BuildHandle {
        BuildHandle {
            job_name: "payments".to_string(),
            build_number: 7,
            build_url: "https://ci.example.com/job/payments/7/".to_string(),
            workspace: workspace.to_path_buf(),
            node_name: "agent-1".to_string(),
            host_version: "2.440".to_string(),
            started_at: Utc::now(),
            environment: BTreeMap::new(),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_environment_is_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let vars = vec![
            (OsString::from("BRANCH_NAME"), OsString::from("main")),
            (
                OsString::from("CGATE_TEST_BAD_VALUE"),
                OsString::from_vec(b"\xff\xfe".to_vec()),
            ),
            (OsString::from_vec(b"BAD_\xff".to_vec()), OsString::from("x")),
        ];
        let env = utf8_environment(vars);
        assert_eq!(env.len(), 1);
        assert_eq!(env.get("BRANCH_NAME").map(String::as_str), Some("main"));
    }

    #[cfg(unix)]
    #[test]
    fn test_from_env_survives_non_utf8_variable() {
        use std::os::unix::ffi::OsStrExt;

        let name = "CGATE_COLLECTOR_TEST_NON_UTF8";
        std::env::set_var(name, std::ffi::OsStr::from_bytes(b"\xff\xfe"));
        let handle = BuildHandle::from_env();
        std::env::remove_var(name);

        assert!(!handle.environment.contains_key(name));
    }

    #[test]
    fn test_cap_per_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src/main/java");
        std::fs::create_dir_all(&src).unwrap();
        for i in 0..120 {
            std::fs::write(src.join(format!("Class{i:03}.java")), "class X {}").unwrap();
        }
        std::fs::write(dir.path().join("app.py"), "print()").unwrap();

        let collector = BuildContextCollector::default();
        let (files, errors) = collector.scan_workspace(dir.path()).unwrap();
        assert!(errors.is_empty());
        assert_eq!(files.iter().filter(|f| f.ends_with(".java")).count(), 50);
        assert!(files.contains(&"app.py".to_string()));
    }

    #[test]
    fn test_ignores_unmatched_and_skipped_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules/lib")).unwrap();
        std::fs::write(dir.path().join("node_modules/lib/index.js"), "").unwrap();
        std::fs::write(dir.path().join("README.md"), "").unwrap();
        std::fs::write(dir.path().join("Jenkinsfile.yml"), "").unwrap();

        let collector = BuildContextCollector::default();
        let (files, _) = collector.scan_workspace(dir.path()).unwrap();
        assert_eq!(files, vec!["Jenkinsfile.yml".to_string()]);
    }

    #[test]
    fn test_missing_workspace_does_not_abort() {
        let dir = tempfile::tempdir().unwrap();
        let handle = handle_for(&dir.path().join("does-not-exist"));
        let console = MemoryConsole::new();

        let context = BuildContextCollector::default().collect(&handle, &console);
        assert!(context.source_files.is_empty());
        assert_eq!(context.job_name, "payments");
        assert!(console.contains("⚠"));
    }

    #[test]
    fn test_environment_filtering() {
        let env = BTreeMap::from([
            ("BRANCH_NAME".to_string(), "main".to_string()),
            ("GITHUB_TOKEN".to_string(), "ghp_x".to_string()),
            ("db_password".to_string(), "hunter2".to_string()),
            ("HUGE".to_string(), "x".repeat(2048)),
        ]);
        let filtered = BuildContextCollector::new(1024).filter_environment(&env);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered["BRANCH_NAME"], "main");
    }

    #[test]
    fn test_collect_writes_progress() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.json"), "{}").unwrap();
        let mut handle = handle_for(dir.path());
        handle
            .environment
            .insert("BUILD_TAG".to_string(), "jenkins-payments-7".to_string());
        let console = MemoryConsole::new();

        let context = BuildContextCollector::default().collect(&handle, &console);
        assert_eq!(context.source_files, vec!["config.json".to_string()]);
        assert_eq!(context.environment.len(), 1);
        assert_eq!(context.build_number, 7);
        assert!(console.contains("Collecting build context for payments #7"));
        assert!(console.contains("1 candidate source files"));
    }
}
