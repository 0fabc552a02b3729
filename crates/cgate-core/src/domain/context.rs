//! Build context sent to the compliance service.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the build that is being gated.
///
/// Constructed once per invocation by the collector and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildContext {
    pub job_name: String,
    pub build_number: u64,
    pub build_url: String,
    pub timestamp: DateTime<Utc>,
    pub workspace: PathBuf,
    /// Filtered environment; see `collector` for the exclusion rules.
    pub environment: BTreeMap<String, String>,
    /// Bounded sample of candidate source files, relative to the workspace.
    pub source_files: Vec<String>,
    pub host_version: String,
    pub node_name: String,
}

/// Reference to the originating build, stored alongside recorded results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRef {
    pub job_name: String,
    pub build_number: u64,
    pub build_url: String,
}

impl BuildContext {
    pub fn build_ref(&self) -> BuildRef {
        BuildRef {
            job_name: self.job_name.clone(),
            build_number: self.build_number,
            build_url: self.build_url.clone(),
        }
    }
}

impl std::fmt::Display for BuildRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} #{}", self.job_name, self.build_number)
    }
}
