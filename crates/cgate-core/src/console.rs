//! Build console: the host CI log that users read.
//!
//! Distinct from `tracing` output. Console lines are the progress and
//! verdict messages a CI user sees in the build log.

use std::sync::Mutex;

/// Sink for user-facing build log lines.
pub trait BuildConsole: Send + Sync {
    fn line(&self, message: &str);

    fn warn(&self, message: &str) {
        self.line(&format!("⚠ {}", message));
    }

    fn error(&self, message: &str) {
        self.line(&format!("✗ {}", message));
    }
}

/// Writes console lines to stdout.
#[derive(Debug, Default)]
pub struct StdoutConsole;

impl BuildConsole for StdoutConsole {
    fn line(&self, message: &str) {
        println!("{}", message);
    }
}

/// Captures console lines in memory (testing and embedding).
#[derive(Debug, Default)]
pub struct MemoryConsole {
    lines: Mutex<Vec<String>>,
}

impl MemoryConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl BuildConsole for MemoryConsole {
    fn line(&self, message: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(message.to_string());
        }
    }
}
