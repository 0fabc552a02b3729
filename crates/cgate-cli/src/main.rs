//! Compliance Gate CLI
//!
//! The `cgate` command runs the compliance gate as a CI build step.
//!
//! ## Commands
//!
//! - `run`: collect build context, submit it, gate the build
//! - `health`: test the connection to the compliance service
//! - `validate-config`: check settings without touching the network
//! - `report`: render report artifacts from a saved result
//! - `decide`: apply the gate decision to a saved result
//!
//! Settings come from flags, then `CGATE_*` environment variables, then an
//! optional TOML file given with `--config`.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use cgate_ci::ComplianceStep;
use cgate_client::{CancellationToken, ClientConfig, ComplianceClient, ComplianceService};
use cgate_core::{
    render_console_summary, validate_server_url, write_reports, ActionRecorder, BuildConsole,
    BuildHandle, ComplianceGate, ComplianceResult, CredentialResolver, EnvCredentialResolver,
    FileActionRecorder, FileCredentialResolver, GateConfig, GateSettings, MemoryActionRecorder,
    Severity, StdoutConsole,
};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn, Level};

#[derive(Parser)]
#[command(name = "cgate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Compliance gate for CI builds", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the compliance gate for the current build
    Run {
        #[command(flatten)]
        settings: SettingsArgs,

        #[command(flatten)]
        build: BuildArgs,
    },

    /// Test the connection to the compliance service
    Health {
        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Parse and validate settings without contacting the service
    ValidateConfig {
        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Render report artifacts from a saved compliance result
    Report {
        /// Saved result (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Directory to write the artifacts into
        #[arg(short, long, default_value = "compliance-reports")]
        output_dir: PathBuf,
    },

    /// Apply the gate decision to a saved compliance result
    Decide {
        /// Saved result (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Minimum severity that fails the build
        #[arg(short, long, default_value = "medium")]
        threshold: String,

        /// Continue the build even when violations are found
        #[arg(long)]
        no_fail: bool,
    },
}

/// Gate settings. Unset flags fall back to `CGATE_*` variables, then to the
/// config file, then to defaults.
#[derive(Args, Debug, Default, Clone)]
struct SettingsArgs {
    /// TOML config file
    #[arg(long, env = "CGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Compliance service base URL
    #[arg(long, env = "CGATE_SERVER_URL")]
    server_url: Option<String>,

    /// Credential id of the API key
    #[arg(long, env = "CGATE_CREDENTIALS_ID")]
    credentials_id: Option<String>,

    /// TOML credential store; defaults to CGATE_CREDENTIAL_<ID> variables
    #[arg(long, env = "CGATE_CREDENTIALS_FILE")]
    credentials_file: Option<PathBuf>,

    /// Comma-separated framework ids
    #[arg(long, env = "CGATE_FRAMEWORKS")]
    frameworks: Option<String>,

    /// low | medium | high | critical
    #[arg(long, env = "CGATE_SEVERITY_THRESHOLD")]
    severity_threshold: Option<String>,

    /// validate | audit | monitor
    #[arg(long, env = "CGATE_MODE")]
    mode: Option<String>,

    /// json | summary | all
    #[arg(long, env = "CGATE_OUTPUT_FORMAT")]
    output_format: Option<String>,

    #[arg(long, env = "CGATE_FAIL_ON_VIOLATIONS", value_name = "BOOL")]
    fail_on_violations: Option<bool>,

    /// low | medium | high
    #[arg(long, env = "CGATE_HUMAN_REVIEW_THRESHOLD")]
    human_review_threshold: Option<String>,

    #[arg(long, env = "CGATE_PUBLISH_RESULTS", value_name = "BOOL")]
    publish_results: Option<bool>,

    /// Reports directory, relative to the workspace
    #[arg(long, env = "CGATE_REPORTS_DIR")]
    reports_dir: Option<String>,

    #[arg(long, env = "CGATE_CONNECT_TIMEOUT_SECS")]
    connect_timeout_secs: Option<u64>,

    #[arg(long, env = "CGATE_REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: Option<u64>,

    /// Longest environment value sent to the service
    #[arg(long, env = "CGATE_ENV_VALUE_CAP")]
    env_value_cap: Option<usize>,
}

impl SettingsArgs {
    /// Load the config file (if any) and overlay flags and env values.
    fn load(&self) -> Result<GateConfig> {
        let base = match &self.config {
            Some(path) => GateConfig::from_toml_file(path)?,
            None => GateConfig::default(),
        };
        Ok(self.overlay(base))
    }

    fn overlay(&self, mut config: GateConfig) -> GateConfig {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }
        set(&mut config.server_url, &self.server_url);
        set(&mut config.credentials_id, &self.credentials_id);
        set(&mut config.frameworks, &self.frameworks);
        set(&mut config.severity_threshold, &self.severity_threshold);
        set(&mut config.mode, &self.mode);
        set(&mut config.output_format, &self.output_format);
        set(&mut config.fail_on_violations, &self.fail_on_violations);
        set(&mut config.human_review_threshold, &self.human_review_threshold);
        set(&mut config.publish_results, &self.publish_results);
        set(&mut config.reports_dir, &self.reports_dir);
        set(&mut config.connect_timeout_secs, &self.connect_timeout_secs);
        set(&mut config.request_timeout_secs, &self.request_timeout_secs);
        set(&mut config.env_value_cap, &self.env_value_cap);
        config
    }

    fn credential_resolver(&self) -> Arc<dyn CredentialResolver> {
        match &self.credentials_file {
            Some(path) => Arc::new(FileCredentialResolver::new(path)),
            None => Arc::new(EnvCredentialResolver::default()),
        }
    }
}

/// Overrides for the build handle read from the CI environment.
#[derive(Args, Debug, Default, Clone)]
struct BuildArgs {
    /// Build workspace (default: $WORKSPACE or the current directory)
    #[arg(long)]
    workspace: Option<PathBuf>,

    #[arg(long)]
    job_name: Option<String>,

    #[arg(long)]
    build_number: Option<u64>,

    #[arg(long)]
    build_url: Option<String>,
}

impl BuildArgs {
    fn handle(&self) -> BuildHandle {
        let mut handle = BuildHandle::from_env();
        if let Some(workspace) = &self.workspace {
            handle.workspace = workspace.clone();
        }
        if let Some(job_name) = &self.job_name {
            handle.job_name = job_name.clone();
        }
        if let Some(build_number) = self.build_number {
            handle.build_number = build_number;
        }
        if let Some(build_url) = &self.build_url {
            handle.build_url = build_url.clone();
        }
        handle
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    cgate_core::init_tracing(cli.json, level);

    let passed = match cli.command {
        Commands::Run { settings, build } => cmd_run(&settings, &build).await?,
        Commands::Health { settings } => cmd_health(&settings).await?,
        Commands::ValidateConfig { settings } => cmd_validate_config(&settings)?,
        Commands::Report { input, output_dir } => cmd_report(&input, &output_dir)?,
        Commands::Decide {
            input,
            threshold,
            no_fail,
        } => cmd_decide(&input, &threshold, !no_fail)?,
    };

    Ok(if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn cmd_run(settings: &SettingsArgs, build: &BuildArgs) -> Result<bool> {
    let console: Arc<dyn BuildConsole> = Arc::new(StdoutConsole);
    let gate_settings = match settings.load().and_then(|config| Ok(config.validate()?)) {
        Ok(s) => s,
        Err(err) => {
            console.error(&format!("Compliance check failed: {:#}", err));
            return Ok(false);
        }
    };

    let handle = build.handle();
    let client = ComplianceClient::new(ClientConfig::from_settings(&gate_settings))
        .context("Failed to create compliance client")?;
    let recorder = action_recorder(&gate_settings, &handle.workspace);
    let step = ComplianceStep::new(
        gate_settings,
        settings.credential_resolver(),
        Arc::new(client),
        recorder,
        console,
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling compliance check");
            on_signal.cancel();
        }
    });

    let outcome = step.run(&handle, &cancel).await;
    info!(
        invocation_id = %outcome.invocation_id,
        state = %outcome.state,
        duration_ms = outcome.duration_ms,
        "compliance gate finished"
    );
    Ok(outcome.passed())
}

/// Actions land on disk only when results are published.
fn action_recorder(settings: &GateSettings, workspace: &Path) -> Arc<dyn ActionRecorder> {
    if settings.publish_results {
        Arc::new(FileActionRecorder::new(settings.reports_dir_in(workspace)))
    } else {
        Arc::new(MemoryActionRecorder::new())
    }
}

async fn cmd_health(settings: &SettingsArgs) -> Result<bool> {
    let config = settings.load()?;
    let server_url = validate_server_url(&config.server_url)?;
    let api_key = if config.credentials_id.trim().is_empty() {
        None
    } else {
        Some(
            settings
                .credential_resolver()
                .resolve(config.credentials_id.trim())?,
        )
    };

    let client = ComplianceClient::new(ClientConfig::new(&server_url).with_timeouts(
        std::time::Duration::from_secs(config.connect_timeout_secs.max(1)),
        std::time::Duration::from_secs(config.request_timeout_secs.max(1)),
    ))?;

    match client.health_check(api_key.as_ref()).await {
        Ok(()) => {
            println!("✓ Compliance service at {} is healthy", server_url);
            Ok(true)
        }
        Err(err) => {
            println!("✗ {}", err);
            Ok(false)
        }
    }
}

fn cmd_validate_config(settings: &SettingsArgs) -> Result<bool> {
    let config = settings.load()?;
    match config.validate() {
        Ok(s) => {
            println!("✓ Configuration is valid");
            println!("  Server:             {}", s.server_url);
            println!("  Credential id:      {}", s.credentials_id);
            println!("  Frameworks:         {}", s.frameworks.join(", "));
            println!("  Mode:               {}", s.mode);
            println!("  Severity threshold: {}", s.severity_threshold);
            println!("  Human review:       {}", s.human_review_threshold);
            println!("  Output format:      {}", s.output_format);
            println!("  Fail on violations: {}", s.fail_on_violations);
            println!(
                "  Publish results:    {} ({})",
                s.publish_results,
                s.reports_dir.display()
            );
            Ok(true)
        }
        Err(err) => {
            println!("✗ {}", err);
            Ok(false)
        }
    }
}

fn load_result(input: &Path) -> Result<ComplianceResult> {
    let raw = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {}", input.display()))?;
    let result = ComplianceResult::from_json(&raw)
        .with_context(|| format!("Invalid compliance result in {}", input.display()))?;
    Ok(result)
}

fn cmd_report(input: &Path, output_dir: &Path) -> Result<bool> {
    let result = load_result(input)?;
    let artifacts = write_reports(output_dir, &result, Utc::now())?;

    for line in render_console_summary(&result) {
        println!("{}", line);
    }
    println!("📄 JSON report: {}", artifacts.json_path.display());
    println!("📝 Summary report: {}", artifacts.summary_path.display());
    Ok(true)
}

fn cmd_decide(input: &Path, threshold: &str, fail_on_violations: bool) -> Result<bool> {
    let result = load_result(input)?;
    let threshold: Severity = threshold.parse()?;
    let decision = ComplianceGate::decide(&result, threshold, fail_on_violations);
    println!("{}", serde_json::to_string_pretty(&decision)?);
    Ok(decision.continue_build)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULT: &str = r#"{
        "compliance_score": 58,
        "frameworks_checked": ["essential8"],
        "violations": [
            {"rule_id": "E8-1", "title": "Unpatched", "description": "d",
             "severity": "critical", "framework": "essential8", "category": "patching"},
            {"rule_id": "E8-2", "title": "Weak MFA", "description": "d",
             "severity": "medium", "framework": "essential8", "category": "auth"}
        ],
        "human_review_required": true
    }"#;

    fn write_result(dir: &Path) -> PathBuf {
        let path = dir.join("result.json");
        std::fs::write(&path, RESULT).unwrap();
        path
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "cgate",
            "run",
            "--server-url",
            "https://c.example.com",
            "--credentials-id",
            "api",
            "--fail-on-violations",
            "false",
            "--workspace",
            "/ws",
        ])
        .unwrap();

        match cli.command {
            Commands::Run { settings, build } => {
                assert_eq!(settings.server_url.as_deref(), Some("https://c.example.com"));
                assert_eq!(settings.fail_on_violations, Some(false));
                assert_eq!(build.workspace, Some(PathBuf::from("/ws")));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_flags_override_config_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("cgate.toml");
        std::fs::write(
            &path,
            r#"
server_url = "https://file.example.com"
credentials_id = "from-file"
severity_threshold = "high"
frameworks = "essential8,soc2"
"#,
        )
        .unwrap();

        let args = SettingsArgs {
            config: Some(path),
            severity_threshold: Some("critical".to_string()),
            ..Default::default()
        };
        let config = args.load().unwrap();

        assert_eq!(config.server_url, "https://file.example.com");
        assert_eq!(config.credentials_id, "from-file");
        assert_eq!(config.severity_threshold, "critical");
        assert_eq!(config.frameworks, "essential8,soc2");
        assert!(config.fail_on_violations);
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let args = SettingsArgs {
            config: Some(PathBuf::from("/definitely/not/here.toml")),
            ..Default::default()
        };
        assert!(args.load().is_err());
    }

    #[test]
    fn test_validate_config_reports_invalid_threshold() {
        let args = SettingsArgs {
            server_url: Some("https://c.example.com".to_string()),
            credentials_id: Some("api".to_string()),
            severity_threshold: Some("extreme".to_string()),
            ..Default::default()
        };
        assert!(!cmd_validate_config(&args).unwrap());

        let args = SettingsArgs {
            severity_threshold: Some("high".to_string()),
            ..args
        };
        assert!(cmd_validate_config(&args).unwrap());
    }

    #[test]
    fn test_decide_from_saved_result() {
        let temp_dir = tempfile::tempdir().unwrap();
        let input = write_result(temp_dir.path());

        assert!(!cmd_decide(&input, "medium", true).unwrap());
        assert!(!cmd_decide(&input, "critical", true).unwrap());
        assert!(cmd_decide(&input, "critical", false).unwrap());
        assert!(cmd_decide(&input, "bogus", true).is_err());
    }

    #[test]
    fn test_report_from_saved_result() {
        let temp_dir = tempfile::tempdir().unwrap();
        let input = write_result(temp_dir.path());
        let out = temp_dir.path().join("reports");

        assert!(cmd_report(&input, &out).unwrap());

        let summary = std::fs::read_to_string(out.join(cgate_core::SUMMARY_MD_FILE)).unwrap();
        assert!(summary.contains("58"));
        assert!(out.join(cgate_core::REPORT_JSON_FILE).is_file());
    }

    #[test]
    fn test_report_rejects_malformed_input() {
        let temp_dir = tempfile::tempdir().unwrap();
        let input = temp_dir.path().join("bad.json");
        std::fs::write(&input, r#"{"compliance_score": 140, "frameworks_checked": []}"#).unwrap();

        assert!(cmd_report(&input, temp_dir.path()).is_err());
    }

    #[tokio::test]
    async fn test_run_with_invalid_config_fails_without_network() {
        let args = SettingsArgs {
            server_url: Some("ftp://c.example.com".to_string()),
            credentials_id: Some("api".to_string()),
            ..Default::default()
        };
        let passed = cmd_run(&args, &BuildArgs::default()).await.unwrap();
        assert!(!passed);
    }

    #[tokio::test]
    async fn test_run_with_unreadable_config_file_fails_gracefully() {
        let args = SettingsArgs {
            config: Some(PathBuf::from("/definitely/not/here.toml")),
            ..Default::default()
        };
        let passed = cmd_run(&args, &BuildArgs::default()).await.unwrap();
        assert!(!passed);
    }

    #[tokio::test]
    async fn test_action_file_written_only_when_publishing() {
        let action = || {
            let build = cgate_core::BuildRef {
                job_name: "payments".to_string(),
                build_number: 3,
                build_url: String::new(),
            };
            let result = ComplianceResult::from_json(RESULT).unwrap();
            cgate_core::ComplianceAction::new(build, Arc::new(result))
        };
        let mut config = GateConfig::new("https://c.example.com", "api");

        config.publish_results = false;
        let quiet = tempfile::tempdir().unwrap();
        action_recorder(&config.validate().unwrap(), quiet.path())
            .attach(action())
            .await
            .unwrap();
        assert_eq!(std::fs::read_dir(quiet.path()).unwrap().count(), 0);

        config.publish_results = true;
        let published = tempfile::tempdir().unwrap();
        let settings = config.validate().unwrap();
        action_recorder(&settings, published.path())
            .attach(action())
            .await
            .unwrap();
        assert!(settings
            .reports_dir_in(published.path())
            .join(cgate_core::ACTION_JSON_FILE)
            .is_file());
    }
}
