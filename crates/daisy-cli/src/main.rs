//! Daisy CLI - build-retry orchestration for desktop build environments
//!
//! Usage:
//!   daisy init                      Write default .daisy/config.toml
//!   daisy build <action>            Run a build action with bounded retries
//!   daisy resume --approve|--reject Resume a suspended run
//!   daisy classify <file>           Classify a captured build log

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use daisy_core::{AutomationMode, AutomationPrefs, DaisyConfig, EnvironmentTag, RetryOutcome, RetryStatus};
use daisy_exec::CommandExecutor;
use daisy_orchestrator::{
    load_pending, save_pending, PendingState, ResumeDecision, RetryConfig, RetryOrchestrator,
};
use std::io::Read;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "daisy")]
#[command(author, version, about = "Build-retry orchestrator for Xcode, Android Studio and shell builds")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default .daisy/config.toml
    Init {
        /// Repository path (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Run a build action with bounded retries
    Build {
        /// Build action to execute
        action: String,

        /// Target environment
        #[arg(short, long, value_enum, default_value = "shell")]
        env: CliEnvironment,

        /// Maximum attempts (defaults to the configured value)
        #[arg(short = 'n', long)]
        max_retries: Option<u32>,

        /// Working directory for executed actions
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Force preview mode (remediations need approval)
        #[arg(long, conflicts_with = "autonomous")]
        preview: bool,

        /// Force autonomous mode (remediations apply immediately)
        #[arg(long, conflicts_with = "preview")]
        autonomous: bool,

        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resume a suspended run after deciding on the pending remediation
    Resume {
        /// Approve the pending remediation
        #[arg(long, conflicts_with = "reject")]
        approve: bool,

        /// Reject the pending remediation
        #[arg(long, conflicts_with = "approve")]
        reject: bool,

        /// Working directory of the original run
        #[arg(long)]
        cwd: Option<PathBuf>,

        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Classify a captured build log (reads stdin if no file is given)
    Classify {
        /// Log file to classify
        file: Option<PathBuf>,

        /// Target environment
        #[arg(short, long, value_enum, default_value = "shell")]
        env: CliEnvironment,
    },
}

/// CLI-friendly environment enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliEnvironment {
    Xcode,
    AndroidStudio,
    Shell,
}

impl From<CliEnvironment> for EnvironmentTag {
    fn from(env: CliEnvironment) -> Self {
        match env {
            CliEnvironment::Xcode => EnvironmentTag::Xcode,
            CliEnvironment::AndroidStudio => EnvironmentTag::AndroidStudio,
            CliEnvironment::Shell => EnvironmentTag::Shell,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Init { path } => cmd_init(path),
        Commands::Build {
            action,
            env,
            max_retries,
            cwd,
            preview,
            autonomous,
            json,
        } => cmd_build(action, env.into(), max_retries, cwd, preview, autonomous, json).await,
        Commands::Resume {
            approve,
            reject,
            cwd,
            json,
        } => cmd_resume(approve, reject, cwd, json).await,
        Commands::Classify { file, env } => cmd_classify(file, env.into()),
    }
}

fn cmd_init(path: PathBuf) -> Result<()> {
    DaisyConfig::write_default(&path).context("Failed to write default config")?;
    println!("Initialized Daisy in {:?}", path);
    println!("Created:");
    println!("  .daisy/config.toml");
    Ok(())
}

fn pending_path(root: &std::path::Path) -> PathBuf {
    root.join(".daisy/pending.json")
}

fn resolve_root(cwd: Option<PathBuf>) -> Result<PathBuf> {
    match cwd {
        Some(path) => Ok(path),
        None => std::env::current_dir().context("Cannot determine current directory"),
    }
}

async fn cmd_build(
    action: String,
    environment: EnvironmentTag,
    max_retries: Option<u32>,
    cwd: Option<PathBuf>,
    preview: bool,
    autonomous: bool,
    json: bool,
) -> Result<()> {
    let root = resolve_root(cwd)?;
    let file_config = DaisyConfig::load_or_default(&root);
    let prefs = AutomationPrefs::from(&file_config);

    let mut config = RetryConfig::from_section(&file_config.retry);
    config.working_directory = Some(root.clone());
    if let Some(n) = max_retries {
        config.max_retries = n;
    }
    if preview {
        config.mode_override = Some(AutomationMode::Preview);
    } else if autonomous {
        config.mode_override = Some(AutomationMode::Autonomous);
    }

    info!("Building in {:?} ({})", root, environment);
    let orchestrator =
        RetryOrchestrator::new(CommandExecutor::new(root.clone()), config, prefs);
    let outcome = orchestrator.build_with_retry(environment, &action).await;

    if outcome.is_suspended() {
        let state = PendingState {
            environment,
            action,
            outcome: outcome.clone(),
        };
        save_pending(&pending_path(&root), &state)?;
    }

    report(&outcome, json)
}

async fn cmd_resume(approve: bool, reject: bool, cwd: Option<PathBuf>, json: bool) -> Result<()> {
    if !approve && !reject {
        bail!("Specify either --approve or --reject");
    }
    let root = resolve_root(cwd)?;
    let path = pending_path(&root);
    let state = load_pending(&path).context("No suspended run to resume")?;

    let file_config = DaisyConfig::load_or_default(&root);
    let prefs = AutomationPrefs::from(&file_config);
    let mut config = RetryConfig::from_section(&file_config.retry);
    config.working_directory = Some(root.clone());

    let decision = if approve {
        ResumeDecision::Approved
    } else {
        ResumeDecision::Rejected
    };

    let orchestrator =
        RetryOrchestrator::new(CommandExecutor::new(root.clone()), config, prefs);
    let outcome = orchestrator
        .resume_after_approval(state.environment, &state.action, state.outcome, decision)
        .await;

    if outcome.is_suspended() {
        // Suspended again on a different remediation
        let next = PendingState {
            environment: state.environment,
            action: state.action,
            outcome: outcome.clone(),
        };
        save_pending(&path, &next)?;
    } else {
        let _ = std::fs::remove_file(&path);
    }

    report(&outcome, json)
}

fn cmd_classify(file: Option<PathBuf>, environment: EnvironmentTag) -> Result<()> {
    let log = match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {:?}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    let result = daisy_classify::classify(&log, environment);
    println!("{}", result.summary);
    for matched in &result.matches {
        println!("  [{}] {} -> {}", matched.category, matched.message, matched.remediation);
    }
    Ok(())
}

/// Print the final report. The trail is the primary error-reporting
/// mechanism: every attempt is shown, even on success.
fn report(outcome: &RetryOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        for record in &outcome.trail {
            println!(
                "attempt {}: {} ({:?})",
                record.attempt, record.classification.summary, record.approval
            );
            if let Some(remediation) = &record.remediation {
                println!("  remediation: {}", remediation);
            }
        }
        match &outcome.status {
            RetryStatus::Success { attempts } => {
                println!("Build succeeded after {} attempt(s)", attempts);
            }
            RetryStatus::Suspended {
                pending_action,
                reason,
            } => {
                println!("Suspended: {} ({})", pending_action, reason);
                println!("Run `daisy resume --approve` or `daisy resume --reject`");
            }
            RetryStatus::Exhausted { final_error } => {
                let detail = final_error.as_deref().unwrap_or("no further detail");
                println!("Build failed: {}", detail);
            }
        }
    }

    if let RetryStatus::Exhausted { .. } = outcome.status {
        bail!("Build did not succeed");
    }
    Ok(())
}
