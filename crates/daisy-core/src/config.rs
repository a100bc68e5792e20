//! Configuration for Daisy
//!
//! Preferences are read from `.daisy/config.toml` once per orchestrator
//! invocation. A missing or malformed file yields the defaults
//! (autonomous mode, empty allowlist) rather than an error, so the
//! orchestrator can always run.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{AutomationMode, Result};

/// Repository-level Daisy configuration, loaded from `.daisy/config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaisyConfig {
    /// Approval-gate preferences
    #[serde(default)]
    pub automation: AutomationSection,

    /// Retry loop defaults
    #[serde(default)]
    pub retry: RetrySection,
}

/// `[automation]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomationSection {
    /// `autonomous` applies remediations immediately; `preview` requires
    /// an allowlist hit or explicit approval
    #[serde(default)]
    pub mode: AutomationMode,

    /// Remediation commands containing any of these substrings are
    /// auto-approved even in preview mode. Matching is case-sensitive.
    #[serde(default)]
    pub auto_approve: Vec<String>,
}

/// `[retry]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySection {
    /// Maximum build attempts before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Wait after applying a remediation before the next attempt, so
    /// installs and syncs have time to land
    #[serde(default = "default_remediation_settle_ms")]
    pub remediation_settle_ms: u64,

    /// Wait between issuing a build action and classifying its output.
    /// Zero for shell commands; IDE capabilities that capture logs
    /// asynchronously can raise it.
    #[serde(default)]
    pub build_completion_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_remediation_settle_ms() -> u64 {
    2000
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            remediation_settle_ms: default_remediation_settle_ms(),
            build_completion_ms: 0,
        }
    }
}

impl DaisyConfig {
    /// Load configuration from `.daisy/config.toml`, or use defaults.
    ///
    /// A file that fails to parse is logged and ignored: preferences are
    /// advisory and must never block a build run.
    pub fn load_or_default(repo_root: &Path) -> Self {
        let config_path = repo_root.join(".daisy/config.toml");

        let content = match std::fs::read_to_string(&config_path) {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };

        match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(
                    "Ignoring malformed config at {:?}, using defaults: {}",
                    config_path,
                    e
                );
                Self::default()
            }
        }
    }

    /// Write default configuration to `.daisy/config.toml`
    pub fn write_default(repo_root: &Path) -> Result<()> {
        let config_dir = repo_root.join(".daisy");
        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        let content = toml::to_string_pretty(&Self::default())
            .map_err(|e| crate::DaisyError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }
}

/// Preferences the approval gate reads, resolved once per invocation
#[derive(Debug, Clone, Default)]
pub struct AutomationPrefs {
    pub mode: AutomationMode,
    pub auto_approve: Vec<String>,
}

impl From<&DaisyConfig> for AutomationPrefs {
    fn from(config: &DaisyConfig) -> Self {
        Self {
            mode: config.automation.mode,
            auto_approve: config.automation.auto_approve.clone(),
        }
    }
}
