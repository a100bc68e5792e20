//! Core type definitions for the build-retry orchestrator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Target environment for a build action
///
/// Selects which error-pattern table and success marker apply to the
/// captured log text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentTag {
    /// Xcode (iOS/macOS builds)
    Xcode,
    /// Android Studio (Gradle builds)
    AndroidStudio,
    /// Plain shell commands
    #[default]
    Shell,
}

impl EnvironmentTag {
    /// Parse an environment name, falling back to `Shell` for anything
    /// unrecognized. The pattern tables treat the shell table as the
    /// catch-all for unknown environments.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or(Self::Shell)
    }
}

impl std::fmt::Display for EnvironmentTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Xcode => write!(f, "xcode"),
            Self::AndroidStudio => write!(f, "android_studio"),
            Self::Shell => write!(f, "shell"),
        }
    }
}

impl std::str::FromStr for EnvironmentTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "xcode" | "ios" => Ok(Self::Xcode),
            "android_studio" | "android-studio" | "android" => Ok(Self::AndroidStudio),
            "shell" | "terminal" => Ok(Self::Shell),
            _ => Err(format!("Unknown environment: {}", s)),
        }
    }
}

/// Automation mode governing remediation approval
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutomationMode {
    /// Remediations are applied immediately
    #[default]
    Autonomous,
    /// Remediations need an allowlist hit or explicit approval
    Preview,
}

impl std::fmt::Display for AutomationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Autonomous => write!(f, "autonomous"),
            Self::Preview => write!(f, "preview"),
        }
    }
}

impl std::str::FromStr for AutomationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "autonomous" => Ok(Self::Autonomous),
            "preview" => Ok(Self::Preview),
            _ => Err(format!("Invalid automation mode: {}", s)),
        }
    }
}

/// Category tag for a matched error pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    MissingDependency,
    ImportError,
    BuildError,
    SigningError,
    SdkError,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingDependency => write!(f, "missing_dependency"),
            Self::ImportError => write!(f, "import_error"),
            Self::BuildError => write!(f, "build_error"),
            Self::SigningError => write!(f, "signing_error"),
            Self::SdkError => write!(f, "sdk_error"),
        }
    }
}

/// One error pattern matched in build output
///
/// Owned snapshot of the static pattern that hit, so attempt records
/// serialize without referencing the tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedError {
    pub category: ErrorCategory,
    /// Human-readable description of the failure
    pub message: String,
    /// Command proposed to resolve the failure before the next retry
    pub remediation: String,
}

/// Result of classifying one attempt's output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// True when the environment's success marker hit. Authoritative:
    /// checked before (and independently of) the error matches.
    pub success: bool,
    /// All patterns that matched, in table scan order
    pub matches: Vec<MatchedError>,
    /// Advisory one-line summary. Callers branch on `success` and
    /// `matches`, never on this string.
    pub summary: String,
}

impl ClassificationResult {
    /// Synthetic classification for an executor that failed to run at all
    /// (target unreachable, permission denied). Counts as an ordinary
    /// failed attempt.
    pub fn execution_failure(detail: impl Into<String>) -> Self {
        Self {
            success: false,
            matches: Vec::new(),
            summary: detail.into(),
        }
    }

    /// Remediation suggestions, one per matched error, same order
    pub fn suggestions(&self) -> Vec<String> {
        self.matches.iter().map(|m| m.remediation.clone()).collect()
    }

    /// Failed, but no pattern matched
    pub fn is_unclassified_failure(&self) -> bool {
        !self.success && self.matches.is_empty()
    }
}

/// How a remediation was (or was not) approved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalOutcome {
    /// No remediation was proposed for this attempt
    NotNeeded,
    /// Approved by mode or allowlist without asking
    AutoApproved,
    /// Explicitly approved by the caller after suspension
    UserApproved,
    /// Approval requested, not yet given (suspended attempt)
    Pending,
}

/// One entry in the audit trail, produced per loop iteration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// Attempt number, 1-indexed
    pub attempt: u32,
    /// Action that was executed
    pub action: String,
    /// Raw captured output for this attempt
    pub output: String,
    pub classification: ClassificationResult,
    /// Remediation proposed for this attempt, if any
    pub remediation: Option<String>,
    pub approval: ApprovalOutcome,
    pub timestamp: DateTime<Utc>,
}

/// Terminal status of a retry run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryStatus {
    /// Build classified as success at `attempts`
    Success { attempts: u32 },
    /// Retry budget spent (or run cancelled) without success
    Exhausted { final_error: Option<String> },
    /// Preview mode paused the run before executing a remediation
    Suspended { pending_action: String, reason: String },
}

/// Final report of a retry run: terminal status plus the full attempt
/// trail. The trail is never discarded, even on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryOutcome {
    pub run_id: Uuid,
    pub status: RetryStatus,
    pub trail: Vec<AttemptRecord>,
}

impl RetryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, RetryStatus::Success { .. })
    }

    pub fn is_suspended(&self) -> bool {
        matches!(self.status, RetryStatus::Suspended { .. })
    }

    /// Pending remediation if this run suspended
    pub fn pending_action(&self) -> Option<&str> {
        match &self.status {
            RetryStatus::Suspended { pending_action, .. } => Some(pending_action),
            _ => None,
        }
    }
}

/// Cooperative cancellation flag, checked between attempts
///
/// Cloning shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
