//! Pending-state persistence for suspended runs
//!
//! A suspended run can outlive the process that produced it: the outcome
//! is saved as JSON under `.daisy/pending.json`, and the resume entry
//! point reloads it once the human has decided. JSON state interchange
//! keeps the approval step scriptable from the outside.

use daisy_core::{DaisyError, EnvironmentTag, Result, RetryOutcome};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Everything needed to resume a suspended run later
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingState {
    pub environment: EnvironmentTag,
    /// The original build action the loop will re-execute after the
    /// approved remediation
    pub action: String,
    pub outcome: RetryOutcome,
}

/// Save a suspended outcome for a later resume
pub fn save_pending(path: &Path, state: &PendingState) -> Result<()> {
    if !state.outcome.is_suspended() {
        return Err(DaisyError::Other(
            "Only suspended outcomes can be saved for resume".to_string(),
        ));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(state)?;
    std::fs::write(path, json)?;
    debug!("Saved pending state to {:?}", path);
    Ok(())
}

/// Load a previously saved suspended outcome
pub fn load_pending(path: &Path) -> Result<PendingState> {
    if !path.exists() {
        return Err(DaisyError::NoPendingRemediation(format!(
            "{} does not exist",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    let state: PendingState = serde_json::from_str(&content)?;
    Ok(state)
}
