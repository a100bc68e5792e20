//! Action execution abstraction

use async_trait::async_trait;
use daisy_core::{DaisyError, EnvironmentTag, Result};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::{Arc, Mutex};
use tokio::process::Command;
use tracing::{debug, instrument};

/// Raw output captured from one executed action
#[derive(Debug, Clone, Default)]
pub struct ActionOutput {
    pub stdout: String,
    pub stderr: String,
}

impl ActionOutput {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            stdout: text.into(),
            stderr: String::new(),
        }
    }

    /// Combined stdout + stderr, the text the classifier sees
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else if self.stdout.is_empty() {
            self.stderr.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

impl From<Output> for ActionOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

/// Trait for executing build-related actions (allows mocking in tests)
///
/// Implementations fail with [`DaisyError::Execution`] when the target
/// application or shell is unreachable. Whether the action itself
/// succeeded is decided by the classifier from the output text, not here.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Execute one action against the given environment and capture its
    /// raw textual output
    async fn execute(
        &self,
        environment: EnvironmentTag,
        action: &str,
        working_directory: Option<&Path>,
    ) -> Result<ActionOutput>;
}

/// Real executor that runs actions through the shell
#[derive(Clone)]
pub struct CommandExecutor {
    default_directory: PathBuf,
}

impl CommandExecutor {
    pub fn new(default_directory: impl Into<PathBuf>) -> Self {
        Self {
            default_directory: default_directory.into(),
        }
    }
}

#[async_trait]
impl ActionExecutor for CommandExecutor {
    #[instrument(skip(self), fields(env = %environment))]
    async fn execute(
        &self,
        environment: EnvironmentTag,
        action: &str,
        working_directory: Option<&Path>,
    ) -> Result<ActionOutput> {
        let cwd = working_directory.unwrap_or(&self.default_directory);
        debug!("Executing {:?} in {:?}", action, cwd);

        let output = Command::new("sh")
            .arg("-c")
            .arg(action)
            .current_dir(cwd)
            .output()
            .await
            .map_err(|e| DaisyError::Execution(format!("Failed to spawn {:?}: {}", action, e)))?;

        if !output.status.success() {
            debug!("Action exited with {:?}", output.status.code());
        }

        Ok(ActionOutput::from(output))
    }
}

/// A call the mock executor received, for test assertions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedAction {
    pub environment: EnvironmentTag,
    pub action: String,
}

/// Mock executor for testing
///
/// Responses are scripted in order; each `execute` call (build attempts
/// and remediations alike) consumes one. An exhausted script returns
/// empty output, which classifies as an unclassified failure.
#[derive(Clone, Default)]
pub struct MockExecutor {
    script: Arc<Mutex<VecDeque<Result<ActionOutput>>>>,
    calls: Arc<Mutex<Vec<ExecutedAction>>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful execution returning the given output text
    pub fn with_output(self, text: &str) -> Self {
        self.script
            .lock()
            .expect("script lock")
            .push_back(Ok(ActionOutput::from_text(text)));
        self
    }

    /// Queue an execution failure (target unreachable)
    pub fn with_failure(self, detail: &str) -> Self {
        self.script
            .lock()
            .expect("script lock")
            .push_back(Err(DaisyError::Execution(detail.to_string())));
        self
    }

    /// All calls received so far, in order
    pub fn calls(&self) -> Vec<ExecutedAction> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl ActionExecutor for MockExecutor {
    async fn execute(
        &self,
        environment: EnvironmentTag,
        action: &str,
        _working_directory: Option<&Path>,
    ) -> Result<ActionOutput> {
        self.calls.lock().expect("calls lock").push(ExecutedAction {
            environment,
            action: action.to_string(),
        });

        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| Ok(ActionOutput::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_executor_replays_script_in_order() {
        let executor = MockExecutor::new()
            .with_output("first")
            .with_failure("Xcode unreachable")
            .with_output("third");

        let out = executor
            .execute(EnvironmentTag::Xcode, "build", None)
            .await
            .unwrap();
        assert_eq!(out.combined(), "first");

        let err = executor
            .execute(EnvironmentTag::Xcode, "build", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Xcode unreachable"));

        let out = executor
            .execute(EnvironmentTag::Xcode, "build", None)
            .await
            .unwrap();
        assert_eq!(out.combined(), "third");

        // Exhausted script degrades to empty output
        let out = executor
            .execute(EnvironmentTag::Xcode, "build", None)
            .await
            .unwrap();
        assert!(out.combined().is_empty());

        let calls = executor.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0].action, "build");
    }

    #[tokio::test]
    async fn command_executor_captures_stdout() {
        let temp = tempfile::TempDir::new().unwrap();
        let executor = CommandExecutor::new(temp.path());

        let out = executor
            .execute(EnvironmentTag::Shell, "echo build succeeded", None)
            .await
            .unwrap();
        assert!(out.combined().contains("build succeeded"));
    }

    #[tokio::test]
    async fn command_executor_captures_stderr_on_failure() {
        let temp = tempfile::TempDir::new().unwrap();
        let executor = CommandExecutor::new(temp.path());

        let out = executor
            .execute(EnvironmentTag::Shell, "echo oops >&2; exit 1", None)
            .await
            .unwrap();
        assert!(out.combined().contains("oops"));
    }

    #[test]
    fn combined_joins_both_streams() {
        let output = ActionOutput {
            stdout: "out".to_string(),
            stderr: "err".to_string(),
        };
        assert_eq!(output.combined(), "out\nerr");
        assert_eq!(ActionOutput::from_text("only").combined(), "only");
    }
}
