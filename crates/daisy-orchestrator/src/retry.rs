//! Retry orchestrator - the bounded build-retry state machine
//!
//! Each iteration executes the action, classifies the captured output,
//! and either stops (success, budget spent) or applies the first matched
//! error's remediation through the approval gate and goes around again.
//! Only the first match drives remediation: simultaneous errors are fixed
//! one per iteration, because applying a fix usually invalidates the
//! later matches.
//!
//! No internal error escapes: executor failures become synthetic failed
//! classifications that consume an attempt, and remediation failures are
//! swallowed into the next attempt's classification.

use crate::approval::{evaluate, ApprovalDecision};
use chrono::Utc;
use daisy_core::{
    ApprovalOutcome, AttemptRecord, AutomationMode, AutomationPrefs, CancelFlag,
    ClassificationResult, EnvironmentTag, RetryOutcome, RetryStatus, RetrySection,
};
use daisy_classify::FallbackClassifier;
use daisy_exec::{ActionExecutor, VisionCapability};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Runtime configuration for one orchestrator invocation
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum build attempts before giving up
    pub max_retries: u32,
    /// Named wait after a remediation runs, so installs have time to land
    pub remediation_settle: Duration,
    /// Named wait between issuing the action and classifying its output
    pub build_completion: Duration,
    /// Working directory for executed actions
    pub working_directory: Option<PathBuf>,
    /// Per-call mode override; takes precedence over stored preferences
    pub mode_override: Option<AutomationMode>,
    /// Cooperative cancellation, checked at the top of each iteration
    pub cancel: CancelFlag,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from_section(&RetrySection::default())
    }
}

impl RetryConfig {
    /// Build runtime config from the `[retry]` preferences section
    pub fn from_section(section: &RetrySection) -> Self {
        Self {
            max_retries: section.max_retries,
            remediation_settle: Duration::from_millis(section.remediation_settle_ms),
            build_completion: Duration::from_millis(section.build_completion_ms),
            working_directory: None,
            mode_override: None,
            cancel: CancelFlag::new(),
        }
    }
}

/// Caller's decision when resuming a suspended run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeDecision {
    Approved,
    Rejected,
}

/// The retry state machine
///
/// Owns the executor capability, the resolved preferences, and an
/// optional vision fallback for the classifier. One invocation assumes
/// exclusive access to its target environment; concurrent invocations
/// against the same environment are undefined.
pub struct RetryOrchestrator<E: ActionExecutor> {
    executor: E,
    config: RetryConfig,
    prefs: AutomationPrefs,
    classifier: FallbackClassifier,
}

impl<E: ActionExecutor> RetryOrchestrator<E> {
    pub fn new(executor: E, config: RetryConfig, prefs: AutomationPrefs) -> Self {
        Self {
            executor,
            config,
            prefs,
            classifier: FallbackClassifier::new(),
        }
    }

    /// Attach a vision capability as a secondary classification channel
    pub fn with_vision(mut self, vision: impl VisionCapability + 'static) -> Self {
        self.classifier = FallbackClassifier::with_vision(vision);
        self
    }

    /// Run the build action with bounded retries.
    ///
    /// Infallible by design: every failure mode folds into the returned
    /// terminal status, and the trail always covers every attempt made.
    pub async fn build_with_retry(
        &self,
        environment: EnvironmentTag,
        action: &str,
    ) -> RetryOutcome {
        let run_id = Uuid::new_v4();
        info!("Starting build-with-retry {} for {:?}", run_id, action);
        self.run_loop(run_id, environment, action, Vec::new()).await
    }

    /// Resume a previously suspended run with the caller's decision.
    ///
    /// Approved: the pending remediation is executed, the suspended record
    /// is upgraded to user-approved, and the loop continues on the same
    /// trail with the remaining attempt budget (at least one attempt).
    /// Rejected: the run converts to `Exhausted` without consuming a
    /// retry. Non-suspended outcomes are returned unchanged.
    pub async fn resume_after_approval(
        &self,
        environment: EnvironmentTag,
        action: &str,
        outcome: RetryOutcome,
        decision: ResumeDecision,
    ) -> RetryOutcome {
        let RetryStatus::Suspended {
            pending_action,
            reason,
        } = outcome.status.clone()
        else {
            return outcome;
        };

        let mut trail = outcome.trail;

        match decision {
            ResumeDecision::Rejected => {
                info!("Remediation {:?} rejected by caller", pending_action);
                RetryOutcome {
                    run_id: outcome.run_id,
                    status: RetryStatus::Exhausted {
                        final_error: Some(format!(
                            "Remediation {:?} rejected ({})",
                            pending_action, reason
                        )),
                    },
                    trail,
                }
            }
            ResumeDecision::Approved => {
                info!("Remediation {:?} approved by caller", pending_action);
                if let Some(record) = trail.last_mut() {
                    record.approval = ApprovalOutcome::UserApproved;
                }
                self.apply_remediation(environment, &pending_action).await;
                self.run_loop(outcome.run_id, environment, action, trail)
                    .await
            }
        }
    }

    async fn run_loop(
        &self,
        run_id: Uuid,
        environment: EnvironmentTag,
        action: &str,
        mut trail: Vec<AttemptRecord>,
    ) -> RetryOutcome {
        let mode = self.config.mode_override.unwrap_or(self.prefs.mode);
        // A resumed trail keeps its history; always allow at least one
        // more attempt past what it already holds.
        let max_attempts = self.config.max_retries.max(trail.len() as u32 + 1);

        loop {
            let attempt = trail.len() as u32 + 1;

            if self.config.cancel.is_cancelled() {
                info!("Run {} cancelled before attempt {}", run_id, attempt);
                return RetryOutcome {
                    run_id,
                    status: RetryStatus::Exhausted {
                        final_error: Some(format!("Cancelled before attempt {}", attempt)),
                    },
                    trail,
                };
            }

            info!("=== Attempt {} of {} ===", attempt, max_attempts);
            let (output, classification) = self.execute_and_classify(environment, action).await;

            let mut record = AttemptRecord {
                attempt,
                action: action.to_string(),
                output,
                classification,
                remediation: None,
                approval: ApprovalOutcome::NotNeeded,
                timestamp: Utc::now(),
            };

            if record.classification.success {
                info!("Build classified as success at attempt {}", attempt);
                trail.push(record);
                return RetryOutcome {
                    run_id,
                    status: RetryStatus::Success { attempts: attempt },
                    trail,
                };
            }

            if attempt >= max_attempts {
                warn!("Retry budget spent after {} attempts", attempt);
                let final_error = Some(record.classification.summary.clone());
                trail.push(record);
                return RetryOutcome {
                    run_id,
                    status: RetryStatus::Exhausted { final_error },
                    trail,
                };
            }

            if record.classification.matches.is_empty() {
                // Unclassified failure: retry with no fix applied, in case
                // the failure was transient.
                debug!("No pattern matched, retrying without remediation");
                trail.push(record);
                continue;
            }

            let first = &record.classification.matches[0];
            let remediation = first.remediation.clone();
            let reason = first.message.clone();
            record.remediation = Some(remediation.clone());

            match evaluate(&remediation, mode, &self.prefs.auto_approve) {
                ApprovalDecision::AwaitingApproval => {
                    info!("Suspending for approval of {:?}", remediation);
                    record.approval = ApprovalOutcome::Pending;
                    trail.push(record);
                    return RetryOutcome {
                        run_id,
                        status: RetryStatus::Suspended {
                            pending_action: remediation,
                            reason,
                        },
                        trail,
                    };
                }
                ApprovalDecision::Approved => {
                    info!("Applying remediation {:?}", remediation);
                    record.approval = ApprovalOutcome::AutoApproved;
                    trail.push(record);
                    self.apply_remediation(environment, &remediation).await;
                }
            }
        }
    }

    /// Execute one action and classify its output. Executor failures are
    /// folded into a synthetic failed classification.
    async fn execute_and_classify(
        &self,
        environment: EnvironmentTag,
        action: &str,
    ) -> (String, ClassificationResult) {
        let cwd = self.config.working_directory.as_deref();

        match self.executor.execute(environment, action, cwd).await {
            Ok(output) => {
                if !self.config.build_completion.is_zero() {
                    tokio::time::sleep(self.config.build_completion).await;
                }
                let text = output.combined();
                let classification = self.classifier.classify(&text, environment).await;
                (text, classification)
            }
            Err(e) => {
                warn!("Executor failed: {}", e);
                (String::new(), ClassificationResult::execution_failure(e.to_string()))
            }
        }
    }

    /// Run a remediation command. Failures are logged and swallowed; a
    /// remediation that keeps failing simply exhausts the retry budget.
    async fn apply_remediation(&self, environment: EnvironmentTag, remediation: &str) {
        let cwd = self.config.working_directory.as_deref();
        if let Err(e) = self.executor.execute(environment, remediation, cwd).await {
            warn!("Remediation {:?} failed (non-fatal): {}", remediation, e);
        }
        if !self.config.remediation_settle.is_zero() {
            tokio::time::sleep(self.config.remediation_settle).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daisy_exec::MockExecutor;

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig {
            max_retries,
            remediation_settle: Duration::ZERO,
            build_completion: Duration::ZERO,
            working_directory: None,
            mode_override: None,
            cancel: CancelFlag::new(),
        }
    }

    fn orchestrator(
        executor: MockExecutor,
        max_retries: u32,
        prefs: AutomationPrefs,
    ) -> RetryOrchestrator<MockExecutor> {
        RetryOrchestrator::new(executor, fast_config(max_retries), prefs)
    }

    fn preview_prefs(auto_approve: &[&str]) -> AutomationPrefs {
        AutomationPrefs {
            mode: AutomationMode::Preview,
            auto_approve: auto_approve.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn success_on_first_attempt_short_circuits() {
        // Scenario B: success marker present; co-occurring error text is
        // irrelevant because the success flag is authoritative.
        let executor = MockExecutor::new()
            .with_output("error: stale diagnostics\n** BUILD SUCCEEDED **");
        let orch = orchestrator(executor.clone(), 3, AutomationPrefs::default());

        let outcome = orch
            .build_with_retry(EnvironmentTag::Xcode, "build MyApp")
            .await;

        assert_eq!(outcome.status, RetryStatus::Success { attempts: 1 });
        assert_eq!(outcome.trail.len(), 1);
        assert!(outcome.trail[0].remediation.is_none());
        // Only the single build action ran
        assert_eq!(executor.calls().len(), 1);
    }

    #[tokio::test]
    async fn cocoapods_failure_remediates_then_retries() {
        // Scenario A: CocoaPods marker, autonomous mode, pod install runs
        // between attempts 1 and 2.
        let executor = MockExecutor::new()
            .with_output("[!] CocoaPods could not find compatible versions")
            .with_output("") // pod install output (discarded)
            .with_output("** BUILD SUCCEEDED **");
        let orch = orchestrator(executor.clone(), 3, AutomationPrefs::default());

        let outcome = orch
            .build_with_retry(EnvironmentTag::Xcode, "build MyApp")
            .await;

        assert_eq!(outcome.status, RetryStatus::Success { attempts: 2 });
        assert_eq!(outcome.trail.len(), 2);
        assert_eq!(outcome.trail[0].remediation.as_deref(), Some("pod install"));
        assert_eq!(outcome.trail[0].approval, ApprovalOutcome::AutoApproved);

        let calls = executor.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].action, "pod install");
        assert_eq!(calls[2].action, "build MyApp");
    }

    #[tokio::test]
    async fn unclassified_failures_exhaust_without_remediation() {
        // Scenario C: nothing matches, budget of 2, free retries only.
        let executor = MockExecutor::new()
            .with_output("inscrutable failure")
            .with_output("inscrutable failure");
        let orch = orchestrator(executor.clone(), 2, AutomationPrefs::default());

        let outcome = orch
            .build_with_retry(EnvironmentTag::Shell, "make")
            .await;

        assert!(matches!(outcome.status, RetryStatus::Exhausted { .. }));
        assert_eq!(outcome.trail.len(), 2);
        assert!(outcome.trail.iter().all(|r| r.remediation.is_none()));
        // Exactly 2 build executions, no remediation calls
        assert_eq!(executor.calls().len(), 2);
    }

    #[tokio::test]
    async fn never_exceeds_retry_budget() {
        // P1: always-failing classified errors still stop at the bound.
        for max_retries in 1..=4u32 {
            let mut executor = MockExecutor::new();
            for _ in 0..max_retries {
                executor = executor
                    .with_output("ModuleNotFoundError: No module named 'flask'")
                    .with_output(""); // remediation
            }
            let orch = orchestrator(executor.clone(), max_retries, AutomationPrefs::default());

            let outcome = orch
                .build_with_retry(EnvironmentTag::Shell, "python app.py")
                .await;

            assert!(matches!(outcome.status, RetryStatus::Exhausted { .. }));
            assert_eq!(outcome.trail.len(), max_retries as usize);
            let builds = executor
                .calls()
                .iter()
                .filter(|c| c.action == "python app.py")
                .count();
            assert_eq!(builds, max_retries as usize);
        }
    }

    #[tokio::test]
    async fn executor_error_counts_as_failed_attempt() {
        let executor = MockExecutor::new()
            .with_failure("Xcode is not running")
            .with_output("** BUILD SUCCEEDED **");
        let orch = orchestrator(executor, 3, AutomationPrefs::default());

        let outcome = orch
            .build_with_retry(EnvironmentTag::Xcode, "build MyApp")
            .await;

        assert_eq!(outcome.status, RetryStatus::Success { attempts: 2 });
        let first = &outcome.trail[0];
        assert!(!first.classification.success);
        assert!(first.classification.matches.is_empty());
        assert!(first.classification.summary.contains("Xcode is not running"));
    }

    #[tokio::test]
    async fn autonomous_mode_never_suspends() {
        // P4: every attempt proposes a remediation, none suspends.
        let executor = MockExecutor::new()
            .with_output("Cannot find module 'express'")
            .with_output("") // npm install
            .with_output("Cannot find module 'express'")
            .with_output("") // npm install
            .with_output("Cannot find module 'express'");
        let orch = orchestrator(executor, 3, AutomationPrefs::default());

        let outcome = orch
            .build_with_retry(EnvironmentTag::Shell, "node server.js")
            .await;

        assert!(!outcome.is_suspended());
        assert!(outcome
            .trail
            .iter()
            .all(|r| r.approval != ApprovalOutcome::Pending));
    }

    #[tokio::test]
    async fn preview_mode_suspends_before_remediation_runs() {
        // P5: the remediation must not have executed at suspension time.
        let executor = MockExecutor::new().with_output("[!] CocoaPods sync needed");
        let orch = orchestrator(executor.clone(), 3, preview_prefs(&[]));

        let outcome = orch
            .build_with_retry(EnvironmentTag::Xcode, "build MyApp")
            .await;

        assert_eq!(
            outcome.status,
            RetryStatus::Suspended {
                pending_action: "pod install".to_string(),
                reason: "CocoaPods dependencies are missing or out of date".to_string(),
            }
        );
        assert_eq!(outcome.trail.len(), 1);
        assert_eq!(outcome.trail[0].approval, ApprovalOutcome::Pending);
        // Only the build ran; pod install never did
        assert_eq!(executor.calls().len(), 1);
    }

    #[tokio::test]
    async fn preview_mode_auto_approves_allowlisted_remediation() {
        // Scenario D: "npm install" allowlisted, applied without suspension.
        let executor = MockExecutor::new()
            .with_output("Cannot find module 'express'")
            .with_output("") // npm install
            .with_output("exit code: 0");
        let orch = orchestrator(executor.clone(), 3, preview_prefs(&["npm install"]));

        let outcome = orch
            .build_with_retry(EnvironmentTag::Shell, "node server.js")
            .await;

        assert_eq!(outcome.status, RetryStatus::Success { attempts: 2 });
        assert_eq!(outcome.trail[0].approval, ApprovalOutcome::AutoApproved);
        assert_eq!(executor.calls()[1].action, "npm install");
    }

    #[tokio::test]
    async fn preview_suspends_non_allowlisted_remediation() {
        // Scenario D, second half: pip install is not allowlisted.
        let executor =
            MockExecutor::new().with_output("ModuleNotFoundError: No module named 'x'");
        let orch = orchestrator(executor, 3, preview_prefs(&["npm install"]));

        let outcome = orch
            .build_with_retry(EnvironmentTag::Shell, "python app.py")
            .await;

        assert_eq!(
            outcome.pending_action(),
            Some("pip install -r requirements.txt")
        );
    }

    #[tokio::test]
    async fn mode_override_beats_stored_preference() {
        let executor = MockExecutor::new().with_output("[!] CocoaPods sync needed");
        let mut config = fast_config(3);
        config.mode_override = Some(AutomationMode::Preview);
        // Stored preference says autonomous; the override wins.
        let orch = RetryOrchestrator::new(executor, config, AutomationPrefs::default());

        let outcome = orch
            .build_with_retry(EnvironmentTag::Xcode, "build MyApp")
            .await;
        assert!(outcome.is_suspended());
    }

    #[tokio::test]
    async fn resume_approved_applies_fix_and_continues_trail() {
        let executor = MockExecutor::new().with_output("[!] CocoaPods sync needed");
        let orch = orchestrator(executor.clone(), 3, preview_prefs(&[]));
        let suspended = orch
            .build_with_retry(EnvironmentTag::Xcode, "build MyApp")
            .await;
        assert!(suspended.is_suspended());
        let run_id = suspended.run_id;

        // Feed the post-approval executions: pod install, then the build.
        let _ = executor.clone().with_output("").with_output("** BUILD SUCCEEDED **");

        let outcome = orch
            .resume_after_approval(
                EnvironmentTag::Xcode,
                "build MyApp",
                suspended,
                ResumeDecision::Approved,
            )
            .await;

        assert_eq!(outcome.run_id, run_id);
        assert_eq!(outcome.status, RetryStatus::Success { attempts: 2 });
        assert_eq!(outcome.trail.len(), 2);
        assert_eq!(outcome.trail[0].approval, ApprovalOutcome::UserApproved);

        let calls = executor.calls();
        assert_eq!(calls[1].action, "pod install");
        assert_eq!(calls[2].action, "build MyApp");
    }

    #[tokio::test]
    async fn resume_rejected_exhausts_without_executing() {
        let executor = MockExecutor::new().with_output("[!] CocoaPods sync needed");
        let orch = orchestrator(executor.clone(), 3, preview_prefs(&[]));
        let suspended = orch
            .build_with_retry(EnvironmentTag::Xcode, "build MyApp")
            .await;

        let outcome = orch
            .resume_after_approval(
                EnvironmentTag::Xcode,
                "build MyApp",
                suspended,
                ResumeDecision::Rejected,
            )
            .await;

        match outcome.status {
            RetryStatus::Exhausted { final_error } => {
                assert!(final_error.unwrap().contains("rejected"));
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
        // Trail preserved, no further executions
        assert_eq!(outcome.trail.len(), 1);
        assert_eq!(executor.calls().len(), 1);
    }

    #[tokio::test]
    async fn resume_of_non_suspended_outcome_is_identity() {
        let executor = MockExecutor::new().with_output("** BUILD SUCCEEDED **");
        let orch = orchestrator(executor.clone(), 3, AutomationPrefs::default());
        let success = orch
            .build_with_retry(EnvironmentTag::Xcode, "build MyApp")
            .await;

        let outcome = orch
            .resume_after_approval(
                EnvironmentTag::Xcode,
                "build MyApp",
                success,
                ResumeDecision::Approved,
            )
            .await;
        assert!(outcome.is_success());
        assert_eq!(executor.calls().len(), 1);
    }

    #[tokio::test]
    async fn cancellation_stops_before_next_attempt() {
        let executor = MockExecutor::new();
        let mut config = fast_config(5);
        let cancel = config.cancel.clone();
        cancel.cancel();
        let orch = RetryOrchestrator::new(executor.clone(), config, AutomationPrefs::default());

        let outcome = orch
            .build_with_retry(EnvironmentTag::Shell, "make")
            .await;

        match outcome.status {
            RetryStatus::Exhausted { final_error } => {
                assert!(final_error.unwrap().contains("Cancelled"));
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
        assert!(outcome.trail.is_empty());
        assert!(executor.calls().is_empty());
    }

    #[tokio::test]
    async fn vision_fallback_feeds_the_loop() {
        use daisy_exec::MockVision;

        // Build produces no text; the vision channel reads the error off
        // the screen and its classification drives remediation.
        let executor = MockExecutor::new()
            .with_output("")
            .with_output("") // pod install
            .with_output("** BUILD SUCCEEDED **");
        let orch = orchestrator(executor.clone(), 3, AutomationPrefs::default())
            .with_vision(MockVision::with_description("No such module 'Alamofire'"));

        let outcome = orch
            .build_with_retry(EnvironmentTag::Xcode, "build MyApp")
            .await;

        assert_eq!(outcome.status, RetryStatus::Success { attempts: 2 });
        assert_eq!(outcome.trail[0].remediation.as_deref(), Some("pod install"));
        assert_eq!(executor.calls()[1].action, "pod install");
    }

    #[tokio::test]
    async fn trail_serializes_for_audit() {
        let executor = MockExecutor::new()
            .with_output("[!] CocoaPods sync needed")
            .with_output("")
            .with_output("** BUILD SUCCEEDED **");
        let orch = orchestrator(executor, 3, AutomationPrefs::default());

        let outcome = orch
            .build_with_retry(EnvironmentTag::Xcode, "build MyApp")
            .await;
        let json = serde_json::to_string_pretty(&outcome).unwrap();
        assert!(json.contains("pod install"));
        assert!(json.contains("\"attempt\": 1"));

        let roundtrip: RetryOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(roundtrip.trail.len(), outcome.trail.len());
    }
}
