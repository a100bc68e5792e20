//! Approval gate for remediation actions
//!
//! Pure decision function: no side effects, no waiting. When the gate
//! returns `AwaitingApproval` the orchestrator suspends and surfaces the
//! pending action to its caller; supplying the approval later happens
//! through the resume entry point.

use daisy_core::AutomationMode;

/// Gate decision for one remediation action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalDecision {
    /// Apply the remediation immediately
    Approved,
    /// Suspend and ask the caller
    AwaitingApproval,
}

/// Decide whether a remediation may run without asking.
///
/// Autonomous mode always approves. Preview mode approves iff the action
/// contains any allowlisted pattern as a substring; the allowlist is
/// matched case-sensitively, exactly as configured.
pub fn evaluate(
    action: &str,
    mode: AutomationMode,
    auto_approve: &[String],
) -> ApprovalDecision {
    match mode {
        AutomationMode::Autonomous => ApprovalDecision::Approved,
        AutomationMode::Preview => {
            if auto_approve.iter().any(|pattern| action.contains(pattern)) {
                ApprovalDecision::Approved
            } else {
                ApprovalDecision::AwaitingApproval
            }
        }
    }
}
