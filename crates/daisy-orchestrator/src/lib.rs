//! # daisy-orchestrator
//!
//! The build-retry control loop: execute an action, classify its output,
//! gate the suggested remediation through the approval policy, apply it,
//! and retry up to a bound. Every run terminates in exactly one of three
//! states (success, exhausted, suspended) and always returns the full
//! attempt trail for audit.

mod approval;
mod resume;
mod retry;

pub use approval::{evaluate, ApprovalDecision};
pub use resume::{load_pending, save_pending, PendingState};
pub use retry::{ResumeDecision, RetryConfig, RetryOrchestrator};
