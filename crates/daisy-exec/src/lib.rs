//! # daisy-exec
//!
//! The external capability boundary for Daisy.
//!
//! The orchestrator consumes two narrow capabilities: an [`ActionExecutor`]
//! that runs one build-related action and returns its raw textual output,
//! and an optional [`VisionCapability`] used as a secondary error-detection
//! channel when textual log capture is unavailable. Both are traits so the
//! concrete OS mechanisms (AppleScript, screen capture) stay out of the
//! core control flow and tests can inject mocks.

mod command;
mod vision;

pub use command::{ActionExecutor, ActionOutput, CommandExecutor, ExecutedAction, MockExecutor};
pub use vision::{MockVision, VisionCapability};
