//! # daisy-classify
//!
//! Log classification for the Daisy build-retry orchestrator.
//!
//! Classification is a pure function of the captured output text and the
//! environment tag: every error pattern registered for the environment is
//! tested (all matches are collected, not just the first), and the
//! environment's success marker is tested independently. The optional
//! vision fallback re-classifies a screenshot description when text
//! classification comes up empty.

mod classifier;
mod fallback;
mod patterns;

pub use classifier::classify;
pub use fallback::FallbackClassifier;
pub use patterns::{patterns_for, success_marker, ErrorPattern, Matcher};
