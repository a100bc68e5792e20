//! # daisy-core
//!
//! Core types for the Daisy build-retry orchestrator.
//!
//! Daisy drives a build action against a target environment (Xcode,
//! Android Studio, or a plain shell), classifies failures against static
//! pattern tables, applies remediations through an approval gate, and
//! retries up to a bound. Everything the orchestrator returns is built
//! from the types in this crate.

mod config;
mod error;
mod types;

pub use config::{AutomationPrefs, AutomationSection, DaisyConfig, RetrySection};
pub use error::{DaisyError, Result};
pub use types::*;
