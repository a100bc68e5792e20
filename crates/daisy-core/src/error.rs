//! Unified error types for Daisy

use thiserror::Error;

/// Unified error type for all Daisy operations
#[derive(Error, Debug)]
pub enum DaisyError {
    // Executor capability errors
    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Environment unreachable: {0}")]
    EnvironmentUnreachable(String),

    // Optional capability errors (screenshot/vision)
    #[error("Capability error: {0}")]
    Capability(String),

    // Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    // Resume/pending-state errors
    #[error("No pending remediation: {0}")]
    NoPendingRemediation(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

/// Result type alias using DaisyError
pub type Result<T> = std::result::Result<T, DaisyError>;
