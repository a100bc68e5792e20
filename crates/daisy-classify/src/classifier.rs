//! Pure log classification
//!
//! `classify` is a pure function of the output text and the environment
//! tag: no I/O, no hidden state. Success detection runs independently of
//! error matching, so a log containing both a success marker and error
//! text still reports success; the orchestrator treats the flag as
//! authoritative. That policy mirrors the observed system behavior and is
//! pinned by tests rather than "fixed".

use crate::patterns::{patterns_for, success_marker};
use daisy_core::{ClassificationResult, EnvironmentTag, MatchedError};

/// Classify one attempt's captured output
///
/// All patterns registered for the environment are tested; every match is
/// collected in table order. Absence of any match is a valid outcome
/// ("failed but unclassified"), not an error.
pub fn classify(output: &str, environment: EnvironmentTag) -> ClassificationResult {
    let success = success_marker(environment).is_match(output);

    let matches: Vec<MatchedError> = patterns_for(environment)
        .iter()
        .filter(|pattern| pattern.matcher.is_match(output))
        .map(|pattern| MatchedError {
            category: pattern.category,
            message: pattern.message.to_string(),
            remediation: pattern.remediation.to_string(),
        })
        .collect();

    let summary = if success {
        format!("Build succeeded ({})", environment)
    } else if !matches.is_empty() {
        let suggestions: Vec<&str> = matches.iter().map(|m| m.remediation.as_str()).collect();
        format!(
            "Detected {} issue(s); suggested fixes: {}",
            matches.len(),
            suggestions.join("; ")
        )
    } else {
        "Build failed but no specific errors detected".to_string()
    };

    ClassificationResult {
        success,
        matches,
        summary,
    }
}
