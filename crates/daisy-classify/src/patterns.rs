//! Static error-pattern tables, one per environment
//!
//! Tables are ordered: specific patterns precede generic ones, and the
//! orchestrator applies the first match's remediation. Matching is
//! case-insensitive containment, never full-text parsing.

use daisy_core::{EnvironmentTag, ErrorCategory};
use regex::Regex;
use tracing::debug;

/// How a pattern matches against output text
#[derive(Debug, Clone, Copy)]
pub enum Matcher {
    /// Case-insensitive substring containment
    Substring(&'static str),
    /// Case-insensitive regex containment
    Regex(&'static str),
}

impl Matcher {
    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Self::Substring(needle) => text
                .to_lowercase()
                .contains(needle.to_lowercase().as_str()),
            Self::Regex(pattern) => match Regex::new(&format!("(?i){}", pattern)) {
                Ok(re) => re.is_match(text),
                Err(e) => {
                    debug!("Skipping unparseable pattern {:?}: {}", pattern, e);
                    false
                }
            },
        }
    }
}

/// One registered error pattern
#[derive(Debug, Clone, Copy)]
pub struct ErrorPattern {
    pub matcher: Matcher,
    pub category: ErrorCategory,
    /// Human-readable description of the failure
    pub message: &'static str,
    /// Command to run before the next retry
    pub remediation: &'static str,
}

const XCODE_PATTERNS: &[ErrorPattern] = &[
    ErrorPattern {
        matcher: Matcher::Substring("cocoapods"),
        category: ErrorCategory::MissingDependency,
        message: "CocoaPods dependencies are missing or out of date",
        remediation: "pod install",
    },
    ErrorPattern {
        matcher: Matcher::Substring("no such module"),
        category: ErrorCategory::ImportError,
        message: "A Swift module could not be found, usually an uninstalled pod",
        remediation: "pod install",
    },
    ErrorPattern {
        matcher: Matcher::Regex("could not find included file '[^']*' in search paths"),
        category: ErrorCategory::MissingDependency,
        message: "An included file is missing from the search paths",
        remediation: "pod install",
    },
    ErrorPattern {
        matcher: Matcher::Substring("requires a development team"),
        category: ErrorCategory::SigningError,
        message: "Code signing requires a development team",
        remediation: "xcodebuild -allowProvisioningUpdates build",
    },
    ErrorPattern {
        matcher: Matcher::Substring("signing for"),
        category: ErrorCategory::SigningError,
        message: "Code signing configuration is incomplete",
        remediation: "xcodebuild -allowProvisioningUpdates build",
    },
    // Generic catch-all, kept last so specific fixes win
    ErrorPattern {
        matcher: Matcher::Regex(r"\berror:"),
        category: ErrorCategory::BuildError,
        message: "Compilation failed",
        remediation: "xcodebuild clean build",
    },
];

const ANDROID_PATTERNS: &[ErrorPattern] = &[
    ErrorPattern {
        matcher: Matcher::Substring("could not resolve"),
        category: ErrorCategory::MissingDependency,
        message: "Gradle could not resolve a dependency",
        remediation: "./gradlew --refresh-dependencies",
    },
    ErrorPattern {
        matcher: Matcher::Substring("sdk location not found"),
        category: ErrorCategory::SdkError,
        message: "Android SDK location is not configured",
        remediation: "sdkmanager --licenses",
    },
    ErrorPattern {
        matcher: Matcher::Substring("unresolved reference"),
        category: ErrorCategory::ImportError,
        message: "Kotlin sources reference a missing symbol or dependency",
        remediation: "./gradlew clean assembleDebug",
    },
    ErrorPattern {
        matcher: Matcher::Substring("execution failed for task"),
        category: ErrorCategory::BuildError,
        message: "A Gradle task failed",
        remediation: "./gradlew clean",
    },
];

const SHELL_PATTERNS: &[ErrorPattern] = &[
    ErrorPattern {
        matcher: Matcher::Substring("modulenotfounderror"),
        category: ErrorCategory::MissingDependency,
        message: "A Python module is not installed",
        remediation: "pip install -r requirements.txt",
    },
    ErrorPattern {
        matcher: Matcher::Regex("no module named '?[A-Za-z0-9_.]+'?"),
        category: ErrorCategory::ImportError,
        message: "A Python import could not be resolved",
        remediation: "pip install -r requirements.txt",
    },
    ErrorPattern {
        matcher: Matcher::Substring("cannot find module"),
        category: ErrorCategory::MissingDependency,
        message: "A Node module is not installed",
        remediation: "npm install",
    },
    ErrorPattern {
        matcher: Matcher::Substring("npm err!"),
        category: ErrorCategory::MissingDependency,
        message: "npm reported an error, usually missing packages",
        remediation: "npm install",
    },
    ErrorPattern {
        matcher: Matcher::Substring("command not found"),
        category: ErrorCategory::MissingDependency,
        message: "A required tool is not installed",
        remediation: "brew bundle",
    },
];

const XCODE_SUCCESS: Matcher = Matcher::Substring("build succeeded");
const ANDROID_SUCCESS: Matcher = Matcher::Substring("build successful");
const SHELL_SUCCESS: Matcher =
    Matcher::Regex("build succeeded|build successful|tests? passed|exit code: 0");

/// Ordered error patterns registered for an environment
pub fn patterns_for(environment: EnvironmentTag) -> &'static [ErrorPattern] {
    match environment {
        EnvironmentTag::Xcode => XCODE_PATTERNS,
        EnvironmentTag::AndroidStudio => ANDROID_PATTERNS,
        EnvironmentTag::Shell => SHELL_PATTERNS,
    }
}

/// The environment's single success marker
pub fn success_marker(environment: EnvironmentTag) -> Matcher {
    match environment {
        EnvironmentTag::Xcode => XCODE_SUCCESS,
        EnvironmentTag::AndroidStudio => ANDROID_SUCCESS,
        EnvironmentTag::Shell => SHELL_SUCCESS,
    }
}
