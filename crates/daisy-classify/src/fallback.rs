//! Vision fallback chain
//!
//! When text classification yields a failure with no matches, an optional
//! vision capability can read the error off the screen instead: capture
//! the environment's window, describe the image, and classify the
//! description with the same pattern tables. Any capability failure is
//! non-fatal and degrades to the primary text result.

use crate::classifier::classify;
use daisy_core::{ClassificationResult, EnvironmentTag, Result};
use daisy_exec::VisionCapability;
use tracing::{debug, warn};

const DESCRIBE_PROMPT: &str = "Read any visible build error or success banner from this window";

/// Text classifier composed with an optional vision fallback
#[derive(Default)]
pub struct FallbackClassifier {
    vision: Option<Box<dyn VisionCapability>>,
}

impl FallbackClassifier {
    /// Text-only classification, no fallback
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a vision capability as the secondary channel
    pub fn with_vision(vision: impl VisionCapability + 'static) -> Self {
        Self {
            vision: Some(Box::new(vision)),
        }
    }

    /// Classify output text, consulting the vision channel only when the
    /// text result is an unclassified failure
    pub async fn classify(
        &self,
        output: &str,
        environment: EnvironmentTag,
    ) -> ClassificationResult {
        let primary = classify(output, environment);
        if !primary.is_unclassified_failure() {
            return primary;
        }

        let Some(vision) = &self.vision else {
            return primary;
        };

        match self.describe_window(vision.as_ref(), environment).await {
            Ok(description) => {
                debug!("Vision described window: {} chars", description.len());
                let secondary = classify(&description, environment);
                if secondary.is_unclassified_failure() {
                    primary
                } else {
                    secondary
                }
            }
            Err(e) => {
                warn!("Vision fallback unavailable (non-fatal): {}", e);
                primary
            }
        }
    }

    async fn describe_window(
        &self,
        vision: &dyn VisionCapability,
        environment: EnvironmentTag,
    ) -> Result<String> {
        let window_hint = match environment {
            EnvironmentTag::Xcode => "Xcode",
            EnvironmentTag::AndroidStudio => "Android Studio",
            EnvironmentTag::Shell => "Terminal",
        };
        let image = vision.capture(window_hint).await?;
        vision.describe_image(&image, DESCRIBE_PROMPT).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use daisy_exec::MockVision;

    #[tokio::test]
    async fn text_match_skips_vision() {
        let chain = FallbackClassifier::with_vision(MockVision::with_description(
            "BUILD SUCCEEDED",
        ));
        let result = chain
            .classify("[!] CocoaPods sync needed", EnvironmentTag::Xcode)
            .await;

        // The text classifier already matched, vision must not override
        assert!(!result.success);
        assert_eq!(result.matches[0].remediation, "pod install");
    }

    #[tokio::test]
    async fn vision_classifies_when_text_is_silent() {
        let chain = FallbackClassifier::with_vision(MockVision::with_description(
            "dialog says: No such module 'Alamofire'",
        ));
        let result = chain.classify("", EnvironmentTag::Xcode).await;

        assert!(!result.success);
        assert_eq!(result.matches[0].remediation, "pod install");
    }

    #[tokio::test]
    async fn vision_failure_degrades_to_primary() {
        let chain = FallbackClassifier::with_vision(MockVision::failing());
        let result = chain.classify("unrecognized noise", EnvironmentTag::Xcode).await;

        assert!(result.is_unclassified_failure());
    }

    #[tokio::test]
    async fn no_vision_is_plain_text_classification() {
        let chain = FallbackClassifier::new();
        let result = chain.classify("unrecognized noise", EnvironmentTag::Shell).await;
        assert!(result.is_unclassified_failure());
    }

    #[tokio::test]
    async fn unhelpful_description_keeps_primary() {
        let chain =
            FallbackClassifier::with_vision(MockVision::with_description("a pleasant desktop"));
        let result = chain.classify("mystery failure", EnvironmentTag::Shell).await;
        assert!(result.is_unclassified_failure());
        assert!(result.summary.contains("no specific errors"));
    }
}
