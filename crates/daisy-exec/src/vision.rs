//! Optional screenshot/vision capability
//!
//! Used only as a secondary error-detection channel when textual log
//! capture is unavailable. Failures here degrade to "no additional
//! classification" and never abort the orchestrator.

use async_trait::async_trait;
use daisy_core::{DaisyError, Result};

/// Screenshot capture plus image description
#[async_trait]
pub trait VisionCapability: Send + Sync {
    /// Capture a screenshot of the window matching `window_hint`
    async fn capture(&self, window_hint: &str) -> Result<Vec<u8>>;

    /// Describe an image, guided by a prompt (e.g. "read the build error")
    async fn describe_image(&self, image: &[u8], prompt: &str) -> Result<String>;
}

/// Mock vision capability for testing the fallback chain
#[derive(Debug, Clone, Default)]
pub struct MockVision {
    description: Option<String>,
}

impl MockVision {
    /// Vision that describes every capture with the given text
    pub fn with_description(text: &str) -> Self {
        Self {
            description: Some(text.to_string()),
        }
    }

    /// Vision whose capture always fails
    pub fn failing() -> Self {
        Self { description: None }
    }
}

#[async_trait]
impl VisionCapability for MockVision {
    async fn capture(&self, window_hint: &str) -> Result<Vec<u8>> {
        match &self.description {
            Some(_) => Ok(Vec::new()),
            None => Err(DaisyError::Capability(format!(
                "No window matching {:?}",
                window_hint
            ))),
        }
    }

    async fn describe_image(&self, _image: &[u8], _prompt: &str) -> Result<String> {
        self.description
            .clone()
            .ok_or_else(|| DaisyError::Capability("Describe failed".to_string()))
    }
}
