//! Mock provider implementation for testing.

use super::{ImagePayload, ProviderError, VisionProvider};
use async_trait::async_trait;

enum MockBehavior {
    Reply(String),
    NotConfigured,
    RateLimited,
}

/// Mock vision provider returning a canned reply or a canned failure.
pub struct MockVisionProvider {
    behavior: MockBehavior,
}

impl MockVisionProvider {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            behavior: MockBehavior::Reply(reply.into()),
        }
    }

    /// A provider that behaves like a missing API key.
    pub fn disabled() -> Self {
        Self {
            behavior: MockBehavior::NotConfigured,
        }
    }

    /// A provider that behaves like an upstream 429.
    pub fn rate_limited() -> Self {
        Self {
            behavior: MockBehavior::RateLimited,
        }
    }
}

#[async_trait]
impl VisionProvider for MockVisionProvider {
    async fn describe(
        &self,
        _prompt: &str,
        _image: &ImagePayload,
    ) -> Result<String, ProviderError> {
        match &self.behavior {
            MockBehavior::Reply(reply) => Ok(reply.clone()),
            MockBehavior::NotConfigured => Err(ProviderError::NotConfigured(
                "Mock vision provider not enabled".to_string(),
            )),
            MockBehavior::RateLimited => Err(ProviderError::RateLimited),
        }
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        match &self.behavior {
            MockBehavior::Reply(_) => Ok(()),
            MockBehavior::NotConfigured => Err(ProviderError::NotConfigured(
                "Mock vision provider not enabled".to_string(),
            )),
            MockBehavior::RateLimited => Err(ProviderError::RateLimited),
        }
    }
}
