//! Vision provider abstractions and implementations.
//!
//! Trait-based seam over the external multimodal API so the HTTP layer
//! can be exercised against a mock in tests.

pub mod mock;
pub mod openai;

use async_trait::async_trait;
use thiserror::Error;

/// Error type for provider operations.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Provider returned an empty response")]
    EmptyResponse,
}

/// Raw image bytes plus the MIME type advertised to the provider.
pub struct ImagePayload {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ImagePayload {
    /// Uploads are always sent as `image/jpeg` data URLs regardless of the
    /// container format; vision models accept the mismatch.
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self {
            mime_type: "image/jpeg".to_string(),
            bytes,
        }
    }
}

/// A provider that can produce a free-text description of an image.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Send the prompt and image, return the model's text reply.
    async fn describe(&self, prompt: &str, image: &ImagePayload)
        -> Result<String, ProviderError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ProviderError>;
}
