//! Provider abstraction for chat completion backends
//!
//! A provider sends one streaming request and hands back the raw lines of
//! the response body. Decoding those lines is left to `crate::stream`.

use crate::models::openai::ChatCompletionRequest;
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;
use thiserror::Error;

/// Error types for provider operations
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Lines of a streamed response body
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// Trait for chat completion providers
#[async_trait]
pub trait Provider: Send + Sync {
    /// Send a streaming chat completion request
    async fn create_chat_completion_stream(
        &self,
        request: ChatCompletionRequest,
    ) -> Result<LineStream, ProviderError>;

    /// Get the provider name
    fn provider_name(&self) -> &str;
}
