//! OpenAI-compatible provider implementation (DashScope compatible mode)

use crate::core::provider::{LineStream, Provider, ProviderError};
use crate::models::openai::ChatCompletionRequest;
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::Client;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio_stream::wrappers::LinesStream;
use tracing::debug;

/// Provider for any endpoint speaking the OpenAI chat completions protocol
pub struct OpenAICompatibleProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAICompatibleProvider {
    /// Create a new provider
    ///
    /// # Arguments
    ///
    /// * `api_key` - API key sent as a bearer token
    /// * `base_url` - API base URL, e.g. `https://dashscope.aliyuncs.com/compatible-mode/v1`
    /// * `timeout` - Connect timeout and maximum idle gap between reads, in
    ///   seconds. A reply that keeps streaming is never cut off.
    pub fn new(api_key: String, base_url: String, timeout: u64) -> Result<Self, ProviderError> {
        let timeout = Duration::from_secs(timeout);
        let client = Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unexpected(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Classify API errors and provide helpful messages
    fn classify_error(error_detail: &str) -> String {
        let error_lower = error_detail.to_lowercase();

        if error_lower.contains("invalid_api_key")
            || error_lower.contains("incorrect api key")
            || error_lower.contains("unauthorized")
        {
            return "Invalid API key. Please check your DASHSCOPE_API_KEY configuration."
                .to_string();
        }

        if error_lower.contains("arrearage") || error_lower.contains("billing") {
            return "Account is in arrears or has a billing issue. Please check your account status."
                .to_string();
        }

        if error_lower.contains("rate_limit")
            || error_lower.contains("throttling")
            || error_lower.contains("quota")
        {
            return "Rate limit or quota exceeded. Please wait and try again.".to_string();
        }

        if error_lower.contains("model_not_found")
            || (error_lower.contains("model")
                && (error_lower.contains("not found") || error_lower.contains("does not exist")))
        {
            return "Model not found. Please check your DASHSCOPE_MODEL configuration.".to_string();
        }

        if error_lower.contains("data_inspection_failed") {
            return "Input or output was rejected by content inspection.".to_string();
        }

        error_detail.to_string()
    }

    /// Send the request and check the response status
    async fn send_stream_request(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = self.completions_url();
        debug!("POST {} (model: {})", url, request.model);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::Unexpected(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            debug!("Request failed with status {}: {}", status, error_text);
            let classified_error = Self::classify_error(&error_text);

            return Err(match status.as_u16() {
                401 => ProviderError::Authentication(classified_error),
                429 => ProviderError::RateLimit(classified_error),
                400 => ProviderError::BadRequest(classified_error),
                _ => ProviderError::ApiError {
                    status: status.as_u16(),
                    message: classified_error,
                },
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Provider for OpenAICompatibleProvider {
    async fn create_chat_completion_stream(
        &self,
        mut request: ChatCompletionRequest,
    ) -> Result<LineStream, ProviderError> {
        request.stream = true;

        let response = self.send_stream_request(&request).await?;

        let byte_stream = response.bytes_stream().map_err(std::io::Error::other);
        let reader = tokio_util::io::StreamReader::new(byte_stream);
        let lines = tokio::io::BufReader::new(reader).lines();

        let stream = LinesStream::new(lines).map(|result: Result<String, std::io::Error>| {
            result.map_err(|e| ProviderError::Stream(e.to_string()))
        });

        Ok(Box::pin(stream))
    }

    fn provider_name(&self) -> &str {
        if self.base_url.contains("dashscope.aliyuncs.com") {
            "DashScope"
        } else {
            "OpenAI-compatible"
        }
    }
}
