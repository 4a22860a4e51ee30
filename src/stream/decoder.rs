//! SSE line decoding and delta extraction
//!
//! Turns the raw lines of an OpenAI-compatible streaming body into typed
//! chunks, and pulls the newly generated text out of each chunk.

use crate::core::constants::sse;
use crate::core::provider::ProviderError;
use crate::models::openai::ChatCompletionChunk;
use futures::{Stream, StreamExt};
use serde_json::Value;
use std::borrow::Cow;
use std::pin::Pin;
use tracing::{trace, warn};

/// Typed chunks decoded from a line stream
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<ChatCompletionChunk, ProviderError>> + Send>>;

/// Decode SSE lines into chat completion chunks
///
/// Blank lines, comments and fields other than `data` are skipped. The
/// stream ends at `data: [DONE]`, at the end of the body, or after yielding
/// the first error. Payloads that are not valid chunks are logged and
/// skipped.
pub fn decode_chunks<S>(lines: S) -> ChunkStream
where
    S: Stream<Item = Result<String, ProviderError>> + Send + 'static,
{
    let stream = async_stream::stream! {
        tokio::pin!(lines);

        while let Some(line_result) = lines.next().await {
            let line = match line_result {
                Ok(l) => l,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            };

            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with(sse::COMMENT) {
                continue;
            }

            let Some(payload) = trimmed.strip_prefix(sse::DATA) else {
                trace!("Skipping SSE field: {}", trimmed);
                continue;
            };
            let payload = payload.trim_start();

            if payload == sse::DONE {
                break;
            }

            let value: Value = match serde_json::from_str(payload) {
                Ok(v) => v,
                Err(e) => {
                    warn!("Failed to parse chunk: {}, error: {}", payload, e);
                    continue;
                }
            };

            if let Some(error) = value.get("error").filter(|e| e.is_object()) {
                let message = error
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string());
                yield Err(ProviderError::Stream(message));
                break;
            }

            match serde_json::from_value::<ChatCompletionChunk>(value) {
                Ok(chunk) => {
                    yield Ok(chunk);
                }
                Err(e) => {
                    warn!("Unexpected chunk shape: {}, error: {}", payload, e);
                }
            }
        }
    };

    Box::pin(stream)
}

/// Extract the text fragment carried by a chunk
///
/// Only the first choice is considered. A string `delta.content` is
/// returned as is. When the delta is some other non-null value that is not
/// an object (a bare string, number or bool), or its content is some other
/// JSON value, the string form of that value is returned instead.
/// Chunks without text (role announcements, the usage chunk, the final
/// `finish_reason` chunk with null content) yield `None`.
pub fn extract_delta_text(chunk: &ChatCompletionChunk) -> Option<Cow<'_, str>> {
    let delta = chunk.choices.first()?.delta.as_ref()?;

    match delta {
        Value::String(text) => Some(Cow::Borrowed(text.as_str())),
        Value::Object(fields) => match fields.get("content") {
            Some(Value::String(text)) => Some(Cow::Borrowed(text.as_str())),
            None | Some(Value::Null) => None,
            Some(other) => Some(Cow::Owned(other.to_string())),
        },
        Value::Null => None,
        other => Some(Cow::Owned(other.to_string())),
    }
}
