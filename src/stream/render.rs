//! Rendering of decoded chunks to an output writer

use crate::core::provider::ProviderError;
use crate::models::openai::{ChatCompletionChunk, Usage};
use crate::stream::decoder::extract_delta_text;
use futures::{Stream, StreamExt};
use std::io::Write;
use thiserror::Error;
use tracing::trace;

/// Error types for rendering a stream
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

/// What was rendered from one stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamSummary {
    /// Number of non-empty fragments written
    pub fragments: usize,
    /// Number of characters written, excluding the final newline
    pub characters: usize,
    pub finish_reason: Option<String>,
    pub usage: Option<Usage>,
}

/// Write every text fragment of `chunks` to `writer` as it arrives
///
/// The writer is flushed after each fragment. Exactly one newline is
/// written once the stream ends, including when it ends with an error.
pub async fn render_stream<S, W>(chunks: S, writer: &mut W) -> Result<StreamSummary, RenderError>
where
    S: Stream<Item = Result<ChatCompletionChunk, ProviderError>>,
    W: Write,
{
    let mut summary = StreamSummary::default();
    let result = write_fragments(chunks, writer, &mut summary).await;

    writer.write_all(b"\n")?;
    writer.flush()?;

    result.map(|()| summary)
}

async fn write_fragments<S, W>(
    chunks: S,
    writer: &mut W,
    summary: &mut StreamSummary,
) -> Result<(), RenderError>
where
    S: Stream<Item = Result<ChatCompletionChunk, ProviderError>>,
    W: Write,
{
    tokio::pin!(chunks);

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;

        if let Some(text) = extract_delta_text(&chunk) {
            if !text.is_empty() {
                writer.write_all(text.as_bytes())?;
                writer.flush()?;
                summary.fragments += 1;
                summary.characters += text.chars().count();
            }
        }

        if let Some(reason) = chunk.choices.first().and_then(|c| c.finish_reason.clone()) {
            trace!("finish_reason: {}", reason);
            summary.finish_reason = Some(reason);
        }

        if let Some(usage) = chunk.usage {
            summary.usage = Some(usage);
        }
    }

    Ok(())
}
