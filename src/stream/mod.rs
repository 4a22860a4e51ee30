//! Streamed response handling
//!
//! Decoding of the SSE body into chunks and rendering of their text.

pub mod decoder;
pub mod render;

pub use decoder::decode_chunks;
pub use render::{StreamSummary, render_stream};
