//! Constants for message roles, SSE framing, and built-in defaults
//!
//! This module defines the string constants used to build requests and to
//! decode the streamed response body.

/// Message role constants
pub mod role {
    /// System role identifier
    pub const SYSTEM: &str = "system";

    /// User role identifier
    pub const USER: &str = "user";
}

/// Server-sent event framing constants
pub mod sse {
    /// Field prefix carrying an event payload
    pub const DATA: &str = "data:";

    /// Prefix of a comment line (keep-alive)
    pub const COMMENT: &str = ":";

    /// Payload terminating an OpenAI-compatible stream
    pub const DONE: &str = "[DONE]";
}

/// Built-in defaults used when neither the config file nor the environment
/// supplies a value
pub mod defaults {
    /// DashScope OpenAI-compatible endpoint
    pub const BASE_URL: &str = "https://dashscope.aliyuncs.com/compatible-mode/v1";

    /// Default model
    pub const MODEL: &str = "qwen3-max";

    /// Default system prompt
    pub const SYSTEM_PROMPT: &str = "You are a helpful assistant.";

    /// Default user prompt ("Who are you?")
    pub const USER_PROMPT: &str = "你是谁？";

    /// Request timeout in seconds
    pub const REQUEST_TIMEOUT: u64 = 90;

    /// Logging level; quiet so that stderr stays clean next to the output
    pub const LOG_LEVEL: &str = "warn";

    /// Config file looked up in the working directory
    pub const CONFIG_FILE: &str = "config.toml";
}
