//! Application configuration management
//!
//! Configuration is layered: built-in defaults, then an optional TOML file,
//! then environment variables (a `.env` file is honoured). Everything is
//! resolved once at startup so that a bad value fails before any request is
//! sent.

use crate::core::constants::defaults;
use crate::models::openai::{ChatCompletionRequest, ChatMessage, StreamOptions};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Environment variable holding the API credential
pub const API_KEY_VAR: &str = "DASHSCOPE_API_KEY";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ConversationConfig {
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub user_prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestConfig {
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_include_usage")]
    pub include_usage: bool,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            temperature: None,
            max_tokens: None,
            request_timeout: default_request_timeout(),
            include_usage: default_include_usage(),
        }
    }
}

fn default_request_timeout() -> u64 {
    defaults::REQUEST_TIMEOUT
}

fn default_include_usage() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub conversation: ConversationConfig,
    #[serde(default)]
    pub request: RequestConfig,
}

/// Resolved application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API key sent as a bearer token
    pub api_key: String,

    /// API base URL (OpenAI-compatible)
    pub base_url: String,

    /// Model name
    pub model: String,

    pub system_prompt: String,
    pub user_prompt: String,

    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,

    /// Request timeout in seconds
    pub request_timeout: u64,

    /// Ask the server for a trailing usage chunk
    pub include_usage: bool,

    /// Logging level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: defaults::BASE_URL.to_string(),
            model: defaults::MODEL.to_string(),
            system_prompt: defaults::SYSTEM_PROMPT.to_string(),
            user_prompt: defaults::USER_PROMPT.to_string(),
            temperature: None,
            max_tokens: None,
            request_timeout: defaults::REQUEST_TIMEOUT,
            include_usage: true,
            log_level: defaults::LOG_LEVEL.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Values missing from the file keep their defaults. The environment is
    /// not consulted.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    fn from_toml_str(content: &str) -> Result<Self> {
        let file: TomlConfig =
            toml::from_str(content).context("Failed to parse TOML configuration")?;

        let mut config = Config::default();
        if let Some(api_key) = file.api_key {
            config.api_key = api_key;
        }
        if let Some(base_url) = file.base_url {
            config.base_url = base_url;
        }
        if let Some(model) = file.model {
            config.model = model;
        }
        if let Some(log_level) = file.log_level {
            config.log_level = log_level;
        }
        if let Some(system_prompt) = file.conversation.system_prompt {
            config.system_prompt = system_prompt;
        }
        if let Some(user_prompt) = file.conversation.user_prompt {
            config.user_prompt = user_prompt;
        }
        config.temperature = file.request.temperature;
        config.max_tokens = file.request.max_tokens;
        config.request_timeout = file.request.request_timeout;
        config.include_usage = file.request.include_usage;

        Ok(config)
    }

    /// Load configuration from the config file and the environment
    ///
    /// Reads `.env` if present, then `CONFIG_PATH` (an error if it does not
    /// exist) or `config.toml` in the working directory (skipped if absent),
    /// then overlays environment variables.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let lookup = |key: &str| std::env::var(key).ok();
        let mut config = Self::from_config_source(&lookup, Path::new(defaults::CONFIG_FILE))?;

        config.apply_env(lookup)?;
        Ok(config)
    }

    /// Load the file layer
    ///
    /// An explicit `CONFIG_PATH` must exist. Otherwise `default_path` is
    /// read if present, and built-in defaults are used if it is not.
    fn from_config_source<F>(lookup: F, default_path: &Path) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        match lookup("CONFIG_PATH").filter(|p| !p.trim().is_empty()) {
            Some(path) => Self::from_file(path),
            None if default_path.exists() => Self::from_file(default_path),
            None => Ok(Config::default()),
        }
    }

    /// Overlay values from an environment lookup
    ///
    /// Empty values are ignored.
    ///
    /// # Errors
    ///
    /// Returns error if a numeric or boolean variable cannot be parsed.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(api_key) = get(API_KEY_VAR) {
            self.api_key = api_key;
        }
        if let Some(base_url) = get("DASHSCOPE_BASE_URL") {
            self.base_url = base_url;
        }
        if let Some(model) = get("DASHSCOPE_MODEL") {
            self.model = model;
        }
        if let Some(system_prompt) = get("SYSTEM_PROMPT") {
            self.system_prompt = system_prompt;
        }
        if let Some(user_prompt) = get("USER_PROMPT") {
            self.user_prompt = user_prompt;
        }
        if let Some(temperature) = get("TEMPERATURE") {
            self.temperature = Some(
                temperature
                    .trim()
                    .parse::<f32>()
                    .with_context(|| format!("Invalid TEMPERATURE value: {}", temperature))?,
            );
        }
        if let Some(max_tokens) = get("MAX_TOKENS") {
            self.max_tokens = Some(
                max_tokens
                    .trim()
                    .parse::<u32>()
                    .with_context(|| format!("Invalid MAX_TOKENS value: {}", max_tokens))?,
            );
        }
        if let Some(timeout) = get("REQUEST_TIMEOUT") {
            self.request_timeout = timeout
                .trim()
                .parse::<u64>()
                .with_context(|| format!("Invalid REQUEST_TIMEOUT value: {}", timeout))?;
        }
        if let Some(include_usage) = get("INCLUDE_USAGE") {
            self.include_usage = parse_bool(&include_usage)
                .with_context(|| format!("Invalid INCLUDE_USAGE value: {}", include_usage))?;
        }
        if let Some(log_level) = get("LOG_LEVEL") {
            self.log_level = log_level;
        }

        Ok(())
    }

    /// Replace the user prompt, e.g. with one given on the command line
    pub fn with_user_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.user_prompt = prompt.into();
        self
    }

    /// Check that an API key is present
    ///
    /// No format check is made; the server is the authority on the key.
    pub fn validate_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Full URL of the chat completions endpoint
    pub fn endpoint_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    /// Build the streaming request for the configured conversation
    pub fn chat_request(&self) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(self.system_prompt.clone()),
                ChatMessage::user(self.user_prompt.clone()),
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: true,
            stream_options: self.include_usage.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got '{}'", other),
    }
}
