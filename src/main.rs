//! DashScope streaming chat client
//!
//! Sends one chat completion request to an OpenAI-compatible endpoint
//! (DashScope compatible mode by default) and prints the reply to stdout as
//! it streams in.

mod core;
mod models;
mod stream;

use crate::core::config::{API_KEY_VAR, Config};
use crate::core::logging::init_logging;
use crate::core::provider::Provider;
use crate::core::providers::OpenAICompatibleProvider;
use crate::models::openai::ChatCompletionRequest;
use crate::stream::{StreamSummary, decode_chunks, render_stream};
use anyhow::{Context, Result, bail};
use std::io::Write;
use tracing::info;

/// What the command line asks for
#[derive(Debug, PartialEq)]
enum Command {
    Help,
    Run { prompt: Option<String> },
}

fn parse_args<I>(args: I) -> Result<Command>
where
    I: IntoIterator<Item = String>,
{
    let mut prompt = None;
    let mut options_done = false;

    for arg in args {
        match arg.as_str() {
            "--" if !options_done => options_done = true,
            _ if options_done => {
                if prompt.is_some() {
                    bail!("Only one prompt may be given (quote it)");
                }
                prompt = Some(arg);
            }
            "-h" | "--help" => return Ok(Command::Help),
            flag if flag.starts_with('-') && flag.len() > 1 => {
                bail!("Unknown option: {} (see --help)", flag)
            }
            _ if prompt.is_some() => bail!("Only one prompt may be given (quote it)"),
            _ => prompt = Some(arg),
        }
    }

    Ok(Command::Run { prompt })
}

#[tokio::main]
async fn main() {
    let command = match parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    let prompt = match command {
        Command::Help => {
            print_help();
            return;
        }
        Command::Run { prompt } => prompt,
    };

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => match prompt {
            Some(prompt) => cfg.with_user_prompt(prompt),
            None => cfg,
        },
        Err(e) => {
            eprintln!("Configuration Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.log_level);

    if !config.validate_api_key() {
        eprintln!("Configuration Error: {} is not set", API_KEY_VAR);
        std::process::exit(1);
    }

    let provider = match OpenAICompatibleProvider::new(
        config.api_key.clone(),
        config.base_url.clone(),
        config.request_timeout,
    ) {
        Ok(provider) => provider,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    info!(
        "Using provider: {} ({}), model: {}",
        provider.provider_name(),
        config.endpoint_url(),
        config.model
    );

    let mut stdout = std::io::stdout().lock();
    match run(&provider, config.chat_request(), &mut stdout).await {
        Ok(summary) => log_summary(&summary),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Send `request` through `provider` and render the reply into `out`
async fn run<W: Write>(
    provider: &dyn Provider,
    request: ChatCompletionRequest,
    out: &mut W,
) -> Result<StreamSummary> {
    let lines = provider
        .create_chat_completion_stream(request)
        .await
        .with_context(|| format!("{} request failed", provider.provider_name()))?;

    let summary = render_stream(decode_chunks(lines), out).await?;
    Ok(summary)
}

fn log_summary(summary: &StreamSummary) {
    info!(
        "Stream finished: {} fragments, {} characters, finish_reason: {}",
        summary.fragments,
        summary.characters,
        summary.finish_reason.as_deref().unwrap_or("none")
    );
    if let Some(usage) = &summary.usage {
        info!(
            "Usage: {} prompt + {} completion = {} tokens",
            usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
        );
    }
}

/// Print help message
fn print_help() {
    println!("DashScope streaming chat client v0.1.0");
    println!();
    println!("Usage: dashscope-stream [OPTIONS] [--] [PROMPT]");
    println!();
    println!("Sends PROMPT (default: \"你是谁？\") and prints the reply as it streams.");
    println!();
    println!("Options:");
    println!("  -h, --help    Display this help message");
    println!("  --            End of options; use before a PROMPT starting with '-'");
    println!();
    println!("Environment variables (also read from .env):");
    println!("  DASHSCOPE_API_KEY - Your API key (required)");
    println!("  DASHSCOPE_BASE_URL - API base URL (default: https://dashscope.aliyuncs.com/compatible-mode/v1)");
    println!("  DASHSCOPE_MODEL - Model name (default: qwen3-max)");
    println!("  SYSTEM_PROMPT - System prompt (default: You are a helpful assistant.)");
    println!("  USER_PROMPT - User prompt, overridden by PROMPT");
    println!("  TEMPERATURE - Sampling temperature (default: server default)");
    println!("  MAX_TOKENS - Maximum tokens to generate (default: server default)");
    println!("  REQUEST_TIMEOUT - Connect timeout and maximum idle gap while streaming, in seconds (default: 90)");
    println!("  INCLUDE_USAGE - Request token usage and log it at info level (default: true)");
    println!("  LOG_LEVEL - Logging level, written to stderr (default: warn)");
    println!("  CONFIG_PATH - TOML config file (default: config.toml, if present)");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provider::{LineStream, ProviderError};
    use async_trait::async_trait;
    use futures::stream;
    use std::sync::Mutex;

    /// Replays canned body lines and records the request it was given
    struct MockProvider {
        lines: Vec<&'static str>,
        seen: Mutex<Option<ChatCompletionRequest>>,
    }

    impl MockProvider {
        fn new(lines: Vec<&'static str>) -> Self {
            Self {
                lines,
                seen: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        async fn create_chat_completion_stream(
            &self,
            request: ChatCompletionRequest,
        ) -> Result<LineStream, ProviderError> {
            *self.seen.lock().unwrap() = Some(request);
            let lines: Vec<Result<String, ProviderError>> =
                self.lines.iter().map(|l| Ok(l.to_string())).collect();
            Ok(Box::pin(stream::iter(lines)))
        }

        fn provider_name(&self) -> &str {
            "Mock"
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl Provider for FailingProvider {
        async fn create_chat_completion_stream(
            &self,
            _request: ChatCompletionRequest,
        ) -> Result<LineStream, ProviderError> {
            Err(ProviderError::Authentication("Invalid API key".to_string()))
        }

        fn provider_name(&self) -> &str {
            "Failing"
        }
    }

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args() {
        assert_eq!(parse_args(args(&[])).unwrap(), Command::Run { prompt: None });
        assert_eq!(parse_args(args(&["--help"])).unwrap(), Command::Help);
        assert_eq!(
            parse_args(args(&["hello there"])).unwrap(),
            Command::Run {
                prompt: Some("hello there".to_string())
            }
        );
        assert!(parse_args(args(&["--verbose"])).is_err());
        assert!(parse_args(args(&["one", "two"])).is_err());
    }

    #[test]
    fn test_parse_args_double_dash_ends_options() {
        assert_eq!(
            parse_args(args(&["--", "-5°C 穿什么？"])).unwrap(),
            Command::Run {
                prompt: Some("-5°C 穿什么？".to_string())
            }
        );
        assert_eq!(
            parse_args(args(&["--", "--help"])).unwrap(),
            Command::Run {
                prompt: Some("--help".to_string())
            }
        );
        assert_eq!(
            parse_args(args(&["--", "--"])).unwrap(),
            Command::Run {
                prompt: Some("--".to_string())
            }
        );
        assert!(parse_args(args(&["--", "one", "two"])).is_err());
        assert!(parse_args(args(&["-5°C"])).is_err());
    }

    #[tokio::test]
    async fn test_run_prints_deltas_then_newline() {
        let provider = MockProvider::new(vec![
            r#"data: {"id":"chatcmpl-1","choices":[{"index":0,"delta":{"role":"assistant","content":""}}]}"#,
            "",
            r#"data: {"id":"chatcmpl-1","choices":[{"index":0,"delta":{"content":"我是"}}]}"#,
            "",
            r#"data: {"id":"chatcmpl-1","choices":[{"index":0,"delta":{"content":"Qwen"}}]}"#,
            "",
            r#"data: {"id":"chatcmpl-1","choices":[{"index":0,"delta":{"content":""},"finish_reason":"stop"}]}"#,
            "",
            r#"data: {"id":"chatcmpl-1","choices":[],"usage":{"prompt_tokens":22,"completion_tokens":3,"total_tokens":25}}"#,
            "",
            "data: [DONE]",
        ]);
        let config = Config::default();
        let mut out = Vec::new();

        let summary = run(&provider, config.chat_request(), &mut out).await.unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "我是Qwen\n");
        assert_eq!(summary.finish_reason.as_deref(), Some("stop"));
        assert_eq!(summary.usage.map(|u| u.total_tokens), Some(25));

        let seen = provider.seen.lock().unwrap().take().unwrap();
        assert_eq!(seen.model, "qwen3-max");
        assert_eq!(seen.messages.len(), 2);
        assert_eq!(seen.messages[1].content, "你是谁？");
    }

    #[tokio::test]
    async fn test_run_request_failure_writes_nothing() {
        let mut out = Vec::new();

        let err = run(&FailingProvider, Config::default().chat_request(), &mut out)
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("Authentication failed"));
        assert!(out.is_empty());
    }
}
