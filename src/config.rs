//! Configuration management for stepwise.
//!
//! Configuration can be set via environment variables (a `.env` file in the
//! working directory is loaded first when present):
//! - `GEMINI_API_KEY` - Required. API key for the Gemini `generateContent` endpoint.
//! - `GEMINI_API_HOST` - Optional. Defaults to `https://generativelanguage.googleapis.com`.
//! - `AGENT_MODEL` - Optional. Model identifier. Defaults to `gemini-2.0-flash-001`.
//! - `WORKSPACE_PATH` - Optional. Directory tools resolve relative paths against. Defaults to current directory.
//! - `MAX_STEPS` - Optional. Maximum model calls per user query. Defaults to `50`.
//! - `MAX_JSON_RETRIES` - Optional. Retries after a malformed model reply. Defaults to `3`.
//! - `MAX_TRANSPORT_RETRIES` - Optional. Retries after a failed model call. Defaults to `2`.
//! - `TEMPERATURE` - Optional. Sampling temperature. Defaults to `0.6`.
//! - `MAX_OUTPUT_TOKENS` - Optional. Defaults to `8192`.
//! - `HISTORY_CHAR_BUDGET` - Optional. Characters of history sent per call, `0` for unbounded. Defaults to `400000`.
//! - `COMMAND_TIMEOUT_SECS` - Optional. Shell command timeout. Defaults to `60`.
//! - `FETCH_TIMEOUT_SECS` - Optional. HTTP fetch tool timeout. Defaults to `10`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::tools::ToolLimits;

pub const DEFAULT_API_HOST: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-001";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Limits applied to the step loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Maximum model calls for a single user query
    pub max_steps: usize,

    /// Retries after a reply that is not valid JSON
    pub json_retries: u32,

    /// Retries after a transport failure of the model call
    pub transport_retries: u32,

    /// Delay before the first retry; doubled on each subsequent one
    pub retry_backoff: Duration,

    /// Characters of history sent per model call (0 = unbounded)
    pub history_char_budget: usize,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_steps: 50,
            json_retries: 3,
            transport_retries: 2,
            retry_backoff: Duration::from_millis(500),
            history_char_budget: 400_000,
        }
    }
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Gemini API key
    pub api_key: String,

    /// Base URL of the Gemini API
    pub api_host: String,

    /// Model identifier
    pub model: String,

    /// Workspace directory for file operations
    pub workspace_path: PathBuf,

    /// Sampling temperature
    pub temperature: f32,

    /// Output token cap per model call
    pub max_output_tokens: u32,

    /// Step loop limits
    pub agent: LoopConfig,

    /// Tool side-effect bounds
    pub tools: ToolLimits,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `GEMINI_API_KEY` is not set, and
    /// `ConfigError::InvalidValue` for any numeric variable that does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()))?;

        let api_host =
            std::env::var("GEMINI_API_HOST").unwrap_or_else(|_| DEFAULT_API_HOST.to_string());

        let model = std::env::var("AGENT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let workspace_path = std::env::var("WORKSPACE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

        let defaults = LoopConfig::default();
        let agent = LoopConfig {
            max_steps: env_or("MAX_STEPS", defaults.max_steps)?,
            json_retries: env_or("MAX_JSON_RETRIES", defaults.json_retries)?,
            transport_retries: env_or("MAX_TRANSPORT_RETRIES", defaults.transport_retries)?,
            retry_backoff: defaults.retry_backoff,
            history_char_budget: env_or("HISTORY_CHAR_BUDGET", defaults.history_char_budget)?,
        };

        let tool_defaults = ToolLimits::default();
        let tools = ToolLimits {
            command_timeout: Duration::from_secs(env_or(
                "COMMAND_TIMEOUT_SECS",
                tool_defaults.command_timeout.as_secs(),
            )?),
            fetch_timeout: Duration::from_secs(env_or(
                "FETCH_TIMEOUT_SECS",
                tool_defaults.fetch_timeout.as_secs(),
            )?),
            ..tool_defaults
        };

        Ok(Self {
            api_key,
            api_host,
            model,
            workspace_path,
            temperature: env_or("TEMPERATURE", 0.6)?,
            max_output_tokens: env_or("MAX_OUTPUT_TOKENS", 8192)?,
            agent,
            tools,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, model: String, workspace_path: PathBuf) -> Self {
        Self {
            api_key,
            api_host: DEFAULT_API_HOST.to_string(),
            model,
            workspace_path,
            temperature: 0.6,
            max_output_tokens: 8192,
            agent: LoopConfig::default(),
            tools: ToolLimits::default(),
        }
    }
}

/// Read and parse an optional variable, falling back to `default` when unset.
fn env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_uses_default_when_unset() {
        let value: usize = env_or("STEPWISE_TEST_UNSET_VARIABLE", 7).unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn env_or_reports_invalid_values() {
        std::env::set_var("STEPWISE_TEST_BAD_NUMBER", "many");
        let err = env_or::<usize>("STEPWISE_TEST_BAD_NUMBER", 1).unwrap_err();
        std::env::remove_var("STEPWISE_TEST_BAD_NUMBER");
        assert!(matches!(err, ConfigError::InvalidValue(ref key, _) if key == "STEPWISE_TEST_BAD_NUMBER"));
    }

    #[test]
    fn new_config_has_loop_defaults() {
        let config = Config::new("key".into(), DEFAULT_MODEL.into(), PathBuf::from("."));
        assert_eq!(config.agent.max_steps, 50);
        assert_eq!(config.agent.json_retries, 3);
        assert_eq!(config.tools.command_timeout, Duration::from_secs(60));
    }
}
