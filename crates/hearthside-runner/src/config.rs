//! Configuration for the LLM-backed reasoning provider.
//!
//! The backend endpoint, model, and deadline can be assembled
//! programmatically (the engine builds them from its YAML config) or
//! pulled from environment variables with [`ReasonerConfig::from_env`].
//! The API key always comes from the environment; it never lives in a
//! config file.

use std::time::Duration;

use crate::error::RunnerError;

/// Default deadline for one reasoning call, in milliseconds.
const DEFAULT_DEADLINE_MS: u64 = 7_000;

/// Default templates directory.
const DEFAULT_TEMPLATES_DIR: &str = "templates";

/// Supported LLM backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// `OpenAI`-compatible chat completions API (also `DeepSeek`, Ollama).
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
}

impl BackendType {
    /// Parse a backend name as written in config files or env vars.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Config`] for an unknown name.
    pub fn parse(name: &str) -> Result<Self, RunnerError> {
        match name.to_lowercase().as_str() {
            "openai" | "deepseek" | "ollama" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(RunnerError::Config(format!("unknown backend type: {other}"))),
        }
    }
}

/// Configuration for a single LLM backend.
#[derive(Debug, Clone)]
pub struct LlmBackendConfig {
    /// The backend type.
    pub backend_type: BackendType,
    /// Base API URL (e.g. `https://api.openai.com/v1`).
    pub api_url: String,
    /// API key for authentication.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
}

/// Complete reasoner configuration.
#[derive(Debug, Clone)]
pub struct ReasonerConfig {
    /// The backend to call.
    pub backend: LlmBackendConfig,
    /// Maximum time allowed for one reasoning call.
    pub deadline: Duration,
    /// Path to the prompt templates directory.
    pub templates_dir: String,
}

impl ReasonerConfig {
    /// Load configuration from environment variables.
    ///
    /// Required: `HEARTHSIDE_LLM_BACKEND`, `HEARTHSIDE_LLM_API_URL`,
    /// `HEARTHSIDE_LLM_API_KEY`, `HEARTHSIDE_LLM_MODEL`.
    /// Optional: `HEARTHSIDE_LLM_DEADLINE_MS` (default 7000),
    /// `HEARTHSIDE_TEMPLATES_DIR` (default `templates`).
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Config`] for missing or unparsable values.
    pub fn from_env() -> Result<Self, RunnerError> {
        let backend = LlmBackendConfig {
            backend_type: BackendType::parse(&env_var("HEARTHSIDE_LLM_BACKEND")?)?,
            api_url: env_var("HEARTHSIDE_LLM_API_URL")?,
            api_key: env_var("HEARTHSIDE_LLM_API_KEY")?,
            model: env_var("HEARTHSIDE_LLM_MODEL")?,
        };

        let deadline_ms: u64 = std::env::var("HEARTHSIDE_LLM_DEADLINE_MS")
            .unwrap_or_else(|_| DEFAULT_DEADLINE_MS.to_string())
            .parse()
            .map_err(|e| RunnerError::Config(format!("invalid HEARTHSIDE_LLM_DEADLINE_MS: {e}")))?;

        let templates_dir = std::env::var("HEARTHSIDE_TEMPLATES_DIR")
            .unwrap_or_else(|_| DEFAULT_TEMPLATES_DIR.to_owned());

        Ok(Self {
            backend,
            deadline: Duration::from_millis(deadline_ms),
            templates_dir,
        })
    }
}

/// Read a required environment variable.
fn env_var(name: &str) -> Result<String, RunnerError> {
    std::env::var(name).map_err(|e| RunnerError::Config(format!("missing env var {name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_names_parse_case_insensitively() {
        assert_eq!(BackendType::parse("OpenAI").ok(), Some(BackendType::OpenAi));
        assert_eq!(BackendType::parse("ollama").ok(), Some(BackendType::OpenAi));
        assert_eq!(
            BackendType::parse("Anthropic").ok(),
            Some(BackendType::Anthropic)
        );
        assert_eq!(
            BackendType::parse("claude").ok(),
            Some(BackendType::Anthropic)
        );
        assert!(BackendType::parse("mystery").is_err());
    }
}
