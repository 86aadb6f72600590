//! Error types for the reasoning runner.
//!
//! Everything here is transient from the simulation's point of view: the
//! provider adapter translates these into core `ProviderError`s, and the
//! workflow falls back to deterministic content.

/// Errors that can occur in the LLM runner pipeline.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Failed to load or render a prompt template.
    #[error("template error: {0}")]
    Template(String),

    /// An LLM backend returned an error or was unreachable.
    #[error("LLM backend error: {0}")]
    LlmBackend(String),

    /// The backend refused the call with a rate-limit status.
    #[error("LLM backend rate limited")]
    RateLimited,

    /// The LLM response could not be parsed into the expected draft.
    #[error("response parse error: {0}")]
    Parse(String),

    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// Serialization or deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
