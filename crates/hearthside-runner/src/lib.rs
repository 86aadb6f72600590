//! LLM-backed reasoning for the Hearthside village simulation.
//!
//! Implements the core's `ReasoningProvider` trait over real LLM
//! backends: prompt templates rendered with `minijinja`, HTTP calls via
//! `reqwest` against OpenAI-compatible or Anthropic endpoints, a
//! per-call deadline, and tolerant JSON parsing of whatever comes back.
//!
//! The simulation treats this whole crate as untrusted for structure:
//! anything that fails here surfaces as a typed provider error and the
//! workflow substitutes deterministic fallback content.

pub mod config;
pub mod error;
pub mod llm;
pub mod parse;
pub mod prompt;
pub mod provider;

pub use config::{BackendType, LlmBackendConfig, ReasonerConfig};
pub use error::RunnerError;
pub use llm::LlmBackend;
pub use prompt::{PromptEngine, PromptKind, RenderedPrompt};
pub use provider::LlmReasoningProvider;
