//! The LLM-backed [`ReasoningProvider`] implementation.
//!
//! Each call renders the phase context through the prompt engine, sends
//! it to the configured backend under a `tokio` deadline, and parses the
//! response into the typed draft. Every failure maps onto a typed
//! [`ProviderError`], which the cognitive workflow recovers from with
//! deterministic fallback content; nothing here ever takes a tick down.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use hearthside_core::provider::{ProviderError, ReasoningProvider};
use hearthside_types::{
    ActionContext, ActionDraft, PlanContext, PlanDraft, ReflectionContext, ReflectionDraft,
};

use crate::config::ReasonerConfig;
use crate::error::RunnerError;
use crate::llm::LlmBackend;
use crate::parse;
use crate::prompt::{PromptEngine, PromptKind};

/// Reasoning provider that delegates to an LLM backend.
pub struct LlmReasoningProvider {
    engine: PromptEngine,
    backend: LlmBackend,
    deadline: Duration,
}

impl LlmReasoningProvider {
    /// Build a provider from configuration: loads templates and sets up
    /// the HTTP backend.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::Template`] if the templates directory is
    /// incomplete.
    pub fn from_config(config: &ReasonerConfig) -> Result<Self, RunnerError> {
        Ok(Self {
            engine: PromptEngine::new(&config.templates_dir)?,
            backend: LlmBackend::from_config(&config.backend),
            deadline: config.deadline,
        })
    }

    /// Render, call, and return the raw response for one phase.
    async fn complete(
        &self,
        kind: PromptKind,
        context: &serde_json::Value,
    ) -> Result<String, ProviderError> {
        let prompt = self
            .engine
            .render(kind, context)
            .map_err(to_provider_error)?;

        let started = Instant::now();
        let deadline_ms = u64::try_from(self.deadline.as_millis()).unwrap_or(u64::MAX);
        let raw = match tokio::time::timeout(self.deadline, self.backend.complete(&prompt)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(error)) => {
                warn!(backend = self.backend.name(), %error, "backend call failed");
                return Err(to_provider_error(error));
            }
            Err(_elapsed) => {
                warn!(
                    backend = self.backend.name(),
                    deadline_ms, "backend call exceeded deadline"
                );
                return Err(ProviderError::Timeout { deadline_ms });
            }
        };

        debug!(
            backend = self.backend.name(),
            latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            response_len = raw.len(),
            "backend responded"
        );
        Ok(raw)
    }
}

impl ReasoningProvider for LlmReasoningProvider {
    async fn draft_plan(&mut self, ctx: &PlanContext) -> Result<PlanDraft, ProviderError> {
        let context = serde_json::to_value(ctx)
            .map_err(|e| ProviderError::Malformed(format!("plan context: {e}")))?;
        let raw = self.complete(PromptKind::Plan, &context).await?;
        parse::parse_plan_response(&raw).map_err(to_provider_error)
    }

    async fn realize_action(&mut self, ctx: &ActionContext) -> Result<ActionDraft, ProviderError> {
        let context = serde_json::to_value(ctx)
            .map_err(|e| ProviderError::Malformed(format!("action context: {e}")))?;
        let raw = self.complete(PromptKind::Action, &context).await?;
        parse::parse_action_response(&raw).map_err(to_provider_error)
    }

    async fn compose_reflection(
        &mut self,
        ctx: &ReflectionContext,
    ) -> Result<ReflectionDraft, ProviderError> {
        let context = serde_json::to_value(ctx)
            .map_err(|e| ProviderError::Malformed(format!("reflection context: {e}")))?;
        let raw = self.complete(PromptKind::Reflect, &context).await?;
        parse::parse_reflection_response(&raw).map_err(to_provider_error)
    }
}

/// Map runner errors onto the core's provider error taxonomy.
fn to_provider_error(error: RunnerError) -> ProviderError {
    match error {
        RunnerError::RateLimited => ProviderError::RateLimited,
        RunnerError::Parse(message) => ProviderError::Malformed(message),
        RunnerError::Serde(e) => ProviderError::Malformed(e.to_string()),
        RunnerError::LlmBackend(message)
        | RunnerError::Template(message)
        | RunnerError::Config(message) => ProviderError::Transport(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_mapping_preserves_taxonomy() {
        assert!(matches!(
            to_provider_error(RunnerError::RateLimited),
            ProviderError::RateLimited
        ));
        assert!(matches!(
            to_provider_error(RunnerError::Parse(String::from("bad json"))),
            ProviderError::Malformed(_)
        ));
        assert!(matches!(
            to_provider_error(RunnerError::LlmBackend(String::from("503"))),
            ProviderError::Transport(_)
        ));
        assert!(matches!(
            to_provider_error(RunnerError::Template(String::from("missing"))),
            ProviderError::Transport(_)
        ));
    }
}
