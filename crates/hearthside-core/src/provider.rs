//! Reasoning provider abstraction and test implementations.
//!
//! The plan, execute, and reflect phases each delegate their generative
//! step to a [`ReasoningProvider`]. The trait abstracts the mechanism: a
//! real LLM backend, a scripted bot, or a test stub. The core treats the
//! provider as untrusted for structure (any call may time out, fail, or
//! return junk) and every call site has a deterministic fallback, so a
//! misbehaving provider degrades content quality without ever stalling a
//! tick.
//!
//! [`ScriptedProvider`] returns trivial canned drafts and is enough to
//! exercise the whole tick cycle end to end without a live backend;
//! [`FailingProvider`] refuses every call, for the degraded-path tests.

use hearthside_types::{
    ActionContext, ActionDraft, MessageDraft, PlanContext, PlanDraft, PlannedStep,
    ReflectionContext, ReflectionDraft, TimeOfDay,
};

/// Errors a reasoning provider call can produce.
///
/// All of these are transient from the simulation's point of view: the
/// workflow recovers locally with fallback content and never surfaces
/// them to the caller as a failure.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The call exceeded its deadline.
    #[error("provider call exceeded {deadline_ms}ms deadline")]
    Timeout {
        /// The deadline that was exceeded, in milliseconds.
        deadline_ms: u64,
    },

    /// The backend was unreachable or returned a transport-level error.
    #[error("provider transport error: {0}")]
    Transport(String),

    /// The backend answered, but the response could not be parsed into
    /// the expected structure.
    #[error("provider returned malformed output: {0}")]
    Malformed(String),

    /// The backend refused the call due to rate limiting.
    #[error("provider rate limited")]
    RateLimited,
}

/// A source of generated plans, actions, and reflections.
///
/// Implementations may block on network I/O; the workflow awaits them at
/// the three provider call boundaries and nowhere else.
#[allow(async_fn_in_trait)]
pub trait ReasoningProvider {
    /// Draft a daily plan from the agent's observation and persona.
    async fn draft_plan(&mut self, ctx: &PlanContext) -> Result<PlanDraft, ProviderError>;

    /// Realize the chosen plan entry (or an idle default) as a concrete
    /// action, optionally with an outgoing message.
    async fn realize_action(&mut self, ctx: &ActionContext) -> Result<ActionDraft, ProviderError>;

    /// Synthesize recent memories into a subjective reflection.
    async fn compose_reflection(
        &mut self,
        ctx: &ReflectionContext,
    ) -> Result<ReflectionDraft, ProviderError>;
}

/// A provider that always succeeds with trivial content.
///
/// Optionally attaches a fixed message to every realized action, which
/// lets tests drive the conversation counter and receiver validation.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    /// Message attached to every realized action, if any.
    pub message: Option<MessageDraft>,
    /// Number of plan calls served.
    pub plan_calls: u64,
    /// Number of action calls served.
    pub action_calls: u64,
    /// Number of reflection calls served.
    pub reflection_calls: u64,
}

impl ScriptedProvider {
    /// A scripted provider that never sends messages.
    pub fn new() -> Self {
        Self::default()
    }

    /// A scripted provider that attaches `message` to every action.
    pub fn with_message(message: MessageDraft) -> Self {
        Self {
            message: Some(message),
            ..Self::default()
        }
    }
}

impl ReasoningProvider for ScriptedProvider {
    async fn draft_plan(&mut self, ctx: &PlanContext) -> Result<PlanDraft, ProviderError> {
        self.plan_calls = self.plan_calls.saturating_add(1);
        Ok(PlanDraft {
            steps: vec![PlannedStep {
                description: format!("Keep to the day's routine around {}", ctx.profile.name),
                priority: 5,
                slot: TimeOfDay::Morning,
            }],
        })
    }

    async fn realize_action(&mut self, ctx: &ActionContext) -> Result<ActionDraft, ProviderError> {
        self.action_calls = self.action_calls.saturating_add(1);
        let description = ctx.chosen_plan.as_ref().map_or_else(
            || String::from("Passed the time quietly"),
            |plan| format!("Got on with it: {}", plan.description),
        );
        Ok(ActionDraft {
            description,
            importance: 4,
            message: self.message.clone(),
            lesson: None,
            concern: None,
        })
    }

    async fn compose_reflection(
        &mut self,
        _ctx: &ReflectionContext,
    ) -> Result<ReflectionDraft, ProviderError> {
        self.reflection_calls = self.reflection_calls.saturating_add(1);
        Ok(ReflectionDraft {
            content: String::from("The day settled into its usual rhythm."),
            importance: 4,
            mood: None,
        })
    }
}

/// A provider that fails every call, for degraded-path tests.
#[derive(Debug, Clone, Default)]
pub struct FailingProvider {
    /// Number of calls refused so far.
    pub calls: u64,
}

impl FailingProvider {
    /// A fresh failing provider.
    pub fn new() -> Self {
        Self::default()
    }

    fn refuse<T>(&mut self) -> Result<T, ProviderError> {
        self.calls = self.calls.saturating_add(1);
        Err(ProviderError::Transport(String::from(
            "reasoning backend unavailable",
        )))
    }
}

impl ReasoningProvider for FailingProvider {
    async fn draft_plan(&mut self, _ctx: &PlanContext) -> Result<PlanDraft, ProviderError> {
        self.refuse()
    }

    async fn realize_action(
        &mut self,
        _ctx: &ActionContext,
    ) -> Result<ActionDraft, ProviderError> {
        self.refuse()
    }

    async fn compose_reflection(
        &mut self,
        _ctx: &ReflectionContext,
    ) -> Result<ReflectionDraft, ProviderError> {
        self.refuse()
    }
}
