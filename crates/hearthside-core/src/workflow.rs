//! The cognitive workflow: observe, plan, execute, reflect.
//!
//! One call to [`run_cycle`] runs a single selected agent through the
//! four phases of one tick. Phase order is fixed: Observe always runs
//! first, Execute always runs before Reflect; Plan and Reflect are
//! conditionally elided by the cadence policy but never reordered.
//!
//! Failure semantics:
//!
//! - Provider errors (timeout, transport, malformed output) are recovered
//!   locally with deterministic fallback content. They degrade output
//!   quality; they never abort the tick.
//! - Invariant rejections from the store (unknown conversation receiver,
//!   illegal plan transition) discard the offending write and substitute
//!   a no-op for that sub-step.
//! - Only fatal store errors escape, because continuing without a
//!   durability layer would silently lose history.
//!
//! Record-count guarantees per cycle: exactly one observation memory,
//! exactly one action memory, at most one plan mirror and one reflection
//! memory, and the conversation counter moves only when a message was
//! actually persisted.

use tracing::{debug, warn};

use hearthside_agents::{AgentRuntime, PlanningPolicy};
use hearthside_store::{ConversationQuery, MemoryQuery, MemoryStore, StoreError};
use hearthside_types::{
    ActionContext, ActionDraft, AgentId, AgentProfile, Conversation, DailyPlan, Memory,
    MemoryKind, Observation, PlanContext, PlanStatus, PlannedStep, ReflectionContext,
    ReflectionDraft, SocialObservation, TimeOfDay,
};

use crate::provider::{ProviderError, ReasoningProvider};

/// Energy an agent spends on one executed action.
const ACTION_ENERGY_COST: u8 = 1;

/// How many incoming conversations an observe phase reads at most.
const OBSERVE_CONVERSATION_LIMIT: u32 = 20;

/// How many of other agents' action memories an observe phase reads.
const OBSERVE_SOCIAL_LIMIT: u32 = 20;

/// How many of the agent's own memories feed the observation.
const OBSERVE_OWN_MEMORY_LIMIT: u32 = 7;

/// How many memories feed a reflection.
const REFLECTION_MEMORY_LIMIT: u32 = 10;

/// Cap on plan steps adopted from one provider draft.
const MAX_PLAN_STEPS: usize = 4;

/// Importance of the conversation mirror memory.
const CONVERSATION_MEMORY_IMPORTANCE: u8 = 4;

/// Errors that abort a cognitive cycle. Only fatal store failures do.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The durability layer failed mid-cycle.
    #[error("store failure during cognitive cycle: {0}")]
    Store(#[from] StoreError),
}

/// One roster member as seen by an observing agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// The agent's id.
    pub agent_id: AgentId,
    /// The agent's display name.
    pub name: String,
}

/// The scheduler-provided snapshot a cycle runs against.
///
/// The workflow never reads global simulation state directly; everything
/// it may see arrives here, by value, from the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickContext {
    /// The tick being executed.
    pub tick: u64,
    /// Simulated day, starting at 1.
    pub day: u64,
    /// Simulated hour of day, `0..=23`.
    pub hour: u8,
    /// Slot of the day.
    pub slot: TimeOfDay,
    /// Cumulative conversation count before this tick.
    pub conversation_count: u64,
    /// Every agent in the roster, id order.
    pub roster: Vec<RosterEntry>,
}

/// What happened during one cognitive cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// The agent that acted.
    pub agent_id: AgentId,
    /// How many plan steps were adopted, or `None` if the plan phase was
    /// elided this tick.
    pub planned_steps: Option<usize>,
    /// Description of the executed action.
    pub action_description: String,
    /// Whether a conversation record was persisted this tick.
    pub conversation_sent: bool,
    /// Whether the reflect phase ran.
    pub reflected: bool,
    /// How many provider failures were recovered with fallback content.
    pub fallbacks: u8,
}

/// Run one agent through observe, plan, execute, and reflect.
///
/// # Errors
///
/// Returns [`WorkflowError::Store`] only for fatal store failures;
/// everything else is handled inside the cycle.
pub async fn run_cycle<P: ReasoningProvider>(
    runtime: &mut AgentRuntime,
    store: &MemoryStore,
    provider: &mut P,
    policy: &impl PlanningPolicy,
    ctx: &TickContext,
) -> Result<TickReport, WorkflowError> {
    let agent_id = runtime.agent_id().clone();
    let mut fallbacks: u8 = 0;

    // --- Observe ---
    let observation = observe_phase(runtime, store, ctx).await?;
    runtime.record_observation(ctx.tick, &observation).await?;

    // --- Plan (conditional) ---
    let has_pending = !store.pending_plans(&agent_id).await?.is_empty();
    let planned_steps = if runtime.needs_plan(policy, ctx.tick, has_pending) {
        let steps = plan_phase(runtime, provider, &observation, &mut fallbacks).await;
        let adopted = runtime.adopt_plan(ctx.tick, &steps).await?;
        Some(adopted.len())
    } else {
        None
    };

    // --- Execute ---
    let (action, conversation_sent) =
        execute_phase(runtime, store, provider, ctx, &observation, &mut fallbacks).await?;

    // --- Reflect (conditional) ---
    let has_pending = !store.pending_plans(&agent_id).await?.is_empty();
    let reflected = if runtime.needs_reflection(policy, ctx.tick, has_pending) {
        reflect_phase(runtime, store, provider, ctx, &mut fallbacks).await?;
        true
    } else {
        false
    };

    debug!(
        tick = ctx.tick,
        agent = %agent_id,
        planned = ?planned_steps,
        conversation_sent,
        reflected,
        fallbacks,
        "cognitive cycle finished"
    );

    Ok(TickReport {
        agent_id,
        planned_steps,
        action_description: action.description,
        conversation_sent,
        reflected,
        fallbacks,
    })
}

/// Observe: gather what changed in the village since this agent last
/// acted, producing an [`Observation`] with no side effect beyond the
/// single observation memory the caller appends.
async fn observe_phase(
    runtime: &AgentRuntime,
    store: &MemoryStore,
    ctx: &TickContext,
) -> Result<Observation, WorkflowError> {
    let agent_id = runtime.agent_id();
    let since = runtime.last_active_tick();

    let incoming = store
        .conversations(
            &ConversationQuery::visible_to(agent_id)
                .excluding_sender(agent_id)
                .since(since)
                .limit(OBSERVE_CONVERSATION_LIMIT),
        )
        .await?;

    let others_actions = store
        .memories(&MemoryQuery {
            exclude_agent: Some(agent_id.clone()),
            kind: Some(MemoryKind::Action),
            since_tick: Some(since),
            limit: Some(OBSERVE_SOCIAL_LIMIT),
            ..MemoryQuery::default()
        })
        .await?;

    let social = ctx
        .roster
        .iter()
        .filter(|entry| entry.agent_id != *agent_id)
        .filter_map(|entry| {
            let latest = others_actions
                .iter()
                .find(|m| m.agent_id == entry.agent_id)?;
            let last_message = incoming
                .iter()
                .find(|c| c.from_agent == entry.agent_id)
                .map(|c| c.message.clone());
            Some(SocialObservation {
                agent_id: entry.agent_id.clone(),
                agent_name: entry.name.clone(),
                summary: latest.content.clone(),
                last_message,
            })
        })
        .collect();

    let recent_memories = store
        .memories(&MemoryQuery::for_agent(agent_id).limit(OBSERVE_OWN_MEMORY_LIMIT))
        .await?;

    Ok(Observation {
        agent_id: agent_id.clone(),
        environment: hearthside_types::EnvironmentSummary {
            tick: ctx.tick,
            day: ctx.day,
            hour: ctx.hour,
            slot: ctx.slot,
            roster_size: ctx.roster.len(),
            conversation_count: ctx.conversation_count,
        },
        social,
        incoming,
        recent_memories,
    })
}

/// Plan: ask the provider for a daily plan, falling back to the
/// deterministic default so the tick never stalls.
async fn plan_phase<P: ReasoningProvider>(
    runtime: &AgentRuntime,
    provider: &mut P,
    observation: &Observation,
    fallbacks: &mut u8,
) -> Vec<PlannedStep> {
    let profile = runtime.profile().as_ref().clone();
    let ctx = PlanContext {
        profile,
        observation: observation.clone(),
    };
    match provider.draft_plan(&ctx).await {
        Ok(draft) => {
            let mut steps = draft.steps;
            steps.truncate(MAX_PLAN_STEPS);
            steps
        }
        Err(error) => {
            warn_fallback(runtime.agent_id(), "plan", &error, fallbacks);
            fallback_plan(runtime.profile())
        }
    }
}

/// Execute: realize the highest-priority pending plan (or an idle
/// default), persist the optional message, complete the plan, and record
/// the action. Returns the realized draft and whether a conversation was
/// actually persisted.
async fn execute_phase<P: ReasoningProvider>(
    runtime: &mut AgentRuntime,
    store: &MemoryStore,
    provider: &mut P,
    ctx: &TickContext,
    observation: &Observation,
    fallbacks: &mut u8,
) -> Result<(ActionDraft, bool), WorkflowError> {
    let agent_id = runtime.agent_id().clone();
    let pending = store.pending_plans(&agent_id).await?;
    let chosen = pending.first().cloned();

    let action_ctx = ActionContext {
        profile: runtime.profile().as_ref().clone(),
        observation: observation.clone(),
        chosen_plan: chosen.clone(),
        energy: runtime.energy(),
        emotion: runtime.emotion(),
    };
    let draft = match provider.realize_action(&action_ctx).await {
        Ok(draft) => draft,
        Err(error) => {
            warn_fallback(&agent_id, "action", &error, fallbacks);
            fallback_action(runtime.profile(), chosen.as_ref())
        }
    };

    // Persist the outgoing message first so the conversation and its
    // mirror land before the action memory in append order.
    let conversation_sent =
        persist_message(store, &agent_id, &draft, ctx.tick).await?;

    if let Some(plan) = &chosen {
        match store.update_plan_status(plan.id, PlanStatus::Completed).await {
            Ok(()) => {}
            Err(error) if !error.is_fatal() => {
                warn!(
                    tick = ctx.tick,
                    agent = %agent_id,
                    plan = %plan.id,
                    %error,
                    "plan completion rejected, treating as no-op"
                );
            }
            Err(error) => return Err(error.into()),
        }
    }

    runtime
        .record_action(ctx.tick, &draft, ACTION_ENERGY_COST)
        .await?;

    Ok((draft, conversation_sent))
}

/// Persist an action's outgoing message, if any.
///
/// A rejected receiver discards the message without touching anything
/// else; the conversation counter only moves for persisted records.
async fn persist_message(
    store: &MemoryStore,
    agent_id: &AgentId,
    draft: &ActionDraft,
    tick: u64,
) -> Result<bool, WorkflowError> {
    let Some(message) = &draft.message else {
        return Ok(false);
    };

    let conversation = Conversation::new(
        agent_id.clone(),
        message.to_agent.clone(),
        message.kind,
        message.text.clone(),
        tick,
    );
    match store.append_conversation(&conversation).await {
        Ok(_) => {
            let audience = message
                .to_agent
                .as_ref()
                .map_or_else(|| String::from("the group"), ToString::to_string);
            let mirror = Memory::new(
                agent_id.clone(),
                MemoryKind::Conversation,
                format!("Said to {audience}: {text}", text = message.text),
                CONVERSATION_MEMORY_IMPORTANCE,
                tick,
            );
            store.append_memory(&mirror).await?;
            Ok(true)
        }
        Err(error) if !error.is_fatal() => {
            warn!(
                tick,
                agent = %agent_id,
                %error,
                "conversation rejected, dropping message"
            );
            Ok(false)
        }
        Err(error) => Err(error.into()),
    }
}

/// Reflect: synthesize recent memories into a subjective takeaway.
async fn reflect_phase<P: ReasoningProvider>(
    runtime: &mut AgentRuntime,
    store: &MemoryStore,
    provider: &mut P,
    ctx: &TickContext,
    fallbacks: &mut u8,
) -> Result<(), WorkflowError> {
    let agent_id = runtime.agent_id().clone();
    let recent_memories = store
        .memories(&MemoryQuery::for_agent(&agent_id).limit(REFLECTION_MEMORY_LIMIT))
        .await?;

    let reflection_ctx = ReflectionContext {
        profile: runtime.profile().as_ref().clone(),
        recent_memories,
        energy: runtime.energy(),
        emotion: runtime.emotion(),
    };
    let draft = match provider.compose_reflection(&reflection_ctx).await {
        Ok(draft) => draft,
        Err(error) => {
            warn_fallback(&agent_id, "reflection", &error, fallbacks);
            fallback_reflection()
        }
    };

    runtime.record_reflection(ctx.tick, &draft).await?;
    Ok(())
}

fn warn_fallback(agent_id: &AgentId, phase: &str, error: &ProviderError, fallbacks: &mut u8) {
    *fallbacks = fallbacks.saturating_add(1);
    warn!(agent = %agent_id, phase, %error, "provider failed, using fallback content");
}

// ---------------------------------------------------------------------------
// Deterministic fallbacks
// ---------------------------------------------------------------------------
//
// Each fallback is a pure function of the profile and phase inputs, so a
// run against a dead provider is fully reproducible.

/// Lowest-priority generic plan used when the provider cannot draft one.
fn fallback_plan(profile: &AgentProfile) -> Vec<PlannedStep> {
    let focus = profile
        .concerns
        .first()
        .map_or("the household", String::as_str);
    vec![PlannedStep {
        description: format!("Keep up the usual routine and keep an eye on {focus}"),
        priority: 1,
        slot: TimeOfDay::Morning,
    }]
}

/// Low-importance action used when the provider cannot realize one.
fn fallback_action(profile: &AgentProfile, plan: Option<&DailyPlan>) -> ActionDraft {
    let description = plan.map_or_else(
        || format!("{} passed the time without anything of note", profile.name),
        |p| format!("Got through it without fuss: {}", p.description),
    );
    ActionDraft {
        description,
        importance: 2,
        message: None,
        lesson: None,
        concern: None,
    }
}

/// Low-importance reflection used when the provider cannot compose one.
fn fallback_reflection() -> ReflectionDraft {
    ReflectionDraft {
        content: String::from("A quiet stretch; nothing stood out worth dwelling on."),
        importance: 2,
        mood: None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use hearthside_agents::CadencePolicy;
    use hearthside_types::{
        AgentProfile, CaregiverRole, ConversationKind, MessageDraft,
    };

    use crate::provider::{FailingProvider, ScriptedProvider};

    use super::*;

    fn profile(id: &str, connections: &[&str]) -> AgentProfile {
        AgentProfile {
            id: AgentId::from(id),
            name: String::from(id),
            age: 28,
            role: CaregiverRole::YoungMother,
            traits: Vec::new(),
            concerns: vec![String::from("the baby's sleep")],
            digital_habits: hearthside_types::DigitalHabits::default(),
            language_style: hearthside_types::LanguageStyle::default(),
            social_connections: connections.iter().map(|c| AgentId::from(*c)).collect(),
            active_hours: Vec::new(),
            response_probability: 0.7,
            initiative: 0.5,
        }
    }

    async fn setup(ids: &[&str]) -> (MemoryStore, Vec<AgentRuntime>, TickContext) {
        let store = MemoryStore::in_memory().await.unwrap();
        let mut runtimes = Vec::new();
        let mut roster = Vec::new();
        for id in ids {
            let p = profile(id, &[]);
            store.register_agent(&p).await.unwrap();
            roster.push(RosterEntry {
                agent_id: p.id.clone(),
                name: p.name.clone(),
            });
            runtimes.push(AgentRuntime::new(Arc::new(p), store.clone()));
        }
        let ctx = TickContext {
            tick: 0,
            day: 1,
            hour: 9,
            slot: TimeOfDay::Morning,
            conversation_count: 0,
            roster,
        };
        (store, runtimes, ctx)
    }

    #[tokio::test]
    async fn cycle_appends_one_observation_and_one_action() {
        let (store, mut runtimes, ctx) = setup(&["amei"]).await;
        let mut provider = ScriptedProvider::new();
        let policy = CadencePolicy::default();

        let report = run_cycle(&mut runtimes[0], &store, &mut provider, &policy, &ctx)
            .await
            .unwrap();

        let amei = AgentId::from("amei");
        assert_eq!(
            store.count_memories(Some(&amei), Some(MemoryKind::Observation)).await.unwrap(),
            1
        );
        assert_eq!(
            store.count_memories(Some(&amei), Some(MemoryKind::Action)).await.unwrap(),
            1
        );
        assert!(!report.conversation_sent);
        assert_eq!(report.fallbacks, 0);
    }

    #[tokio::test]
    async fn first_cycle_plans_and_completes_the_top_step() {
        let (store, mut runtimes, ctx) = setup(&["amei"]).await;
        let mut provider = ScriptedProvider::new();
        let policy = CadencePolicy::default();

        let report = run_cycle(&mut runtimes[0], &store, &mut provider, &policy, &ctx)
            .await
            .unwrap();
        assert_eq!(report.planned_steps, Some(1));

        // The adopted step was executed and completed in the same tick.
        let amei = AgentId::from("amei");
        assert!(store.pending_plans(&amei).await.unwrap().is_empty());
        assert!(report.action_description.contains("Got on with it"));
    }

    #[tokio::test]
    async fn broadcast_message_is_persisted_and_mirrored() {
        let (store, mut runtimes, ctx) = setup(&["amei", "lian"]).await;
        let mut provider = ScriptedProvider::with_message(MessageDraft {
            to_agent: None,
            kind: ConversationKind::Chat,
            text: String::from("anyone else up at this hour?"),
        });
        let policy = CadencePolicy::default();

        let report = run_cycle(&mut runtimes[0], &store, &mut provider, &policy, &ctx)
            .await
            .unwrap();
        assert!(report.conversation_sent);

        let amei = AgentId::from("amei");
        let visible = store
            .conversations(&ConversationQuery::default())
            .await
            .unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(
            store
                .count_memories(Some(&amei), Some(MemoryKind::Conversation))
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn unknown_receiver_drops_message_but_keeps_action() {
        let (store, mut runtimes, ctx) = setup(&["amei"]).await;
        let mut provider = ScriptedProvider::with_message(MessageDraft {
            to_agent: Some(AgentId::from("stranger")),
            kind: ConversationKind::Chat,
            text: String::from("are you there?"),
        });
        let policy = CadencePolicy::default();

        let report = run_cycle(&mut runtimes[0], &store, &mut provider, &policy, &ctx)
            .await
            .unwrap();
        assert!(!report.conversation_sent);

        let amei = AgentId::from("amei");
        assert_eq!(
            store.count_memories(Some(&amei), Some(MemoryKind::Action)).await.unwrap(),
            1
        );
        let conversations = store
            .conversations(&ConversationQuery::default())
            .await
            .unwrap();
        assert!(conversations.is_empty());
    }

    #[tokio::test]
    async fn failing_provider_degrades_but_never_aborts() {
        let (store, mut runtimes, ctx) = setup(&["amei"]).await;
        let mut provider = FailingProvider::new();
        let policy = CadencePolicy::default();

        let report = run_cycle(&mut runtimes[0], &store, &mut provider, &policy, &ctx)
            .await
            .unwrap();

        // Plan fell back, action fell back; both still wrote records.
        assert!(report.fallbacks >= 2);
        let amei = AgentId::from("amei");
        assert_eq!(
            store.count_memories(Some(&amei), Some(MemoryKind::Action)).await.unwrap(),
            1
        );
        assert_eq!(
            store.count_memories(Some(&amei), Some(MemoryKind::Plan)).await.unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn observation_sees_broadcasts_from_others() {
        let (store, mut runtimes, ctx) = setup(&["amei", "lian"]).await;

        // lian broadcasts before amei's cycle.
        store
            .append_conversation(&Conversation::new(
                AgentId::from("lian"),
                None,
                ConversationKind::Share,
                "found a good teething trick",
                0,
            ))
            .await
            .unwrap();
        store
            .append_memory(&Memory::new(
                AgentId::from("lian"),
                MemoryKind::Action,
                "shared a teething trick",
                5,
                0,
            ))
            .await
            .unwrap();

        let observation = observe_phase(&runtimes[0], &store, &ctx).await.unwrap();
        assert_eq!(observation.incoming.len(), 1);
        assert_eq!(observation.social.len(), 1);
        assert_eq!(observation.social[0].agent_name, "lian");

        // Still exactly one observation memory after recording it.
        runtimes[0].record_observation(0, &observation).await.unwrap();
        assert_eq!(
            store
                .count_memories(Some(&AgentId::from("amei")), Some(MemoryKind::Observation))
                .await
                .unwrap(),
            1
        );
    }

    #[test]
    fn fallbacks_are_deterministic() {
        let p = profile("amei", &[]);
        let plan_a = fallback_plan(&p);
        let plan_b = fallback_plan(&p);
        assert_eq!(plan_a, plan_b);
        assert_eq!(plan_a[0].priority, 1);
        assert!(plan_a[0].description.contains("the baby's sleep"));

        let action = fallback_action(&p, None);
        assert_eq!(action.importance, 2);
        assert!(action.message.is_none());

        let reflection = fallback_reflection();
        assert_eq!(reflection.importance, 2);
        assert!(reflection.mood.is_none());
    }
}
