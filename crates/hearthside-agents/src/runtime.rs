//! Agent runtime: one live agent's mutable state plus its memory handle.
//!
//! The runtime owns everything about an agent that changes during a run:
//! energy, mood, when it last acted, planned, and reflected. Mutations
//! happen only through the phase-boundary recorders
//! ([`record_observation`], [`adopt_plan`], [`record_action`],
//! [`record_reflection`]), each of which pairs the state change with its
//! Memory append in one call, so the state and the memory log cannot
//! drift apart and the per-tick record counts stay deterministic.
//!
//! The runtime is mutated only while its agent is the selected actor;
//! the scheduler reads it (energy, last-active tick) for selection.
//!
//! [`record_observation`]: AgentRuntime::record_observation
//! [`adopt_plan`]: AgentRuntime::adopt_plan
//! [`record_action`]: AgentRuntime::record_action
//! [`record_reflection`]: AgentRuntime::record_reflection

use std::sync::Arc;

use serde::Serialize;

use hearthside_store::{MemoryStore, StoreError};
use hearthside_types::{
    ActionDraft, AgentId, AgentProfile, DailyPlan, EmotionalState, Memory, MemoryId, MemoryKind,
    Observation, PlanId, PlannedStep, ReflectionDraft,
};

use crate::policy::{PlanningPolicy, RuntimeView};

/// Energy floor; decay never drops an agent below this.
pub const ENERGY_MIN: u8 = 1;

/// Energy ceiling.
pub const ENERGY_MAX: u8 = 10;

/// Energy every agent starts the run with.
pub const ENERGY_START: u8 = 7;

/// Importance assigned to observation memories.
const OBSERVATION_IMPORTANCE: u8 = 3;

/// Importance assigned to learning memories (from the original system).
const LEARNING_IMPORTANCE: u8 = 6;

/// Importance assigned to concern memories (from the original system).
const CONCERN_IMPORTANCE: u8 = 8;

/// Read-only snapshot of a runtime, for status queries and callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentSnapshot {
    /// The agent's id.
    pub agent_id: AgentId,
    /// The agent's display name.
    pub name: String,
    /// Current energy, `1..=10`.
    pub energy: u8,
    /// Current mood.
    pub emotion: EmotionalState,
    /// Tick the agent last executed an action on.
    pub last_active_tick: u64,
}

/// One live agent: immutable profile, mutable state, store handle.
#[derive(Debug, Clone)]
pub struct AgentRuntime {
    profile: Arc<AgentProfile>,
    store: MemoryStore,
    energy: u8,
    emotion: EmotionalState,
    last_active_tick: u64,
    last_plan_tick: Option<u64>,
    last_reflection_tick: Option<u64>,
    current_plan: Option<PlanId>,
}

impl AgentRuntime {
    /// Create a fresh runtime at starting energy and a calm mood.
    pub fn new(profile: Arc<AgentProfile>, store: MemoryStore) -> Self {
        Self {
            profile,
            store,
            energy: ENERGY_START,
            emotion: EmotionalState::default(),
            last_active_tick: 0,
            last_plan_tick: None,
            last_reflection_tick: None,
            current_plan: None,
        }
    }

    /// The agent's immutable profile.
    pub fn profile(&self) -> &Arc<AgentProfile> {
        &self.profile
    }

    /// The agent's id.
    pub fn agent_id(&self) -> &AgentId {
        &self.profile.id
    }

    /// Current energy, `1..=10`.
    pub const fn energy(&self) -> u8 {
        self.energy
    }

    /// Current mood.
    pub const fn emotion(&self) -> EmotionalState {
        self.emotion
    }

    /// Tick the agent last executed an action on.
    pub const fn last_active_tick(&self) -> u64 {
        self.last_active_tick
    }

    /// The plan entry adopted most recently, if any.
    pub const fn current_plan(&self) -> Option<PlanId> {
        self.current_plan
    }

    /// Snapshot for status queries.
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            agent_id: self.profile.id.clone(),
            name: self.profile.name.clone(),
            energy: self.energy,
            emotion: self.emotion,
            last_active_tick: self.last_active_tick,
        }
    }

    /// The policy-visible view of this runtime at `tick`.
    pub const fn view(&self, tick: u64, has_pending_plan: bool) -> RuntimeView {
        RuntimeView {
            tick,
            energy: self.energy,
            has_pending_plan,
            ticks_since_plan: elapsed_since(tick, self.last_plan_tick),
            ticks_since_reflection: elapsed_since(tick, self.last_reflection_tick),
        }
    }

    /// Whether the plan phase should run this tick.
    pub fn needs_plan(
        &self,
        policy: &impl PlanningPolicy,
        tick: u64,
        has_pending_plan: bool,
    ) -> bool {
        policy.should_plan(&self.view(tick, has_pending_plan))
    }

    /// Whether the reflect phase should run this tick.
    pub fn needs_reflection(
        &self,
        policy: &impl PlanningPolicy,
        tick: u64,
        has_pending_plan: bool,
    ) -> bool {
        policy.should_reflect(&self.view(tick, has_pending_plan))
    }

    // -----------------------------------------------------------------------
    // Phase-boundary recorders
    // -----------------------------------------------------------------------

    /// Record the observe phase: append exactly one observation memory.
    ///
    /// Observing changes no runtime state.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on append failure (fatal).
    pub async fn record_observation(
        &self,
        tick: u64,
        observation: &Observation,
    ) -> Result<MemoryId, StoreError> {
        let content = format!(
            "Looked around the village: {incoming} new message(s), {social} neighbour(s) recently active.",
            incoming = observation.incoming.len(),
            social = observation.social.len(),
        );
        let memory = Memory::new(
            self.profile.id.clone(),
            MemoryKind::Observation,
            content,
            OBSERVATION_IMPORTANCE,
            tick,
        )
        .with_metadata(serde_json::json!({
            "incoming": observation.incoming.len(),
            "social": observation.social.len(),
            "hour": observation.environment.hour,
        }));
        self.store.append_memory(&memory).await
    }

    /// Record the plan phase: the dual write of authoritative plan rows
    /// plus the informational plan-kind memory mirror, in one store
    /// transaction. Resets the plan cadence clock.
    ///
    /// Passing no steps still counts as planning (the agent decided there
    /// was nothing worth putting on the list); stale pending entries are
    /// skipped either way.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on transaction failure (fatal).
    pub async fn adopt_plan(
        &mut self,
        tick: u64,
        steps: &[PlannedStep],
    ) -> Result<Vec<DailyPlan>, StoreError> {
        let plans: Vec<DailyPlan> = steps
            .iter()
            .map(|step| {
                DailyPlan::new(
                    self.profile.id.clone(),
                    step.description.clone(),
                    step.priority,
                    step.slot,
                    tick,
                )
            })
            .collect();

        let outline = if plans.is_empty() {
            String::from("nothing in particular")
        } else {
            plans
                .iter()
                .map(|p| p.description.as_str())
                .collect::<Vec<_>>()
                .join("; ")
        };
        let mirror = Memory::new(
            self.profile.id.clone(),
            MemoryKind::Plan,
            format!("Planned for the day: {outline}."),
            5,
            tick,
        );

        let skipped = self
            .store
            .adopt_plan(&self.profile.id, &plans, &mirror)
            .await?;
        if skipped > 0 {
            tracing::debug!(agent = %self.profile.id, skipped, "stale plans skipped");
        }

        self.last_plan_tick = Some(tick);
        self.current_plan = plans.first().map(|p| p.id);
        Ok(plans)
    }

    /// Record the execute phase: append the action memory (plus learning
    /// and concern memories when the outcome carries them), decay energy
    /// by `energy_cost` floored at [`ENERGY_MIN`], and mark the agent
    /// active on `tick`.
    ///
    /// Exactly one action-kind memory is appended per call.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on append failure (fatal).
    pub async fn record_action(
        &mut self,
        tick: u64,
        outcome: &ActionDraft,
        energy_cost: u8,
    ) -> Result<MemoryId, StoreError> {
        let action_memory = Memory::new(
            self.profile.id.clone(),
            MemoryKind::Action,
            outcome.description.clone(),
            outcome.importance,
            tick,
        );
        let id = self.store.append_memory(&action_memory).await?;

        if let Some(lesson) = &outcome.lesson {
            let memory = Memory::new(
                self.profile.id.clone(),
                MemoryKind::Learning,
                lesson.clone(),
                LEARNING_IMPORTANCE,
                tick,
            );
            self.store.append_memory(&memory).await?;
        }
        if let Some(concern) = &outcome.concern {
            let memory = Memory::new(
                self.profile.id.clone(),
                MemoryKind::Concern,
                concern.clone(),
                CONCERN_IMPORTANCE,
                tick,
            );
            self.store.append_memory(&memory).await?;
        }

        self.energy = self.energy.saturating_sub(energy_cost).max(ENERGY_MIN);
        self.last_active_tick = tick;
        Ok(id)
    }

    /// Record the reflect phase: append the reflection memory, apply the
    /// mood update if the draft carries one, and reset the reflection
    /// cadence clock.
    ///
    /// Reflection never touches plans or conversations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on append failure (fatal).
    pub async fn record_reflection(
        &mut self,
        tick: u64,
        draft: &ReflectionDraft,
    ) -> Result<MemoryId, StoreError> {
        let memory = Memory::new(
            self.profile.id.clone(),
            MemoryKind::Reflection,
            draft.content.clone(),
            draft.importance,
            tick,
        );
        let id = self.store.append_memory(&memory).await?;

        if let Some(mood) = draft.mood {
            self.emotion = mood;
        }
        self.last_reflection_tick = Some(tick);
        Ok(id)
    }
}

/// Ticks elapsed since an optional event tick.
const fn elapsed_since(tick: u64, since: Option<u64>) -> Option<u64> {
    match since {
        Some(at) => Some(tick.saturating_sub(at)),
        None => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hearthside_store::MemoryQuery;
    use hearthside_types::{
        CaregiverRole, ConversationKind, EnvironmentSummary, MessageDraft, TimeOfDay,
    };

    use crate::policy::CadencePolicy;

    use super::*;

    fn profile(id: &str) -> AgentProfile {
        AgentProfile {
            id: AgentId::from(id),
            name: String::from(id),
            age: 28,
            role: CaregiverRole::YoungMother,
            traits: vec![String::from("patient")],
            concerns: vec![String::from("teething")],
            digital_habits: hearthside_types::DigitalHabits::default(),
            language_style: hearthside_types::LanguageStyle::default(),
            social_connections: Vec::new(),
            active_hours: Vec::new(),
            response_probability: 0.7,
            initiative: 0.5,
        }
    }

    async fn runtime(id: &str) -> (AgentRuntime, MemoryStore) {
        let store = MemoryStore::in_memory().await.unwrap();
        let p = profile(id);
        store.register_agent(&p).await.unwrap();
        (AgentRuntime::new(Arc::new(p), store.clone()), store)
    }

    fn observation(agent: &AgentId, tick: u64) -> Observation {
        Observation {
            agent_id: agent.clone(),
            environment: EnvironmentSummary {
                tick,
                day: 1,
                hour: 9,
                slot: TimeOfDay::Morning,
                roster_size: 2,
                conversation_count: 0,
            },
            social: Vec::new(),
            incoming: Vec::new(),
            recent_memories: Vec::new(),
        }
    }

    #[tokio::test]
    async fn observation_appends_exactly_one_memory() {
        let (runtime, store) = runtime("amei").await;
        let obs = observation(runtime.agent_id(), 1);
        runtime.record_observation(1, &obs).await.unwrap();

        let count = store
            .count_memories(Some(runtime.agent_id()), Some(MemoryKind::Observation))
            .await
            .unwrap();
        assert_eq!(count, 1);
        // Observe mutates nothing.
        assert_eq!(runtime.energy(), ENERGY_START);
        assert_eq!(runtime.last_active_tick(), 0);
    }

    #[tokio::test]
    async fn adopt_plan_writes_rows_and_mirror() {
        let (mut runtime, store) = runtime("amei").await;
        let steps = vec![
            PlannedStep {
                description: String::from("ask the group about teething gel"),
                priority: 8,
                slot: TimeOfDay::Morning,
            },
            PlannedStep {
                description: String::from("watch a weaning video"),
                priority: 4,
                slot: TimeOfDay::Afternoon,
            },
        ];
        let plans = runtime.adopt_plan(3, &steps).await.unwrap();
        assert_eq!(plans.len(), 2);
        assert_eq!(runtime.current_plan(), Some(plans[0].id));

        let pending = store.pending_plans(runtime.agent_id()).await.unwrap();
        assert_eq!(pending.len(), 2);
        let mirrors = store
            .count_memories(Some(runtime.agent_id()), Some(MemoryKind::Plan))
            .await
            .unwrap();
        assert_eq!(mirrors, 1);
    }

    #[tokio::test]
    async fn action_decays_energy_and_records_activity() {
        let (mut runtime, store) = runtime("amei").await;
        let outcome = ActionDraft {
            description: String::from("checked on the baby and tidied up"),
            importance: 5,
            message: None,
            lesson: None,
            concern: None,
        };
        runtime.record_action(4, &outcome, 1).await.unwrap();

        assert_eq!(runtime.energy(), ENERGY_START - 1);
        assert_eq!(runtime.last_active_tick(), 4);
        let actions = store
            .count_memories(Some(runtime.agent_id()), Some(MemoryKind::Action))
            .await
            .unwrap();
        assert_eq!(actions, 1);
    }

    #[tokio::test]
    async fn energy_never_falls_below_floor() {
        let (mut runtime, _store) = runtime("amei").await;
        let outcome = ActionDraft {
            description: String::from("a very long day"),
            importance: 5,
            message: None,
            lesson: None,
            concern: None,
        };
        for tick in 0..20 {
            runtime.record_action(tick, &outcome, 3).await.unwrap();
        }
        assert_eq!(runtime.energy(), ENERGY_MIN);
    }

    #[tokio::test]
    async fn lesson_and_concern_produce_extra_memories() {
        let (mut runtime, store) = runtime("amei").await;
        let outcome = ActionDraft {
            description: String::from("watched a first-aid video"),
            importance: 5,
            message: Some(MessageDraft {
                to_agent: None,
                kind: ConversationKind::Share,
                text: String::from("this video is worth a look"),
            }),
            lesson: Some(String::from("how to cool a fever safely")),
            concern: Some(String::from("the rash looks worse than yesterday")),
        };
        runtime.record_action(2, &outcome, 1).await.unwrap();

        let agent = runtime.agent_id();
        assert_eq!(
            store.count_memories(Some(agent), Some(MemoryKind::Action)).await.unwrap(),
            1
        );
        assert_eq!(
            store.count_memories(Some(agent), Some(MemoryKind::Learning)).await.unwrap(),
            1
        );
        let concerns = store
            .memories(&MemoryQuery::for_agent(agent).with_kind(MemoryKind::Concern))
            .await
            .unwrap();
        assert_eq!(concerns.len(), 1);
        assert_eq!(concerns[0].importance, 8);
    }

    #[tokio::test]
    async fn reflection_updates_mood_and_cadence() {
        let (mut runtime, store) = runtime("amei").await;
        let draft = ReflectionDraft {
            content: String::from("the group's advice really helped today"),
            importance: 6,
            mood: Some(EmotionalState::Content),
        };
        runtime.record_reflection(12, &draft).await.unwrap();

        assert_eq!(runtime.emotion(), EmotionalState::Content);
        assert_eq!(
            store
                .count_memories(Some(runtime.agent_id()), Some(MemoryKind::Reflection))
                .await
                .unwrap(),
            1
        );

        // Freshly reflected: the cadence gate closes again.
        let policy = CadencePolicy::default();
        assert!(!runtime.needs_reflection(&policy, 13, false));
        assert!(runtime.needs_reflection(&policy, 22, false));
    }

    #[tokio::test]
    async fn cadence_view_reports_elapsed_ticks() {
        let (mut runtime, _store) = runtime("amei").await;
        assert_eq!(runtime.view(5, false).ticks_since_plan, None);

        runtime.adopt_plan(5, &[]).await.unwrap();
        let v = runtime.view(9, true);
        assert_eq!(v.ticks_since_plan, Some(4));
    }
}
