//! The scheduler: tick loop, agent selection, and termination policy.
//!
//! [`run_simulation`] drives the whole run. Each tick it picks exactly
//! one agent, runs the cognitive workflow for it, applies the tick's
//! bookkeeping (tick counter, conversation counter, checkpoint, status
//! snapshot), and evaluates termination. Execution is strictly
//! sequential: one agent's full observe/plan/execute/reflect cycle
//! completes before the next selection begins, which is what makes the
//! append order of the memory store equal tick order.
//!
//! Selection is deterministic. Each roster member is scored from how
//! long it has been idle, its current energy, and whether the simulated
//! hour falls in its profile's active hours; the highest score acts.
//! Ties go to the agent with the oldest last-active tick, and ties on
//! that go to the lowest agent id.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use hearthside_agents::{AgentRuntime, PlanningPolicy};
use hearthside_store::{MemoryStore, StoreError};
use hearthside_types::AgentId;

use crate::clock::{ClockError, VillageClock};
use crate::operator::{ControlState, SimulationEndReason};
use crate::provider::ReasoningProvider;
use crate::workflow::{self, RosterEntry, TickContext, TickReport, WorkflowError};

/// Weight of idle ticks in the selection score.
const IDLE_WEIGHT: i64 = 4;

/// Weight of current energy in the selection score.
const ENERGY_WEIGHT: i64 = 2;

/// Bonus when the simulated hour falls in the profile's active hours.
const AFFINITY_BONUS: i64 = 10;

/// Cap on idle ticks fed into the score, so one long-ignored agent does
/// not saturate the arithmetic.
const IDLE_CAP: u64 = 1_000;

/// Errors that halt a simulation run.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// The durability layer failed; the run stops at the last consistent
    /// tick so the caller can resume bookkeeping from a known point.
    #[error("storage failure at tick {last_consistent_tick}: {source}")]
    Storage {
        /// The last tick whose records are fully persisted.
        last_consistent_tick: u64,
        /// The underlying store error.
        source: StoreError,
    },

    /// The clock could not advance.
    #[error("clock failure at tick {last_consistent_tick}: {source}")]
    Clock {
        /// The last tick whose records are fully persisted.
        last_consistent_tick: u64,
        /// The underlying clock error.
        source: ClockError,
    },

    /// The roster is empty; nothing can be scheduled.
    #[error("cannot run a simulation with an empty roster")]
    EmptyRoster,
}

/// Caller-supplied run bounds. Zero means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunBounds {
    /// Stop once the tick counter reaches this value (0 = unlimited).
    pub max_ticks: u64,
    /// Stop once this many conversations have been appended
    /// (0 = unlimited).
    pub max_conversations: u64,
}

/// Result of a completed simulation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationResult {
    /// Why the run ended.
    pub end_reason: SimulationEndReason,
    /// Number of ticks executed by this call.
    pub total_ticks: u64,
    /// Cumulative conversation count at the end of the run.
    pub conversation_count: u64,
}

/// Process-wide mutable simulation state, owned by the scheduler.
#[derive(Debug)]
pub struct SimulationState {
    /// The village clock; its tick counter is the run's source of truth.
    pub clock: VillageClock,
    /// All live agents, keyed by id.
    pub roster: BTreeMap<AgentId, AgentRuntime>,
    /// Cumulative count of persisted conversations.
    pub conversation_count: u64,
}

impl SimulationState {
    /// Assemble the state from a clock and a set of runtimes.
    pub fn new(clock: VillageClock, runtimes: Vec<AgentRuntime>) -> Self {
        let roster = runtimes
            .into_iter()
            .map(|rt| (rt.agent_id().clone(), rt))
            .collect();
        Self {
            clock,
            roster,
            conversation_count: 0,
        }
    }

    /// Roster ids and names in id order, for tick contexts.
    fn roster_entries(&self) -> Vec<RosterEntry> {
        self.roster
            .values()
            .map(|rt| RosterEntry {
                agent_id: rt.agent_id().clone(),
                name: rt.profile().name.clone(),
            })
            .collect()
    }
}

/// Callback invoked after each tick completes.
///
/// Implementations can log progress, feed a UI, or collect statistics.
pub trait TickCallback: Send {
    /// Called once per completed tick.
    fn on_tick(&mut self, report: &TickReport, state: &SimulationState);
}

/// A no-op tick callback.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _report: &TickReport, _state: &SimulationState) {}
}

/// Run the tick loop until a termination condition is met.
///
/// Stop requests are polled between ticks only (cooperative, never
/// preemptive), and the conversation bound is evaluated after the tick
/// that crossed it, so the run never stops mid-phase.
///
/// # Errors
///
/// Returns [`SchedulerError`] for fatal failures (storage, clock, empty
/// roster). Provider misbehavior never surfaces here.
pub async fn run_simulation<P: ReasoningProvider>(
    state: &mut SimulationState,
    store: &MemoryStore,
    provider: &mut P,
    policy: &impl PlanningPolicy,
    control: &Arc<ControlState>,
    bounds: &RunBounds,
    callback: &mut dyn TickCallback,
) -> Result<SimulationResult, SchedulerError> {
    if state.roster.is_empty() {
        return Err(SchedulerError::EmptyRoster);
    }

    let mut total_ticks: u64 = 0;

    info!(
        roster = state.roster.len(),
        max_ticks = bounds.max_ticks,
        max_conversations = bounds.max_conversations,
        "simulation starting"
    );

    loop {
        control.wait_if_paused().await;

        if control.is_stop_requested() {
            info!(tick = state.clock.tick(), "external stop honored");
            return Ok(finish(
                state,
                control,
                SimulationEndReason::OperatorStop,
                total_ticks,
            ));
        }

        let tick = state.clock.tick();
        if bounds.max_ticks > 0 && tick >= bounds.max_ticks {
            info!(tick, max_ticks = bounds.max_ticks, "tick limit reached");
            return Ok(finish(
                state,
                control,
                SimulationEndReason::MaxTicksReached,
                total_ticks,
            ));
        }
        if bounds.max_conversations > 0 && state.conversation_count >= bounds.max_conversations {
            info!(
                tick,
                conversations = state.conversation_count,
                "conversation limit reached"
            );
            return Ok(finish(
                state,
                control,
                SimulationEndReason::MaxConversationsReached,
                total_ticks,
            ));
        }

        // --- Select exactly one agent for this tick ---
        let hour = state.clock.hour();
        let Some(agent_id) = select_agent(state, hour) else {
            return Err(SchedulerError::EmptyRoster);
        };
        info!(tick, agent = %agent_id, hour, "tick started");

        let ctx = TickContext {
            tick,
            day: state.clock.day(),
            hour,
            slot: state.clock.slot(),
            conversation_count: state.conversation_count,
            roster: state.roster_entries(),
        };

        // --- Run the cognitive workflow ---
        let Some(runtime) = state.roster.get_mut(&agent_id) else {
            // Selection only returns roster keys.
            warn!(tick, agent = %agent_id, "selected agent vanished from roster");
            return Err(SchedulerError::EmptyRoster);
        };
        let report = workflow::run_cycle(runtime, store, provider, policy, &ctx)
            .await
            .map_err(|WorkflowError::Store(source)| SchedulerError::Storage {
                last_consistent_tick: tick,
                source,
            })?;

        // --- Bookkeeping ---
        if report.conversation_sent {
            state.conversation_count = state.conversation_count.saturating_add(1);
        }
        let new_tick = state
            .clock
            .advance()
            .map_err(|source| SchedulerError::Clock {
                last_consistent_tick: tick,
                source,
            })?;
        total_ticks = total_ticks.saturating_add(1);

        store
            .save_checkpoint(new_tick, state.conversation_count)
            .await
            .map_err(|source| SchedulerError::Storage {
                last_consistent_tick: tick,
                source,
            })?;

        let snapshots = state.roster.values().map(AgentRuntime::snapshot).collect();
        control.record_tick(new_tick, state.conversation_count, snapshots);
        callback.on_tick(&report, state);
    }
}

/// Wrap up a run: record the end reason and build the result.
fn finish(
    state: &SimulationState,
    control: &ControlState,
    end_reason: SimulationEndReason,
    total_ticks: u64,
) -> SimulationResult {
    control.set_end_reason(end_reason.clone());
    info!(
        reason = ?end_reason,
        total_ticks,
        conversations = state.conversation_count,
        "simulation ended"
    );
    SimulationResult {
        end_reason,
        total_ticks,
        conversation_count: state.conversation_count,
    }
}

/// Pick the agent that acts this tick.
///
/// Iteration is in id order, and a candidate replaces the current best
/// only on a strictly better score or an older last-active tick, which
/// encodes both tie-break rules at once.
fn select_agent(state: &SimulationState, hour: u8) -> Option<AgentId> {
    let tick = state.clock.tick();
    let mut best: Option<(i64, u64, &AgentId)> = None;

    for (id, runtime) in &state.roster {
        let score = selection_score(runtime, tick, hour);
        let replace = match best {
            None => true,
            Some((best_score, best_last_active, _)) => {
                score > best_score
                    || (score == best_score && runtime.last_active_tick() < best_last_active)
            }
        };
        if replace {
            best = Some((score, runtime.last_active_tick(), id));
        }
    }

    best.map(|(_, _, id)| id.clone())
}

/// Deterministic selection score for one agent.
pub(crate) fn selection_score(runtime: &AgentRuntime, tick: u64, hour: u8) -> i64 {
    let idle = tick.saturating_sub(runtime.last_active_tick()).min(IDLE_CAP);
    let idle_part = i64::try_from(idle).unwrap_or(0).saturating_mul(IDLE_WEIGHT);
    let energy_part = i64::from(runtime.energy()).saturating_mul(ENERGY_WEIGHT);
    let affinity = if runtime.profile().is_active_at(hour) {
        AFFINITY_BONUS
    } else {
        0
    };
    idle_part.saturating_add(energy_part).saturating_add(affinity)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use hearthside_types::{ActionDraft, AgentProfile, CaregiverRole};

    use super::*;

    fn profile(id: &str, active_hours: &[u8]) -> AgentProfile {
        AgentProfile {
            id: AgentId::from(id),
            name: String::from(id),
            age: 30,
            role: CaregiverRole::ExperiencedMother,
            traits: Vec::new(),
            concerns: Vec::new(),
            digital_habits: hearthside_types::DigitalHabits::default(),
            language_style: hearthside_types::LanguageStyle::default(),
            social_connections: Vec::new(),
            active_hours: active_hours.to_vec(),
            response_probability: 0.7,
            initiative: 0.5,
        }
    }

    async fn state_with(profiles: Vec<AgentProfile>) -> (SimulationState, MemoryStore) {
        let store = MemoryStore::in_memory().await.unwrap();
        let mut runtimes = Vec::new();
        for p in profiles {
            store.register_agent(&p).await.unwrap();
            runtimes.push(AgentRuntime::new(std::sync::Arc::new(p), store.clone()));
        }
        let clock = VillageClock::new(24).unwrap();
        (SimulationState::new(clock, runtimes), store)
    }

    #[tokio::test]
    async fn tie_breaks_to_lowest_id() {
        let (state, _store) = state_with(vec![profile("beta", &[]), profile("alpha", &[])]).await;
        // Fresh run: identical idle, energy, and affinity everywhere.
        assert_eq!(select_agent(&state, 9), Some(AgentId::from("alpha")));
    }

    #[tokio::test]
    async fn idle_agents_win_over_recent_actors() {
        let (mut state, _store) =
            state_with(vec![profile("alpha", &[]), profile("beta", &[])]).await;

        // alpha acts on tick 0; advance to tick 1.
        let outcome = ActionDraft {
            description: String::from("did something"),
            importance: 3,
            message: None,
            lesson: None,
            concern: None,
        };
        state
            .roster
            .get_mut(&AgentId::from("alpha"))
            .unwrap()
            .record_action(0, &outcome, 1)
            .await
            .unwrap();
        let _ = state.clock.advance();
        let _ = state.clock.advance();

        // beta has been idle longer (last_active 0 vs alpha's energy loss
        // plus equal idle): idle is equal, but alpha lost energy acting,
        // so beta's score is higher.
        assert_eq!(select_agent(&state, 9), Some(AgentId::from("beta")));
    }

    #[tokio::test]
    async fn active_hours_grant_affinity_bonus() {
        let (state, _store) =
            state_with(vec![profile("alpha", &[2]), profile("beta", &[9])]).await;
        // At hour 9 only beta is in its active window.
        assert_eq!(select_agent(&state, 9), Some(AgentId::from("beta")));
        // At hour 2 only alpha is.
        assert_eq!(select_agent(&state, 2), Some(AgentId::from("alpha")));
    }

    #[tokio::test]
    async fn score_is_deterministic() {
        let (state, _store) = state_with(vec![profile("alpha", &[9])]).await;
        let runtime = state.roster.get(&AgentId::from("alpha")).unwrap();
        let a = selection_score(runtime, 5, 9);
        let b = selection_score(runtime, 5, 9);
        assert_eq!(a, b);
        // Idle 5 * 4 + energy 7 * 2 + affinity 10.
        assert_eq!(a, 44);
    }
}
