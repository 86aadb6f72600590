//! Control surface for a running simulation.
//!
//! [`ControlState`] is shared between the tick loop and whoever is
//! driving it (a shell, an automation harness, a Ctrl-C handler). Stop
//! and pause flags are atomics polled between ticks only, so an in-flight
//! tick always finishes before the run honors them and no partial-tick
//! state is ever observable. [`ControlState::status`] is synchronous and
//! reads the snapshot refreshed at every tick boundary, so it can be
//! called mid-run without pausing anything.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;

use hearthside_agents::AgentSnapshot;
use hearthside_store::{MemoryQuery, MemoryStore, StoreError};
use hearthside_types::{AgentId, Memory};

/// Reason why a simulation run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationEndReason {
    /// Reached the caller-supplied maximum tick count.
    MaxTicksReached,
    /// Reached the caller-supplied maximum conversation count.
    MaxConversationsReached,
    /// An external stop was requested.
    OperatorStop,
}

/// Shared control state between the tick loop and its caller.
#[derive(Debug)]
pub struct ControlState {
    /// Whether the simulation is currently paused.
    paused: AtomicBool,

    /// Wakes the tick loop when resumed.
    resume_notify: Notify,

    /// Whether a stop has been requested.
    stop_requested: AtomicBool,

    /// Tick counter as of the last completed tick.
    tick: AtomicU64,

    /// Conversation counter as of the last completed tick.
    conversation_count: AtomicU64,

    /// Wall-clock time the control state was created.
    started_at: DateTime<Utc>,

    /// Per-agent snapshot as of the last completed tick.
    agents: Mutex<BTreeMap<AgentId, AgentSnapshot>>,

    /// Reason the run ended, once it has.
    end_reason: Mutex<Option<SimulationEndReason>>,
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlState {
    /// Fresh control state for one run.
    pub fn new() -> Self {
        Self {
            paused: AtomicBool::new(false),
            resume_notify: Notify::new(),
            stop_requested: AtomicBool::new(false),
            tick: AtomicU64::new(0),
            conversation_count: AtomicU64::new(0),
            started_at: Utc::now(),
            agents: Mutex::new(BTreeMap::new()),
            end_reason: Mutex::new(None),
        }
    }

    // -----------------------------------------------------------------------
    // Pause / resume
    // -----------------------------------------------------------------------

    /// Whether the simulation is paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Pause the tick loop at the next tick boundary.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    /// Resume a paused tick loop.
    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
        self.resume_notify.notify_one();
    }

    /// Block until no longer paused. Returns immediately if not paused.
    pub async fn wait_if_paused(&self) {
        while self.paused.load(Ordering::Acquire) {
            self.resume_notify.notified().await;
        }
    }

    // -----------------------------------------------------------------------
    // Stop
    // -----------------------------------------------------------------------

    /// Request a clean stop. The in-flight tick finishes first.
    pub fn request_stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        // A paused loop must wake up to see the stop flag.
        self.resume_notify.notify_one();
        self.paused.store(false, Ordering::Release);
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    /// Record why the run ended.
    pub fn set_end_reason(&self, reason: SimulationEndReason) {
        *lock_recovering(&self.end_reason) = Some(reason);
    }

    /// Why the run ended, if it has.
    pub fn end_reason(&self) -> Option<SimulationEndReason> {
        lock_recovering(&self.end_reason).clone()
    }

    // -----------------------------------------------------------------------
    // Status snapshot
    // -----------------------------------------------------------------------

    /// Refresh the shared snapshot. Called by the scheduler after every
    /// completed tick.
    pub fn record_tick(&self, tick: u64, conversation_count: u64, snapshots: Vec<AgentSnapshot>) {
        self.tick.store(tick, Ordering::Release);
        self.conversation_count
            .store(conversation_count, Ordering::Release);
        let mut agents = lock_recovering(&self.agents);
        for snapshot in snapshots {
            agents.insert(snapshot.agent_id.clone(), snapshot);
        }
    }

    /// Current status, readable mid-run without pausing the loop.
    pub fn status(&self) -> SimulationStatus {
        SimulationStatus {
            tick: self.tick.load(Ordering::Acquire),
            conversation_count: self.conversation_count.load(Ordering::Acquire),
            paused: self.is_paused(),
            stop_requested: self.is_stop_requested(),
            agents: lock_recovering(&self.agents).values().cloned().collect(),
            end_reason: self.end_reason(),
            started_at: self.started_at.to_rfc3339(),
        }
    }

    /// Snapshot of one agent, if it has been recorded.
    pub fn agent_snapshot(&self, agent_id: &AgentId) -> Option<AgentSnapshot> {
        lock_recovering(&self.agents).get(agent_id).cloned()
    }
}

/// Take a std mutex, recovering the data if a panicking thread poisoned it.
fn lock_recovering<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// JSON-serializable status of the simulation.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationStatus {
    /// Tick counter as of the last completed tick.
    pub tick: u64,
    /// Cumulative conversation count.
    pub conversation_count: u64,
    /// Whether the loop is paused.
    pub paused: bool,
    /// Whether a stop has been requested.
    pub stop_requested: bool,
    /// Per-agent energy/mood snapshot.
    pub agents: Vec<AgentSnapshot>,
    /// Why the run ended, if it has.
    pub end_reason: Option<SimulationEndReason>,
    /// ISO 8601 timestamp of when the run started.
    pub started_at: String,
}

/// Detailed view of one agent: live snapshot plus its recent memories.
#[derive(Debug, Clone, Serialize)]
pub struct AgentDetail {
    /// The agent's live snapshot.
    pub snapshot: AgentSnapshot,
    /// The agent's most recent memories, newest first.
    pub recent_memories: Vec<Memory>,
}

/// How many memories [`agent_detail`] returns.
const DETAIL_MEMORY_LIMIT: u32 = 10;

/// Combine an agent's live snapshot with its recent memory log.
///
/// Returns `None` for an agent the control state has never seen.
///
/// # Errors
///
/// Returns [`StoreError`] if the memory query fails.
pub async fn agent_detail(
    store: &MemoryStore,
    control: &ControlState,
    agent_id: &AgentId,
) -> Result<Option<AgentDetail>, StoreError> {
    let Some(snapshot) = control.agent_snapshot(agent_id) else {
        return Ok(None);
    };
    let recent_memories = store
        .memories(&MemoryQuery::for_agent(agent_id).limit(DETAIL_MEMORY_LIMIT))
        .await?;
    Ok(Some(AgentDetail {
        snapshot,
        recent_memories,
    }))
}
