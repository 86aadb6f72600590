//! Persisted record structs: memories, conversations, and daily plans.
//!
//! Records are append-only once written. Each carries both the simulation
//! tick it was created on and a wall-clock timestamp; the store's append
//! order is the authoritative total order, the tick is what other agents'
//! observe phases filter on, and the timestamp is what retention cleanup
//! compares against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{ConversationKind, MemoryKind, PlanStatus, TimeOfDay};
use crate::ids::{AgentId, ConversationId, MemoryId, PlanId};

/// Lowest allowed importance/priority score.
pub const SCORE_MIN: u8 = 1;

/// Highest allowed importance/priority score.
pub const SCORE_MAX: u8 = 10;

/// Clamp a raw score into the `1..=10` range used throughout the model.
pub const fn clamp_score(raw: u8) -> u8 {
    if raw < SCORE_MIN {
        SCORE_MIN
    } else if raw > SCORE_MAX {
        SCORE_MAX
    } else {
        raw
    }
}

/// One typed, importance-scored entry in an agent's experience log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Memory {
    /// Stable identifier assigned at creation.
    pub id: MemoryId,
    /// The agent this memory belongs to.
    pub agent_id: AgentId,
    /// What kind of experience this is.
    pub kind: MemoryKind,
    /// Free-text content.
    pub content: String,
    /// Importance score in `1..=10`.
    pub importance: u8,
    /// Simulation tick the memory was created on.
    pub tick: u64,
    /// Wall-clock creation time.
    pub created_at: DateTime<Utc>,
    /// Structured metadata, opaque to the core.
    pub metadata: serde_json::Value,
}

impl Memory {
    /// Build a new memory, clamping importance into `1..=10`.
    pub fn new(
        agent_id: AgentId,
        kind: MemoryKind,
        content: impl Into<String>,
        importance: u8,
        tick: u64,
    ) -> Self {
        Self {
            id: MemoryId::new(),
            agent_id,
            kind,
            content: content.into(),
            importance: clamp_score(importance),
            tick,
            created_at: Utc::now(),
            metadata: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    /// Attach structured metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Whether the content mentions `topic` (case-insensitive substring).
    pub fn mentions(&self, topic: &str) -> bool {
        !topic.is_empty() && self.content.to_lowercase().contains(&topic.to_lowercase())
    }
}

/// A message exchanged between agents, or broadcast to the shared channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Stable identifier assigned at creation.
    pub id: ConversationId,
    /// The sender.
    pub from_agent: AgentId,
    /// The receiver, or `None` for a broadcast to the shared channel.
    pub to_agent: Option<AgentId>,
    /// The register of the message.
    pub kind: ConversationKind,
    /// The message text.
    pub message: String,
    /// Simulation tick the message was sent on.
    pub tick: u64,
    /// Wall-clock creation time.
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    /// Build a new conversation record.
    pub fn new(
        from_agent: AgentId,
        to_agent: Option<AgentId>,
        kind: ConversationKind,
        message: impl Into<String>,
        tick: u64,
    ) -> Self {
        Self {
            id: ConversationId::new(),
            from_agent,
            to_agent,
            kind,
            message: message.into(),
            tick,
            created_at: Utc::now(),
        }
    }

    /// Whether this message goes to the shared channel rather than one agent.
    pub const fn is_broadcast(&self) -> bool {
        self.to_agent.is_none()
    }
}

/// A prioritized intended action, created by the plan phase and consumed
/// by later execute phases.
///
/// The DailyPlan row is authoritative for status transitions; the
/// plan-kind [`Memory`] written alongside it is informational only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPlan {
    /// Stable identifier assigned at creation.
    pub id: PlanId,
    /// The agent that owns the plan.
    pub agent_id: AgentId,
    /// What the agent intends to do.
    pub description: String,
    /// Priority in `1..=10`; execute picks the highest pending priority.
    pub priority: u8,
    /// The slot of the day this action suits best.
    pub slot: TimeOfDay,
    /// Lifecycle status; transitions are enforced by the store.
    pub status: PlanStatus,
    /// Simulation tick the plan was created on.
    pub tick: u64,
    /// Wall-clock creation time.
    pub created_at: DateTime<Utc>,
}

impl DailyPlan {
    /// Build a new pending plan entry, clamping priority into `1..=10`.
    pub fn new(
        agent_id: AgentId,
        description: impl Into<String>,
        priority: u8,
        slot: TimeOfDay,
        tick: u64,
    ) -> Self {
        Self {
            id: PlanId::new(),
            agent_id,
            description: description.into(),
            priority: clamp_score(priority),
            slot,
            status: PlanStatus::Pending,
            tick,
            created_at: Utc::now(),
        }
    }
}
