//! Payloads exchanged with the reasoning provider.
//!
//! The context structs are assembled by the cognitive workflow and
//! rendered into prompts; the draft structs are what the provider's
//! output is parsed into. Drafts are plain serde targets so the LLM
//! runner can deserialize a JSON response straight into them, and the
//! scripted test providers can construct them literally.

use serde::{Deserialize, Serialize};

use crate::enums::{ConversationKind, EmotionalState, TimeOfDay};
use crate::ids::AgentId;
use crate::profile::AgentProfile;
use crate::records::{Conversation, DailyPlan, Memory};

/// Snapshot of the village-wide state an agent can see this tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSummary {
    /// Current tick number.
    pub tick: u64,
    /// Simulated day, starting at 1.
    pub day: u64,
    /// Simulated hour of day, `0..=23`.
    pub hour: u8,
    /// Slot of the day derived from the hour.
    pub slot: TimeOfDay,
    /// Number of agents in the roster.
    pub roster_size: usize,
    /// Cumulative conversation count across the run.
    pub conversation_count: u64,
}

/// What one other agent has visibly been up to lately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialObservation {
    /// The observed agent.
    pub agent_id: AgentId,
    /// The observed agent's display name.
    pub agent_name: String,
    /// Short description of the observed activity.
    pub summary: String,
    /// The most recent visible message from that agent, if any.
    pub last_message: Option<String>,
}

/// Everything an agent gathered during its observe phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// The observing agent.
    pub agent_id: AgentId,
    /// Village-wide snapshot.
    pub environment: EnvironmentSummary,
    /// What the other villagers have been doing.
    pub social: Vec<SocialObservation>,
    /// Messages addressed to this agent or broadcast since it last acted.
    pub incoming: Vec<Conversation>,
    /// The agent's own recent memories, newest first.
    pub recent_memories: Vec<Memory>,
}

/// Context for a plan-phase provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanContext {
    /// Who is planning.
    pub profile: AgentProfile,
    /// What they just observed.
    pub observation: Observation,
}

/// Context for an execute-phase provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionContext {
    /// Who is acting.
    pub profile: AgentProfile,
    /// What they observed at the start of the tick.
    pub observation: Observation,
    /// The plan entry being realized, if one was pending.
    pub chosen_plan: Option<DailyPlan>,
    /// Current energy level, `1..=10`.
    pub energy: u8,
    /// Current mood.
    pub emotion: EmotionalState,
}

/// Context for a reflect-phase provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionContext {
    /// Who is reflecting.
    pub profile: AgentProfile,
    /// Recent memories to synthesize, newest first.
    pub recent_memories: Vec<Memory>,
    /// Current energy level, `1..=10`.
    pub energy: u8,
    /// Current mood.
    pub emotion: EmotionalState,
}

/// One step of a drafted daily plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedStep {
    /// What the agent intends to do.
    pub description: String,
    /// Priority in `1..=10` (clamped downstream).
    pub priority: u8,
    /// The slot of the day the step suits best.
    #[serde(default = "default_slot")]
    pub slot: TimeOfDay,
}

/// Default slot when the provider omits one.
const fn default_slot() -> TimeOfDay {
    TimeOfDay::Morning
}

/// A drafted daily plan: zero or more steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanDraft {
    /// The drafted steps, unordered; the store keeps them all as pending.
    #[serde(default)]
    pub steps: Vec<PlannedStep>,
}

/// A message the agent wants to send as part of an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDraft {
    /// The receiver, or `None` to broadcast to the shared channel.
    #[serde(default)]
    pub to_agent: Option<AgentId>,
    /// The register of the message.
    pub kind: ConversationKind,
    /// The message text.
    pub text: String,
}

/// A concrete realized action, produced by the execute-phase provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDraft {
    /// What the agent did, in one sentence.
    pub description: String,
    /// Importance of the action memory, `1..=10` (clamped downstream).
    pub importance: u8,
    /// A message to send, if the action involves one.
    #[serde(default)]
    pub message: Option<MessageDraft>,
    /// Something the agent learned doing this, if anything.
    #[serde(default)]
    pub lesson: Option<String>,
    /// A worry the action surfaced, if any.
    #[serde(default)]
    pub concern: Option<String>,
}

/// A drafted reflection, produced by the reflect-phase provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionDraft {
    /// The subjective takeaway.
    pub content: String,
    /// Importance of the reflection memory, `1..=10` (clamped downstream).
    pub importance: u8,
    /// An updated mood, if the reflection shifted it.
    #[serde(default)]
    pub mood: Option<EmotionalState>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn plan_draft_deserializes_with_defaults() {
        let json = r#"{"steps": [{"description": "check on the baby", "priority": 8}]}"#;
        let draft: PlanDraft = serde_json::from_str(json).unwrap();
        assert_eq!(draft.steps.len(), 1);
        assert_eq!(draft.steps[0].slot, TimeOfDay::Morning);
    }

    #[test]
    fn empty_plan_draft_is_valid() {
        let draft: PlanDraft = serde_json::from_str("{}").unwrap();
        assert!(draft.steps.is_empty());
    }

    #[test]
    fn action_draft_optional_fields_default_to_none() {
        let json = r#"{"description": "folded laundry", "importance": 3}"#;
        let draft: ActionDraft = serde_json::from_str(json).unwrap();
        assert!(draft.message.is_none());
        assert!(draft.lesson.is_none());
        assert!(draft.concern.is_none());
    }

    #[test]
    fn message_draft_broadcast_omits_receiver() {
        let json = r#"{"kind": "chat", "text": "anyone up?"}"#;
        let draft: MessageDraft = serde_json::from_str(json).unwrap();
        assert!(draft.to_agent.is_none());
        assert_eq!(draft.kind, ConversationKind::Chat);
    }

    #[test]
    fn reflection_draft_mood_is_optional() {
        let json = r#"{"content": "a good day overall", "importance": 4}"#;
        let draft: ReflectionDraft = serde_json::from_str(json).unwrap();
        assert!(draft.mood.is_none());

        let json = r#"{"content": "worn out", "importance": 5, "mood": "tired"}"#;
        let draft: ReflectionDraft = serde_json::from_str(json).unwrap();
        assert_eq!(draft.mood, Some(EmotionalState::Tired));
    }
}
