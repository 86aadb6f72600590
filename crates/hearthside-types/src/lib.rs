//! Shared type definitions for the Hearthside village simulation.
//!
//! This crate holds the data model used by every other crate in the
//! workspace: typed identifiers, the closed enum vocabulary (memory kinds,
//! conversation kinds, plan status, moods, time slots, roles), the
//! persisted record structs, agent profile configuration, and the
//! request/response payloads exchanged with the reasoning provider.
//!
//! It deliberately contains no behavior beyond constructors, validation
//! helpers, and derived serialization.

pub mod enums;
pub mod ids;
pub mod profile;
pub mod reasoning;
pub mod records;

pub use enums::{
    CaregiverRole, ConversationKind, EmotionalState, MemoryKind, PlanStatus, TimeOfDay,
};
pub use ids::{AgentId, ConversationId, MemoryId, PlanId};
pub use profile::{AgentProfile, DigitalHabits, LanguageStyle, ProfileError};
pub use reasoning::{
    ActionContext, ActionDraft, EnvironmentSummary, MessageDraft, Observation, PlanContext,
    PlanDraft, PlannedStep, ReflectionContext, ReflectionDraft, SocialObservation,
};
pub use records::{Conversation, DailyPlan, Memory};
