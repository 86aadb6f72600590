//! Closed enum vocabulary shared across the simulation.
//!
//! Every enum here has a stable snake_case wire form used both by serde
//! and by the store's TEXT columns. Parsing an unknown wire string is an
//! error at the boundary where it happens (store row decoding, profile
//! loading), never a silent default.

use serde::{Deserialize, Serialize};

/// The kind of experience captured by a [`Memory`](crate::records::Memory).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// What the agent noticed about the village during its observe phase.
    Observation,
    /// Mirror of a daily plan the agent adopted.
    Plan,
    /// An action the agent carried out.
    Action,
    /// A subjective takeaway synthesized from recent experience.
    Reflection,
    /// Mirror of a message the agent sent.
    Conversation,
    /// Something the agent picked up (from a video, a chat, practice).
    Learning,
    /// A worry the agent wants to keep an eye on.
    Concern,
}

impl MemoryKind {
    /// Stable wire form, used for storage and logging.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Observation => "observation",
            Self::Plan => "plan",
            Self::Action => "action",
            Self::Reflection => "reflection",
            Self::Conversation => "conversation",
            Self::Learning => "learning",
            Self::Concern => "concern",
        }
    }

    /// Parse the wire form back into the enum.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "observation" => Some(Self::Observation),
            "plan" => Some(Self::Plan),
            "action" => Some(Self::Action),
            "reflection" => Some(Self::Reflection),
            "conversation" => Some(Self::Conversation),
            "learning" => Some(Self::Learning),
            "concern" => Some(Self::Concern),
            _ => None,
        }
    }
}

/// The register of a [`Conversation`](crate::records::Conversation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    /// Everyday chatter in the shared channel or a private message.
    Chat,
    /// A request for help with a concrete problem.
    HelpRequest,
    /// Advice offered in response to someone's situation.
    Advice,
    /// Sharing an experience, tip, or piece of content.
    Share,
}

impl ConversationKind {
    /// Stable wire form, used for storage and logging.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::HelpRequest => "help_request",
            Self::Advice => "advice",
            Self::Share => "share",
        }
    }

    /// Parse the wire form back into the enum.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "chat" => Some(Self::Chat),
            "help_request" => Some(Self::HelpRequest),
            "advice" => Some(Self::Advice),
            "share" => Some(Self::Share),
            _ => None,
        }
    }
}

/// Lifecycle status of a [`DailyPlan`](crate::records::DailyPlan) entry.
///
/// `Completed` and `Skipped` are terminal: once a plan leaves `Pending`
/// it never changes again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// Waiting to be picked up by an execute phase.
    Pending,
    /// Carried out.
    Completed,
    /// Abandoned when a newer plan replaced it.
    Skipped,
}

impl PlanStatus {
    /// Stable wire form, used for storage and logging.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        }
    }

    /// Parse the wire form back into the enum.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }

    /// Whether a transition from `self` to `next` is legal.
    ///
    /// The only legal transitions are `Pending -> Completed` and
    /// `Pending -> Skipped`. Terminal states accept no transition,
    /// including to themselves.
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Completed) | (Self::Pending, Self::Skipped)
        )
    }
}

/// Coarse mood tag carried by agent runtime state.
///
/// Updated only by the reflect phase; everything else just reads it.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EmotionalState {
    /// Neutral baseline.
    #[default]
    Calm,
    /// Quietly satisfied.
    Content,
    /// Upbeat, likely to reach out.
    Cheerful,
    /// Preoccupied with a concern.
    Worried,
    /// Low energy, likely to keep to themselves.
    Tired,
}

impl EmotionalState {
    /// Stable wire form, used for storage and logging.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Calm => "calm",
            Self::Content => "content",
            Self::Cheerful => "cheerful",
            Self::Worried => "worried",
            Self::Tired => "tired",
        }
    }

    /// Parse the wire form back into the enum.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "calm" => Some(Self::Calm),
            "content" => Some(Self::Content),
            "cheerful" => Some(Self::Cheerful),
            "worried" => Some(Self::Worried),
            "tired" => Some(Self::Tired),
            _ => None,
        }
    }
}

/// Slot of the simulated day, derived from the village clock's hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    /// 05:00-07:59, the day is just starting.
    EarlyMorning,
    /// 08:00-10:59, breakfast and school runs are done.
    Morning,
    /// 11:00-13:59, lunch and rest.
    Midday,
    /// 14:00-16:59, a quieter stretch.
    Afternoon,
    /// 17:00-20:59, dinner and family time.
    Evening,
    /// 21:00-04:59, most of the village is asleep.
    Night,
}

impl TimeOfDay {
    /// Derive the slot from an hour of day (`0..=23`).
    ///
    /// Hours outside the valid range fold into `Night`, which is also
    /// where the wrap-around hours live.
    pub const fn from_hour(hour: u8) -> Self {
        match hour {
            5..=7 => Self::EarlyMorning,
            8..=10 => Self::Morning,
            11..=13 => Self::Midday,
            14..=16 => Self::Afternoon,
            17..=20 => Self::Evening,
            _ => Self::Night,
        }
    }

    /// Stable wire form, used for storage and logging.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EarlyMorning => "early_morning",
            Self::Morning => "morning",
            Self::Midday => "midday",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }

    /// Parse the wire form back into the enum.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "early_morning" => Some(Self::EarlyMorning),
            "morning" => Some(Self::Morning),
            "midday" => Some(Self::Midday),
            "afternoon" => Some(Self::Afternoon),
            "evening" => Some(Self::Evening),
            "night" => Some(Self::Night),
            _ => None,
        }
    }
}

/// Role category of an agent, validated against age at profile load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaregiverRole {
    /// A first-time or recent mother.
    YoungMother,
    /// A mother with older children and accumulated know-how.
    ExperiencedMother,
    /// A grandmother helping raise grandchildren.
    Grandmother,
    /// A community social worker who checks in on families.
    SocialWorker,
}

impl CaregiverRole {
    /// Stable wire form, used for storage and logging.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::YoungMother => "young_mother",
            Self::ExperiencedMother => "experienced_mother",
            Self::Grandmother => "grandmother",
            Self::SocialWorker => "social_worker",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_kind_roundtrip() {
        for kind in [
            MemoryKind::Observation,
            MemoryKind::Plan,
            MemoryKind::Action,
            MemoryKind::Reflection,
            MemoryKind::Conversation,
            MemoryKind::Learning,
            MemoryKind::Concern,
        ] {
            assert_eq!(MemoryKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(MemoryKind::parse("daydream"), None);
    }

    #[test]
    fn conversation_kind_roundtrip() {
        for kind in [
            ConversationKind::Chat,
            ConversationKind::HelpRequest,
            ConversationKind::Advice,
            ConversationKind::Share,
        ] {
            assert_eq!(ConversationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ConversationKind::parse("gossip"), None);
    }

    #[test]
    fn plan_status_legal_transitions() {
        assert!(PlanStatus::Pending.can_transition_to(PlanStatus::Completed));
        assert!(PlanStatus::Pending.can_transition_to(PlanStatus::Skipped));
    }

    #[test]
    fn plan_status_terminal_states_reject_everything() {
        for terminal in [PlanStatus::Completed, PlanStatus::Skipped] {
            for next in [PlanStatus::Pending, PlanStatus::Completed, PlanStatus::Skipped] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        // Pending -> Pending is also not a transition.
        assert!(!PlanStatus::Pending.can_transition_to(PlanStatus::Pending));
    }

    #[test]
    fn skipped_never_becomes_completed() {
        assert!(!PlanStatus::Skipped.can_transition_to(PlanStatus::Completed));
    }

    #[test]
    fn time_of_day_covers_all_hours() {
        assert_eq!(TimeOfDay::from_hour(5), TimeOfDay::EarlyMorning);
        assert_eq!(TimeOfDay::from_hour(9), TimeOfDay::Morning);
        assert_eq!(TimeOfDay::from_hour(12), TimeOfDay::Midday);
        assert_eq!(TimeOfDay::from_hour(15), TimeOfDay::Afternoon);
        assert_eq!(TimeOfDay::from_hour(19), TimeOfDay::Evening);
        assert_eq!(TimeOfDay::from_hour(23), TimeOfDay::Night);
        assert_eq!(TimeOfDay::from_hour(2), TimeOfDay::Night);
        // Out-of-range hours fold into Night rather than panicking.
        assert_eq!(TimeOfDay::from_hour(99), TimeOfDay::Night);
    }

    #[test]
    fn emotional_state_default_is_calm() {
        assert_eq!(EmotionalState::default(), EmotionalState::Calm);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&ConversationKind::HelpRequest).unwrap_or_default();
        assert_eq!(json, "\"help_request\"");
        let json = serde_json::to_string(&TimeOfDay::EarlyMorning).unwrap_or_default();
        assert_eq!(json, "\"early_morning\"");
    }
}
