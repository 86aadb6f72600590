//! Agent profile configuration: who each villager is.
//!
//! Profiles are authored externally (JSON files, one per agent), loaded
//! once at startup, and never mutated during a run. The original persona
//! schema was duck-typed; here it is a closed set of typed fields, and
//! anything malformed is rejected at load time by [`AgentProfile::validate`]
//! rather than surfacing mid-run.

use serde::{Deserialize, Serialize};

use crate::enums::CaregiverRole;
use crate::ids::AgentId;

/// Youngest age a profile may declare.
const AGE_MIN: u8 = 15;

/// Oldest age a profile may declare.
const AGE_MAX: u8 = 90;

/// A young mother older than this fails role/age validation.
const YOUNG_MOTHER_AGE_CAP: u8 = 35;

/// A grandmother younger than this fails role/age validation.
const GRANDMOTHER_AGE_FLOOR: u8 = 45;

/// A profile that fails validation. Configuration errors are fatal at
/// startup, before any tick runs.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ProfileError {
    /// The profile id is empty.
    #[error("profile has an empty id")]
    EmptyId,

    /// The display name is empty.
    #[error("profile {id} has an empty name")]
    EmptyName {
        /// The offending profile id.
        id: AgentId,
    },

    /// The declared age is outside the allowed range.
    #[error("profile {id} has age {age} outside {AGE_MIN}..={AGE_MAX}")]
    AgeOutOfRange {
        /// The offending profile id.
        id: AgentId,
        /// The declared age.
        age: u8,
    },

    /// The age is inconsistent with the declared role.
    #[error("profile {id}: age {age} is inconsistent with role {role}")]
    RoleAgeMismatch {
        /// The offending profile id.
        id: AgentId,
        /// The declared age.
        age: u8,
        /// The declared role (wire form).
        role: &'static str,
    },

    /// An active hour is outside `0..=23`.
    #[error("profile {id} lists active hour {hour} outside 0..=23")]
    InvalidActiveHour {
        /// The offending profile id.
        id: AgentId,
        /// The offending hour.
        hour: u8,
    },

    /// A probability weight is outside `0.0..=1.0`.
    #[error("profile {id}: {field} = {value} is outside 0.0..=1.0")]
    WeightOutOfRange {
        /// The offending profile id.
        id: AgentId,
        /// Which weight field is wrong.
        field: &'static str,
        /// The offending value.
        value: f32,
    },
}

/// How an agent uses phones and apps. Feeds prompt context only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DigitalHabits {
    /// Apps the agent uses day to day.
    #[serde(default)]
    pub apps: Vec<String>,
    /// Topics of short videos the agent gravitates to.
    #[serde(default)]
    pub video_topics: Vec<String>,
    /// Rough daily screen time, free text.
    #[serde(default)]
    pub daily_screen_time: String,
}

/// How an agent talks. Feeds prompt context only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageStyle {
    /// Dialect or register descriptor.
    #[serde(default)]
    pub dialect: String,
    /// Phrases the agent habitually uses.
    #[serde(default)]
    pub common_phrases: Vec<String>,
    /// How freely the agent uses emoji, free text.
    #[serde(default)]
    pub emoji_usage: String,
}

/// Static descriptive configuration for one agent.
///
/// Immutable once loaded; everything the simulation mutates lives in the
/// agent runtime, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Unique agent id, referenced by social connections and records.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Age in years, `15..=90`.
    pub age: u8,
    /// Role category, validated against age.
    pub role: CaregiverRole,
    /// Personality trait descriptors.
    #[serde(default)]
    pub traits: Vec<String>,
    /// Topics the agent worries about and brings up.
    #[serde(default)]
    pub concerns: Vec<String>,
    /// Digital-platform habits.
    #[serde(default)]
    pub digital_habits: DigitalHabits,
    /// Language-style descriptors.
    #[serde(default)]
    pub language_style: LanguageStyle,
    /// Ids of agents this one knows directly.
    #[serde(default)]
    pub social_connections: Vec<AgentId>,
    /// Hours of the day (`0..=23`) this agent tends to be up and about.
    #[serde(default)]
    pub active_hours: Vec<u8>,
    /// Probability weight (`0.0..=1.0`) of responding to others.
    #[serde(default = "default_response_probability")]
    pub response_probability: f32,
    /// Probability weight (`0.0..=1.0`) of acting on its own initiative.
    #[serde(default = "default_initiative")]
    pub initiative: f32,
}

/// Default response probability when the profile omits it.
const fn default_response_probability() -> f32 {
    0.7
}

/// Default initiative weight when the profile omits it.
const fn default_initiative() -> f32 {
    0.5
}

impl AgentProfile {
    /// Check the closed-field invariants that cannot be expressed in serde.
    ///
    /// # Errors
    ///
    /// Returns the first [`ProfileError`] found. Cross-profile checks
    /// (unknown social connections, duplicate ids) live in the registry,
    /// which sees the whole roster.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.id.is_empty() {
            return Err(ProfileError::EmptyId);
        }
        if self.name.trim().is_empty() {
            return Err(ProfileError::EmptyName {
                id: self.id.clone(),
            });
        }
        if self.age < AGE_MIN || self.age > AGE_MAX {
            return Err(ProfileError::AgeOutOfRange {
                id: self.id.clone(),
                age: self.age,
            });
        }
        match self.role {
            CaregiverRole::YoungMother if self.age > YOUNG_MOTHER_AGE_CAP => {
                return Err(ProfileError::RoleAgeMismatch {
                    id: self.id.clone(),
                    age: self.age,
                    role: self.role.as_str(),
                });
            }
            CaregiverRole::Grandmother if self.age < GRANDMOTHER_AGE_FLOOR => {
                return Err(ProfileError::RoleAgeMismatch {
                    id: self.id.clone(),
                    age: self.age,
                    role: self.role.as_str(),
                });
            }
            _ => {}
        }
        if let Some(&hour) = self.active_hours.iter().find(|&&h| h > 23) {
            return Err(ProfileError::InvalidActiveHour {
                id: self.id.clone(),
                hour,
            });
        }
        for (field, value) in [
            ("response_probability", self.response_probability),
            ("initiative", self.initiative),
        ] {
            if !(0.0..=1.0).contains(&value) || value.is_nan() {
                return Err(ProfileError::WeightOutOfRange {
                    id: self.id.clone(),
                    field,
                    value,
                });
            }
        }
        Ok(())
    }

    /// Whether the agent is usually up and about at `hour`.
    ///
    /// A profile with no declared active hours is treated as always active.
    pub fn is_active_at(&self, hour: u8) -> bool {
        self.active_hours.is_empty() || self.active_hours.contains(&hour)
    }

    /// One-line persona summary for logs and prompt headers.
    pub fn persona_summary(&self) -> String {
        let traits = self
            .traits
            .iter()
            .take(3)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{name}, {age}, {role} ({traits})",
            name = self.name,
            age = self.age,
            role = self.role.as_str(),
        )
    }
}
