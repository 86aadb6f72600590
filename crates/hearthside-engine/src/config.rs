//! Configuration loading for the engine binary.
//!
//! The canonical configuration lives in `hearthside-config.yaml` at the
//! workspace root. This module defines strongly-typed structs mirroring
//! the YAML structure; every field has a default so a partial file still
//! loads. LLM credentials are referenced by environment-variable name,
//! never stored in the file itself.

use std::path::Path;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        #[from]
        source: serde_yml::Error,
    },
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// Village-level settings (paths, clock).
    #[serde(default)]
    pub village: VillageConfig,

    /// Run bounds.
    #[serde(default)]
    pub bounds: BoundsConfig,

    /// Plan/reflection cadence.
    #[serde(default)]
    pub cadence: CadenceConfig,

    /// Reasoning provider settings.
    #[serde(default)]
    pub reasoning: ReasoningConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on read or parse failure.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yml::from_str(&text)?)
    }
}

/// Village-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VillageConfig {
    /// Display name for logs.
    #[serde(default = "default_village_name")]
    pub name: String,
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Directory of agent profile JSON files.
    #[serde(default = "default_profiles_dir")]
    pub profiles_dir: String,
    /// Ticks that make up one simulated day.
    #[serde(default = "default_ticks_per_day")]
    pub ticks_per_day: u64,
}

impl Default for VillageConfig {
    fn default() -> Self {
        Self {
            name: default_village_name(),
            database_path: default_database_path(),
            profiles_dir: default_profiles_dir(),
            ticks_per_day: default_ticks_per_day(),
        }
    }
}

fn default_village_name() -> String {
    String::from("Hearthside")
}

fn default_database_path() -> String {
    String::from("data/hearthside.sqlite")
}

fn default_profiles_dir() -> String {
    String::from("profiles")
}

const fn default_ticks_per_day() -> u64 {
    24
}

/// Run bounds; zero means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BoundsConfig {
    /// Stop after this many ticks (0 = unlimited).
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
    /// Stop after this many conversations (0 = unlimited).
    #[serde(default = "default_max_conversations")]
    pub max_conversations: u64,
}

impl Default for BoundsConfig {
    fn default() -> Self {
        Self {
            max_ticks: default_max_ticks(),
            max_conversations: default_max_conversations(),
        }
    }
}

const fn default_max_ticks() -> u64 {
    100
}

const fn default_max_conversations() -> u64 {
    50
}

/// Plan/reflection cadence knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CadenceConfig {
    /// Re-plan after this many ticks.
    #[serde(default = "default_plan_interval")]
    pub plan_interval: u64,
    /// Reflect after this many ticks.
    #[serde(default = "default_reflect_interval")]
    pub reflect_interval: u64,
    /// Skip reflection below this energy.
    #[serde(default = "default_min_reflection_energy")]
    pub min_reflection_energy: u8,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            plan_interval: default_plan_interval(),
            reflect_interval: default_reflect_interval(),
            min_reflection_energy: default_min_reflection_energy(),
        }
    }
}

const fn default_plan_interval() -> u64 {
    6
}

const fn default_reflect_interval() -> u64 {
    10
}

const fn default_min_reflection_energy() -> u8 {
    3
}

/// Which reasoning provider the engine wires in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningMode {
    /// Scripted canned drafts; no network, useful for dry runs.
    #[default]
    Scripted,
    /// A real LLM backend.
    Llm,
}

/// Reasoning provider settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReasoningConfig {
    /// Provider mode.
    #[serde(default)]
    pub mode: ReasoningMode,
    /// Backend type name (`openai`, `anthropic`, ...).
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Base API URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// Deadline for one reasoning call, in milliseconds.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    /// Prompt templates directory.
    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            mode: ReasoningMode::default(),
            backend: default_backend(),
            api_url: default_api_url(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            deadline_ms: default_deadline_ms(),
            templates_dir: default_templates_dir(),
        }
    }
}

fn default_backend() -> String {
    String::from("openai")
}

fn default_api_url() -> String {
    String::from("https://api.openai.com/v1")
}

fn default_api_key_env() -> String {
    String::from("HEARTHSIDE_LLM_API_KEY")
}

fn default_model() -> String {
    String::from("gpt-4o-mini")
}

const fn default_deadline_ms() -> u64 {
    7_000
}

fn default_templates_dir() -> String {
    String::from("templates")
}
