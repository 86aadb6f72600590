//! Error type for the engine binary.

use hearthside_agents::RegistryError;
use hearthside_core::{ClockError, SchedulerError};
use hearthside_runner::RunnerError;
use hearthside_store::StoreError;

use crate::config::ConfigError;

/// Anything that can stop the engine from starting or finishing a run.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Agent profiles could not be loaded or validated.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The memory store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The clock configuration was invalid.
    #[error(transparent)]
    Clock(#[from] ClockError),

    /// The LLM runner could not be assembled.
    #[error(transparent)]
    Runner(#[from] RunnerError),

    /// The simulation run failed.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// A filesystem operation outside the store failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
