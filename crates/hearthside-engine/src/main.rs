//! Engine binary for the Hearthside village simulation.
//!
//! Wires together the profile registry, memory store, reasoning
//! provider, and scheduler, then runs the tick loop until a bound is
//! reached or Ctrl-C requests a stop.
//!
//! # Startup sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load `hearthside-config.yaml` (path overridable as the first
//!    command-line argument)
//! 3. Load and validate agent profiles
//! 4. Open the SQLite store and register the roster
//! 5. Build the reasoning provider (scripted or LLM, per config)
//! 6. Install the Ctrl-C stop hook
//! 7. Run the simulation loop
//! 8. Log the result and final status

mod config;
mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use hearthside_agents::{AgentRuntime, CadencePolicy, ProfileRegistry};
use hearthside_core::{
    ControlState, ReasoningProvider, RunBounds, ScriptedProvider, SimulationResult,
    SimulationState, TickCallback, TickReport, VillageClock, run_simulation,
};
use hearthside_runner::{
    BackendType, LlmBackendConfig, LlmReasoningProvider, ReasonerConfig, RunnerError,
};
use hearthside_store::MemoryStore;

use crate::config::{EngineConfig, ReasoningMode};
use crate::error::EngineError;

/// Tick callback that narrates the run to the log.
struct LoggingCallback;

impl TickCallback for LoggingCallback {
    fn on_tick(&mut self, report: &TickReport, state: &SimulationState) {
        info!(
            tick = state.clock.tick(),
            agent = %report.agent_id,
            action = %report.action_description,
            conversation_sent = report.conversation_sent,
            reflected = report.reflected,
            fallbacks = report.fallbacks,
            "tick completed"
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("hearthside-engine starting");

    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from("hearthside-config.yaml"), PathBuf::from);
    let config = EngineConfig::load(&config_path)?;
    info!(
        village = %config.village.name,
        config = %config_path.display(),
        max_ticks = config.bounds.max_ticks,
        max_conversations = config.bounds.max_conversations,
        reasoning = ?config.reasoning.mode,
        "configuration loaded"
    );

    let result = run(&config).await?;

    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        conversations = result.conversation_count,
        "run finished"
    );
    Ok(())
}

/// Assemble all subsystems from configuration and execute one run.
async fn run(config: &EngineConfig) -> Result<SimulationResult, EngineError> {
    // Profiles first: configuration errors must fail before any tick.
    let registry = ProfileRegistry::load_dir(Path::new(&config.village.profiles_dir))?;
    info!(roster = registry.len(), "profiles loaded");

    let db_path = Path::new(&config.village.database_path);
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let store = MemoryStore::open(db_path).await?;
    for profile in registry.all() {
        store.register_agent(profile).await?;
    }
    info!(database = %db_path.display(), "memory store ready");

    let clock = VillageClock::new(config.village.ticks_per_day)?;
    let runtimes = registry
        .all()
        .map(|profile| AgentRuntime::new(Arc::clone(profile), store.clone()))
        .collect();
    let mut state = SimulationState::new(clock, runtimes);

    let control = Arc::new(ControlState::new());
    let control_for_signal = Arc::clone(&control);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, stopping after the current tick");
            control_for_signal.request_stop();
        }
    });

    let policy = CadencePolicy {
        plan_interval: config.cadence.plan_interval,
        reflect_interval: config.cadence.reflect_interval,
        min_reflection_energy: config.cadence.min_reflection_energy,
    };
    let bounds = RunBounds {
        max_ticks: config.bounds.max_ticks,
        max_conversations: config.bounds.max_conversations,
    };

    let result = match config.reasoning.mode {
        ReasoningMode::Scripted => {
            info!("using scripted reasoning provider (dry run)");
            let mut provider = ScriptedProvider::new();
            drive(&mut state, &store, &mut provider, &policy, &control, &bounds).await?
        }
        ReasoningMode::Llm => {
            let reasoner = build_reasoner_config(config)?;
            info!(
                backend = %config.reasoning.backend,
                model = %config.reasoning.model,
                deadline_ms = config.reasoning.deadline_ms,
                "using LLM reasoning provider"
            );
            let mut provider = LlmReasoningProvider::from_config(&reasoner)?;
            drive(&mut state, &store, &mut provider, &policy, &control, &bounds).await?
        }
    };

    let status = control.status();
    info!(
        tick = status.tick,
        conversations = status.conversation_count,
        agents = status.agents.len(),
        "final status"
    );
    Ok(result)
}

/// Run the scheduler with the logging callback.
async fn drive<P: ReasoningProvider>(
    state: &mut SimulationState,
    store: &MemoryStore,
    provider: &mut P,
    policy: &CadencePolicy,
    control: &Arc<ControlState>,
    bounds: &RunBounds,
) -> Result<SimulationResult, EngineError> {
    let mut callback = LoggingCallback;
    Ok(run_simulation(state, store, provider, policy, control, bounds, &mut callback).await?)
}

/// Translate the engine's reasoning config into the runner's, pulling
/// the API key out of the configured environment variable.
fn build_reasoner_config(config: &EngineConfig) -> Result<ReasonerConfig, EngineError> {
    let api_key = std::env::var(&config.reasoning.api_key_env).map_err(|_| {
        RunnerError::Config(format!(
            "environment variable {} is not set",
            config.reasoning.api_key_env
        ))
    })?;
    Ok(ReasonerConfig {
        backend: LlmBackendConfig {
            backend_type: BackendType::parse(&config.reasoning.backend)?,
            api_url: config.reasoning.api_url.clone(),
            api_key,
            model: config.reasoning.model.clone(),
        },
        deadline: std::time::Duration::from_millis(config.reasoning.deadline_ms),
        templates_dir: config.reasoning.templates_dir.clone(),
    })
}
