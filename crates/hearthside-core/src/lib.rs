//! Simulation core for the Hearthside village: clock, cognitive
//! workflow, scheduler, and control surface.
//!
//! The crate is the orchestrator the rest of the workspace plugs into:
//! profiles and runtimes come from `hearthside-agents`, persistence from
//! `hearthside-store`, and generative reasoning from any
//! [`provider::ReasoningProvider`] implementation (the LLM-backed one
//! lives in `hearthside-runner`; scripted and failing ones live here for
//! tests and dry runs).
//!
//! A caller drives a run through four entry points: build a
//! [`scheduler::SimulationState`], call [`scheduler::run_simulation`],
//! poke the shared [`operator::ControlState`] for stop/pause/status, and
//! use [`operator::agent_detail`] for a per-agent drill-down.

pub mod clock;
pub mod operator;
pub mod provider;
pub mod scheduler;
pub mod workflow;

pub use clock::{ClockError, VillageClock};
pub use operator::{
    AgentDetail, ControlState, SimulationEndReason, SimulationStatus, agent_detail,
};
pub use provider::{FailingProvider, ProviderError, ReasoningProvider, ScriptedProvider};
pub use scheduler::{
    NoOpCallback, RunBounds, SchedulerError, SimulationResult, SimulationState, TickCallback,
    run_simulation,
};
pub use workflow::{RosterEntry, TickContext, TickReport, WorkflowError, run_cycle};
