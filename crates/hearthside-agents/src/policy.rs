//! Plan and reflection cadence: when an agent bothers to re-plan or to
//! look back.
//!
//! The decision sits behind the injectable [`PlanningPolicy`] trait,
//! evaluated from a snapshot of the runtime state. The stock
//! [`CadencePolicy`] is deterministic on purpose (a dice-roll cadence
//! would make runs unrepeatable): plan when there is nothing pending or
//! the last plan has gone stale, reflect on a fixed interval when there
//! is energy left for it. Callers that want a smarter policy (including
//! one that asks the reasoning provider) plug in their own
//! implementation.

/// Snapshot of the runtime fields a policy may look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeView {
    /// The current tick.
    pub tick: u64,
    /// Current energy, `1..=10`.
    pub energy: u8,
    /// Whether the agent still has pending plan entries.
    pub has_pending_plan: bool,
    /// Ticks since the last plan adoption; `None` if it never planned.
    pub ticks_since_plan: Option<u64>,
    /// Ticks since the last reflection; `None` if it never reflected.
    pub ticks_since_reflection: Option<u64>,
}

/// Decides when an agent plans and when it reflects.
pub trait PlanningPolicy {
    /// Whether the plan phase should run this tick.
    fn should_plan(&self, view: &RuntimeView) -> bool;

    /// Whether the reflect phase should run this tick.
    fn should_reflect(&self, view: &RuntimeView) -> bool;
}

/// Deterministic interval-based policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CadencePolicy {
    /// Re-plan after this many ticks even if entries are still pending.
    pub plan_interval: u64,
    /// Reflect after this many ticks since the last reflection.
    pub reflect_interval: u64,
    /// Skip reflection below this energy level.
    pub min_reflection_energy: u8,
}

impl Default for CadencePolicy {
    fn default() -> Self {
        Self {
            plan_interval: 6,
            reflect_interval: 10,
            min_reflection_energy: 3,
        }
    }
}

impl PlanningPolicy for CadencePolicy {
    fn should_plan(&self, view: &RuntimeView) -> bool {
        if !view.has_pending_plan {
            return true;
        }
        view.ticks_since_plan
            .is_none_or(|elapsed| elapsed >= self.plan_interval)
    }

    fn should_reflect(&self, view: &RuntimeView) -> bool {
        if view.energy < self.min_reflection_energy {
            return false;
        }
        match view.ticks_since_reflection {
            // Never reflected: wait out one full interval from the start
            // of the run so young simulations are not all reflection.
            None => view.tick >= self.reflect_interval,
            Some(elapsed) => elapsed >= self.reflect_interval,
        }
    }
}
