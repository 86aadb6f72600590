//! Error types for the memory store.
//!
//! The store distinguishes two families of failure. Durability failures
//! (the SQLite layer erroring, or a row that no longer decodes) are fatal:
//! the scheduler halts the run rather than silently losing history.
//! Invariant rejections (an illegal plan-status transition, a directed
//! conversation naming an unknown receiver) are typed and recoverable:
//! the cognitive workflow discards the offending write and carries on.

use hearthside_types::{AgentId, PlanId, PlanStatus};

/// Errors that can occur in the memory store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The SQLite layer failed. Fatal to the run.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A profile or metadata payload failed to (de)serialize. Fatal.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row no longer decodes into the typed model. Fatal.
    #[error("corrupt row: {reason}")]
    Corrupt {
        /// What failed to decode.
        reason: String,
    },

    /// A plan-status update violated the transition invariant. Recoverable.
    #[error("invalid plan transition for {plan_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        /// The plan whose update was rejected.
        plan_id: PlanId,
        /// The status the plan currently has.
        from: PlanStatus,
        /// The status the caller tried to set.
        to: PlanStatus,
    },

    /// A directed conversation named a receiver that is not a registered
    /// agent. Recoverable.
    #[error("unknown receiver: {agent_id}")]
    UnknownReceiver {
        /// The id that is not in the roster.
        agent_id: AgentId,
    },

    /// A plan id that does not exist was referenced. Recoverable.
    #[error("unknown plan: {plan_id}")]
    UnknownPlan {
        /// The missing plan id.
        plan_id: PlanId,
    },
}

impl StoreError {
    /// Whether this error must halt the run.
    ///
    /// Invariant rejections are part of normal operation; everything else
    /// means the durability layer can no longer be trusted.
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Database(_) | Self::Serialization(_) | Self::Corrupt { .. } => true,
            Self::InvalidTransition { .. }
            | Self::UnknownReceiver { .. }
            | Self::UnknownPlan { .. } => false,
        }
    }
}
