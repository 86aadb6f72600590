//! The memory store: durable, queryable log of typed records per agent.
//!
//! One [`MemoryStore`] wraps a SQLite connection pool and exposes the
//! append/query/update contract the rest of the simulation is built on:
//!
//! - appends are atomic and immediately visible to subsequent reads
//!   (single pool, no write-behind caching), because downstream prompts
//!   must see same-tick updates;
//! - records are never edited, and deleted only by [`retention_cleanup`];
//! - the plan-status transition invariant and the conversation receiver
//!   invariant are enforced here, at the store boundary, with typed
//!   recoverable errors;
//! - the plan phase's dual write (authoritative `daily_plans` rows plus an
//!   informational plan-kind memory mirror) goes through one transaction
//!   in [`adopt_plan`].
//!
//! The store is safe under the simulation's sequential execution model: a
//! single logical thread of control performs all writes. Queries decode
//! rows eagerly into `Vec`s; a row that no longer decodes is a fatal
//! [`StoreError::Corrupt`].
//!
//! [`retention_cleanup`]: MemoryStore::retention_cleanup
//! [`adopt_plan`]: MemoryStore::adopt_plan

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use hearthside_types::{
    AgentId, AgentProfile, Conversation, ConversationId, ConversationKind, DailyPlan, Memory,
    MemoryId, MemoryKind, PlanId, PlanStatus, TimeOfDay,
};

use crate::error::StoreError;
use crate::schema;

/// Filters for a memory query. Unset fields do not constrain the result.
///
/// Results are always ordered recency-descending by append order.
#[derive(Debug, Clone, Default)]
pub struct MemoryQuery {
    /// Only memories owned by this agent.
    pub agent_id: Option<AgentId>,
    /// Only memories owned by agents other than this one.
    pub exclude_agent: Option<AgentId>,
    /// Only memories of this kind.
    pub kind: Option<MemoryKind>,
    /// Only memories whose content contains this substring.
    pub contains: Option<String>,
    /// Only memories created at or after this tick.
    pub since_tick: Option<u64>,
    /// Only memories created at or before this tick.
    pub until_tick: Option<u64>,
    /// Maximum number of rows to return.
    pub limit: Option<u32>,
}

impl MemoryQuery {
    /// Query scoped to one agent's memories.
    pub fn for_agent(agent_id: &AgentId) -> Self {
        Self {
            agent_id: Some(agent_id.clone()),
            ..Self::default()
        }
    }

    /// Restrict to one memory kind.
    #[must_use]
    pub fn with_kind(mut self, kind: MemoryKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Restrict to memories created at or after `tick`.
    #[must_use]
    pub const fn since(mut self, tick: u64) -> Self {
        self.since_tick = Some(tick);
        self
    }

    /// Cap the number of rows returned.
    #[must_use]
    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Filters for a conversation query. Unset fields do not constrain the
/// result. Results are ordered recency-descending by append order.
#[derive(Debug, Clone, Default)]
pub struct ConversationQuery {
    /// Only conversations visible to this agent: sent by it, addressed to
    /// it, or broadcast to the shared channel.
    pub visible_to: Option<AgentId>,
    /// Exclude conversations sent by this agent.
    pub not_from: Option<AgentId>,
    /// Only conversations sent at or after this tick.
    pub since_tick: Option<u64>,
    /// Maximum number of rows to return.
    pub limit: Option<u32>,
}

impl ConversationQuery {
    /// Query for everything an agent can see.
    pub fn visible_to(agent_id: &AgentId) -> Self {
        Self {
            visible_to: Some(agent_id.clone()),
            ..Self::default()
        }
    }

    /// Drop the agent's own outgoing messages from the result.
    #[must_use]
    pub fn excluding_sender(mut self, agent_id: &AgentId) -> Self {
        self.not_from = Some(agent_id.clone());
        self
    }

    /// Restrict to conversations sent at or after `tick`.
    #[must_use]
    pub const fn since(mut self, tick: u64) -> Self {
        self.since_tick = Some(tick);
        self
    }

    /// Cap the number of rows returned.
    #[must_use]
    pub const fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Handle to the SQLite-backed memory store. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    pool: SqlitePool,
}

impl MemoryStore {
    /// Open (creating if missing) a file-backed store and initialize its
    /// schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the file cannot be opened or
    /// the schema cannot be created.
    pub async fn open(path: &Path) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let store = Self { pool };
        schema::init_schema(&store.pool).await?;
        Ok(store)
    }

    /// Open an in-memory store, used by tests and dry runs.
    ///
    /// A single connection is used so that every handle sees the same
    /// in-memory database.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on connection or schema failure.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        schema::init_schema(&store.pool).await?;
        Ok(store)
    }

    // -----------------------------------------------------------------------
    // Agents
    // -----------------------------------------------------------------------

    /// Register an agent profile, replacing any previous registration.
    ///
    /// Directed-conversation receiver validation checks against this table,
    /// so every roster member must be registered before the run starts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the profile cannot be
    /// serialized, or [`StoreError::Database`] on write failure.
    pub async fn register_agent(&self, profile: &AgentProfile) -> Result<(), StoreError> {
        let profile_json = serde_json::to_string(profile)?;
        sqlx::query(
            "INSERT OR REPLACE INTO agents (id, name, profile_json, registered_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(profile.id.as_str().to_owned())
        .bind(profile.name.clone())
        .bind(profile_json)
        .bind(fmt_ts(&Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Ids of all registered agents, in id order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on read failure.
    pub async fn agent_ids(&self) -> Result<Vec<AgentId>, StoreError> {
        let rows = sqlx::query("SELECT id FROM agents ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                let id: String = row.try_get("id")?;
                Ok(AgentId::from(id))
            })
            .collect()
    }

    async fn agent_exists(&self, agent_id: &AgentId) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM agents WHERE id = ?1")
            .bind(agent_id.as_str().to_owned())
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n > 0)
    }

    // -----------------------------------------------------------------------
    // Appends
    // -----------------------------------------------------------------------

    /// Append one memory record. Returns its stable id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on write failure (fatal).
    pub async fn append_memory(&self, memory: &Memory) -> Result<MemoryId, StoreError> {
        insert_memory(&self.pool, memory).await?;
        Ok(memory.id)
    }

    /// Append one conversation record. Returns its stable id.
    ///
    /// A directed conversation (non-null receiver) is rejected with
    /// [`StoreError::UnknownReceiver`] unless the receiver is a registered
    /// agent. Broadcasts are always accepted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownReceiver`] (recoverable) for a bad
    /// receiver, or [`StoreError::Database`] (fatal) on write failure.
    pub async fn append_conversation(
        &self,
        conversation: &Conversation,
    ) -> Result<ConversationId, StoreError> {
        if let Some(receiver) = &conversation.to_agent
            && !self.agent_exists(receiver).await?
        {
            return Err(StoreError::UnknownReceiver {
                agent_id: receiver.clone(),
            });
        }

        sqlx::query(
            "INSERT INTO conversations
                (conversation_id, from_agent, to_agent, kind, message, tick, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(conversation.id.to_string())
        .bind(conversation.from_agent.as_str().to_owned())
        .bind(
            conversation
                .to_agent
                .as_ref()
                .map(|a| a.as_str().to_owned()),
        )
        .bind(conversation.kind.as_str())
        .bind(conversation.message.clone())
        .bind(tick_to_db(conversation.tick))
        .bind(fmt_ts(&conversation.created_at))
        .execute(&self.pool)
        .await?;
        Ok(conversation.id)
    }

    // -----------------------------------------------------------------------
    // Daily plans
    // -----------------------------------------------------------------------

    /// Adopt a new daily plan for an agent: one transaction that marks the
    /// agent's stale pending plans skipped, inserts the new plan rows, and
    /// appends the informational plan-kind memory mirror.
    ///
    /// The `daily_plans` rows are authoritative for status transitions;
    /// the mirror memory is informational only. Returns how many stale
    /// pending plans were skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on write failure (fatal); the
    /// transaction rolls back and nothing is visible.
    pub async fn adopt_plan(
        &self,
        agent_id: &AgentId,
        plans: &[DailyPlan],
        mirror: &Memory,
    ) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Pending -> Skipped is legal by construction, so the bulk update
        // does not need per-row transition checks.
        let skipped = sqlx::query(
            "UPDATE daily_plans SET status = 'skipped'
             WHERE agent_id = ?1 AND status = 'pending'",
        )
        .bind(agent_id.as_str().to_owned())
        .execute(&mut *tx)
        .await?
        .rows_affected();

        for plan in plans {
            sqlx::query(
                "INSERT INTO daily_plans
                    (plan_id, agent_id, description, priority, slot, status, tick, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )
            .bind(plan.id.to_string())
            .bind(plan.agent_id.as_str().to_owned())
            .bind(plan.description.clone())
            .bind(i64::from(plan.priority))
            .bind(plan.slot.as_str())
            .bind(plan.status.as_str())
            .bind(tick_to_db(plan.tick))
            .bind(fmt_ts(&plan.created_at))
            .execute(&mut *tx)
            .await?;
        }

        insert_memory(&mut *tx, mirror).await?;
        tx.commit().await?;

        tracing::debug!(
            agent = %agent_id,
            adopted = plans.len(),
            skipped,
            "daily plan adopted"
        );
        Ok(skipped)
    }

    /// Pending plan entries for an agent, highest priority first, ties
    /// broken by append order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on read failure or
    /// [`StoreError::Corrupt`] if a row no longer decodes.
    pub async fn pending_plans(&self, agent_id: &AgentId) -> Result<Vec<DailyPlan>, StoreError> {
        let rows = sqlx::query(
            "SELECT plan_id, agent_id, description, priority, slot, status, tick, created_at
             FROM daily_plans
             WHERE agent_id = ?1 AND status = 'pending'
             ORDER BY priority DESC, seq ASC",
        )
        .bind(agent_id.as_str().to_owned())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_plan).collect()
    }

    /// Update one plan's status, enforcing the transition invariant:
    /// only `pending -> completed` and `pending -> skipped` are legal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownPlan`] if the plan does not exist,
    /// [`StoreError::InvalidTransition`] if the transition is illegal
    /// (both recoverable), or [`StoreError::Database`] on failure (fatal).
    pub async fn update_plan_status(
        &self,
        plan_id: PlanId,
        new_status: PlanStatus,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT status FROM daily_plans WHERE plan_id = ?1")
            .bind(plan_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        let Some(row) = row else {
            return Err(StoreError::UnknownPlan { plan_id });
        };
        let status_text: String = row.try_get("status")?;
        let current = PlanStatus::parse(&status_text).ok_or_else(|| StoreError::Corrupt {
            reason: format!("plan {plan_id} has unknown status '{status_text}'"),
        })?;

        if !current.can_transition_to(new_status) {
            return Err(StoreError::InvalidTransition {
                plan_id,
                from: current,
                to: new_status,
            });
        }

        sqlx::query("UPDATE daily_plans SET status = ?1 WHERE plan_id = ?2")
            .bind(new_status.as_str())
            .bind(plan_id.to_string())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Memories matching the query, newest append first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on read failure or
    /// [`StoreError::Corrupt`] if a row no longer decodes.
    pub async fn memories(&self, query: &MemoryQuery) -> Result<Vec<Memory>, StoreError> {
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT memory_id, agent_id, kind, content, importance, tick, created_at, metadata
             FROM memories WHERE 1 = 1",
        );
        if let Some(agent_id) = &query.agent_id {
            qb.push(" AND agent_id = ");
            qb.push_bind(agent_id.as_str().to_owned());
        }
        if let Some(excluded) = &query.exclude_agent {
            qb.push(" AND agent_id <> ");
            qb.push_bind(excluded.as_str().to_owned());
        }
        if let Some(kind) = query.kind {
            qb.push(" AND kind = ");
            qb.push_bind(kind.as_str());
        }
        if let Some(text) = &query.contains {
            qb.push(" AND content LIKE ");
            qb.push_bind(format!("%{text}%"));
        }
        if let Some(since) = query.since_tick {
            qb.push(" AND tick >= ");
            qb.push_bind(tick_to_db(since));
        }
        if let Some(until) = query.until_tick {
            qb.push(" AND tick <= ");
            qb.push_bind(tick_to_db(until));
        }
        qb.push(" ORDER BY seq DESC");
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ");
            qb.push_bind(i64::from(limit));
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_memory).collect()
    }

    /// Conversations matching the query, newest append first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on read failure or
    /// [`StoreError::Corrupt`] if a row no longer decodes.
    pub async fn conversations(
        &self,
        query: &ConversationQuery,
    ) -> Result<Vec<Conversation>, StoreError> {
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT conversation_id, from_agent, to_agent, kind, message, tick, created_at
             FROM conversations WHERE 1 = 1",
        );
        if let Some(agent_id) = &query.visible_to {
            qb.push(" AND (from_agent = ");
            qb.push_bind(agent_id.as_str().to_owned());
            qb.push(" OR to_agent = ");
            qb.push_bind(agent_id.as_str().to_owned());
            qb.push(" OR to_agent IS NULL)");
        }
        if let Some(sender) = &query.not_from {
            qb.push(" AND from_agent <> ");
            qb.push_bind(sender.as_str().to_owned());
        }
        if let Some(since) = query.since_tick {
            qb.push(" AND tick >= ");
            qb.push_bind(tick_to_db(since));
        }
        qb.push(" ORDER BY seq DESC");
        if let Some(limit) = query.limit {
            qb.push(" LIMIT ");
            qb.push_bind(i64::from(limit));
        }

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_conversation).collect()
    }

    /// Count memories, optionally filtered by owner and kind.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on read failure.
    pub async fn count_memories(
        &self,
        agent_id: Option<&AgentId>,
        kind: Option<MemoryKind>,
    ) -> Result<u64, StoreError> {
        let mut qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) AS n FROM memories WHERE 1 = 1");
        if let Some(agent_id) = agent_id {
            qb.push(" AND agent_id = ");
            qb.push_bind(agent_id.as_str().to_owned());
        }
        if let Some(kind) = kind {
            qb.push(" AND kind = ");
            qb.push_bind(kind.as_str());
        }
        let row = qb.build().fetch_one(&self.pool).await?;
        let n: i64 = row.try_get("n")?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    // -----------------------------------------------------------------------
    // Retention & checkpoint
    // -----------------------------------------------------------------------

    /// Delete memories, conversations, and plans created before `horizon`.
    /// Returns the total number of rows removed.
    ///
    /// This is the only deletion path in the store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on failure (fatal).
    pub async fn retention_cleanup(&self, horizon: DateTime<Utc>) -> Result<u64, StoreError> {
        let cutoff = fmt_ts(&horizon);
        let mut removed: u64 = 0;
        for table in ["memories", "conversations", "daily_plans"] {
            let result = sqlx::query(&format!("DELETE FROM {table} WHERE created_at < ?1"))
                .bind(cutoff.clone())
                .execute(&self.pool)
                .await?;
            removed = removed.saturating_add(result.rows_affected());
        }
        tracing::info!(removed, cutoff = %cutoff, "retention cleanup");
        Ok(removed)
    }

    /// Persist the scheduler's bookkeeping so a caller can resume from the
    /// last consistent tick after a fatal stop.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on write failure (fatal).
    pub async fn save_checkpoint(
        &self,
        tick: u64,
        conversation_count: u64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO checkpoint (id, tick, conversation_count, updated_at)
             VALUES (1, ?1, ?2, ?3)",
        )
        .bind(tick_to_db(tick))
        .bind(tick_to_db(conversation_count))
        .bind(fmt_ts(&Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Load the last checkpoint, if one was ever saved.
    ///
    /// Returns `(tick, conversation_count)`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] on read failure or
    /// [`StoreError::Corrupt`] for a negative counter.
    pub async fn load_checkpoint(&self) -> Result<Option<(u64, u64)>, StoreError> {
        let row = sqlx::query("SELECT tick, conversation_count FROM checkpoint WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let tick: i64 = row.try_get("tick")?;
        let count: i64 = row.try_get("conversation_count")?;
        Ok(Some((tick_from_db(tick)?, tick_from_db(count)?)))
    }
}

/// Insert a memory row through any executor (pool or open transaction).
async fn insert_memory<'e, E>(executor: E, memory: &Memory) -> Result<(), StoreError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let metadata = serde_json::to_string(&memory.metadata)?;
    sqlx::query(
        "INSERT INTO memories
            (memory_id, agent_id, kind, content, importance, tick, created_at, metadata)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )
    .bind(memory.id.to_string())
    .bind(memory.agent_id.as_str().to_owned())
    .bind(memory.kind.as_str())
    .bind(memory.content.clone())
    .bind(i64::from(memory.importance))
    .bind(tick_to_db(memory.tick))
    .bind(fmt_ts(&memory.created_at))
    .bind(metadata)
    .execute(executor)
    .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

fn row_to_memory(row: &sqlx::sqlite::SqliteRow) -> Result<Memory, StoreError> {
    let kind_text: String = row.try_get("kind")?;
    let kind = MemoryKind::parse(&kind_text).ok_or_else(|| StoreError::Corrupt {
        reason: format!("unknown memory kind '{kind_text}'"),
    })?;
    let agent_id: String = row.try_get("agent_id")?;
    let content: String = row.try_get("content")?;
    let importance: i64 = row.try_get("importance")?;
    let tick: i64 = row.try_get("tick")?;
    let created_at: String = row.try_get("created_at")?;
    let metadata_text: String = row.try_get("metadata")?;

    Ok(Memory {
        id: MemoryId::from(parse_uuid(row, "memory_id")?),
        agent_id: AgentId::from(agent_id),
        kind,
        content,
        importance: u8::try_from(importance.clamp(1, 10)).unwrap_or(1),
        tick: tick_from_db(tick)?,
        created_at: parse_ts(&created_at)?,
        metadata: serde_json::from_str(&metadata_text)?,
    })
}

fn row_to_conversation(row: &sqlx::sqlite::SqliteRow) -> Result<Conversation, StoreError> {
    let kind_text: String = row.try_get("kind")?;
    let kind = ConversationKind::parse(&kind_text).ok_or_else(|| StoreError::Corrupt {
        reason: format!("unknown conversation kind '{kind_text}'"),
    })?;
    let from_agent: String = row.try_get("from_agent")?;
    let to_agent: Option<String> = row.try_get("to_agent")?;
    let message: String = row.try_get("message")?;
    let tick: i64 = row.try_get("tick")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Conversation {
        id: ConversationId::from(parse_uuid(row, "conversation_id")?),
        from_agent: AgentId::from(from_agent),
        to_agent: to_agent.map(AgentId::from),
        kind,
        message,
        tick: tick_from_db(tick)?,
        created_at: parse_ts(&created_at)?,
    })
}

fn row_to_plan(row: &sqlx::sqlite::SqliteRow) -> Result<DailyPlan, StoreError> {
    let slot_text: String = row.try_get("slot")?;
    let slot = TimeOfDay::parse(&slot_text).ok_or_else(|| StoreError::Corrupt {
        reason: format!("unknown plan slot '{slot_text}'"),
    })?;
    let status_text: String = row.try_get("status")?;
    let status = PlanStatus::parse(&status_text).ok_or_else(|| StoreError::Corrupt {
        reason: format!("unknown plan status '{status_text}'"),
    })?;
    let agent_id: String = row.try_get("agent_id")?;
    let description: String = row.try_get("description")?;
    let priority: i64 = row.try_get("priority")?;
    let tick: i64 = row.try_get("tick")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(DailyPlan {
        id: PlanId::from(parse_uuid(row, "plan_id")?),
        agent_id: AgentId::from(agent_id),
        description,
        priority: u8::try_from(priority.clamp(1, 10)).unwrap_or(1),
        slot,
        status,
        tick: tick_from_db(tick)?,
        created_at: parse_ts(&created_at)?,
    })
}

fn parse_uuid(row: &sqlx::sqlite::SqliteRow, column: &str) -> Result<Uuid, StoreError> {
    let text: String = row.try_get(column)?;
    Uuid::parse_str(&text).map_err(|e| StoreError::Corrupt {
        reason: format!("column {column} holds invalid uuid '{text}': {e}"),
    })
}

// ---------------------------------------------------------------------------
// Scalar conversions
// ---------------------------------------------------------------------------

/// Ticks and counters are stored as `INTEGER`; values beyond `i64::MAX`
/// saturate, which is unreachable in practice.
const fn tick_to_db(tick: u64) -> i64 {
    if tick > i64::MAX as u64 {
        i64::MAX
    } else {
        tick as i64
    }
}

fn tick_from_db(value: i64) -> Result<u64, StoreError> {
    u64::try_from(value).map_err(|_| StoreError::Corrupt {
        reason: format!("negative tick {value} in store"),
    })
}

/// Fixed-precision RFC 3339 so that stored timestamps compare
/// lexicographically in the retention DELETE.
fn fmt_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(text: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            reason: format!("invalid timestamp '{text}': {e}"),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;
    use hearthside_types::CaregiverRole;

    use super::*;

    fn profile(id: &str, name: &str) -> AgentProfile {
        AgentProfile {
            id: AgentId::from(id),
            name: String::from(name),
            age: 30,
            role: CaregiverRole::YoungMother,
            traits: Vec::new(),
            concerns: Vec::new(),
            digital_habits: hearthside_types::DigitalHabits::default(),
            language_style: hearthside_types::LanguageStyle::default(),
            social_connections: Vec::new(),
            active_hours: Vec::new(),
            response_probability: 0.7,
            initiative: 0.5,
        }
    }

    async fn store_with_agents(ids: &[&str]) -> MemoryStore {
        let store = MemoryStore::in_memory().await.unwrap();
        for id in ids {
            store.register_agent(&profile(id, id)).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn append_and_query_memories_by_owner() {
        let store = store_with_agents(&["amei", "lian"]).await;
        let amei = AgentId::from("amei");
        let lian = AgentId::from("lian");

        store
            .append_memory(&Memory::new(amei.clone(), MemoryKind::Action, "fed the baby", 5, 1))
            .await
            .unwrap();
        store
            .append_memory(&Memory::new(lian.clone(), MemoryKind::Action, "hung laundry", 4, 1))
            .await
            .unwrap();

        let mine = store.memories(&MemoryQuery::for_agent(&amei)).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert!(mine.iter().all(|m| m.agent_id == amei));
    }

    #[tokio::test]
    async fn memories_are_returned_in_reverse_append_order() {
        let store = store_with_agents(&["amei"]).await;
        let amei = AgentId::from("amei");

        for (tick, text) in [(1_u64, "first"), (2, "second"), (3, "third")] {
            store
                .append_memory(&Memory::new(amei.clone(), MemoryKind::Observation, text, 3, tick))
                .await
                .unwrap();
        }

        let all = store.memories(&MemoryQuery::for_agent(&amei)).await.unwrap();
        let contents: Vec<&str> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn memory_query_filters_compose() {
        let store = store_with_agents(&["amei"]).await;
        let amei = AgentId::from("amei");

        store
            .append_memory(&Memory::new(amei.clone(), MemoryKind::Learning, "sleep schedule tip", 6, 2))
            .await
            .unwrap();
        store
            .append_memory(&Memory::new(amei.clone(), MemoryKind::Learning, "weaning recipe", 6, 5))
            .await
            .unwrap();
        store
            .append_memory(&Memory::new(amei.clone(), MemoryKind::Concern, "sleep regression", 8, 6))
            .await
            .unwrap();

        let query = MemoryQuery {
            agent_id: Some(amei.clone()),
            kind: Some(MemoryKind::Learning),
            contains: Some(String::from("sleep")),
            since_tick: Some(1),
            ..MemoryQuery::default()
        };
        let hits = store.memories(&query).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].content, "sleep schedule tip");
    }

    #[tokio::test]
    async fn exclude_agent_filter_returns_only_others() {
        let store = store_with_agents(&["amei", "lian"]).await;
        let amei = AgentId::from("amei");
        let lian = AgentId::from("lian");

        store
            .append_memory(&Memory::new(amei.clone(), MemoryKind::Action, "mine", 5, 1))
            .await
            .unwrap();
        store
            .append_memory(&Memory::new(lian, MemoryKind::Action, "theirs", 5, 1))
            .await
            .unwrap();

        let query = MemoryQuery {
            exclude_agent: Some(amei),
            kind: Some(MemoryKind::Action),
            ..MemoryQuery::default()
        };
        let others = store.memories(&query).await.unwrap();
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].content, "theirs");
    }

    #[tokio::test]
    async fn directed_conversation_requires_known_receiver() {
        let store = store_with_agents(&["amei"]).await;
        let c = Conversation::new(
            AgentId::from("amei"),
            Some(AgentId::from("stranger")),
            ConversationKind::Chat,
            "hello?",
            1,
        );
        let err = store.append_conversation(&c).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownReceiver { .. }));
        assert!(!err.is_fatal());

        // The rejected write left nothing behind.
        let visible = store
            .conversations(&ConversationQuery::default())
            .await
            .unwrap();
        assert!(visible.is_empty());
    }

    #[tokio::test]
    async fn broadcast_needs_no_receiver_check() {
        let store = store_with_agents(&["amei"]).await;
        let c = Conversation::new(
            AgentId::from("amei"),
            None,
            ConversationKind::Chat,
            "morning all",
            1,
        );
        assert!(store.append_conversation(&c).await.is_ok());
    }

    #[tokio::test]
    async fn conversation_visibility_covers_broadcast_and_directed() {
        let store = store_with_agents(&["amei", "lian", "granny_hua"]).await;
        let amei = AgentId::from("amei");
        let lian = AgentId::from("lian");
        let granny = AgentId::from("granny_hua");

        // Broadcast from lian, directed to amei from granny, private between
        // lian and granny (invisible to amei).
        store
            .append_conversation(&Conversation::new(
                lian.clone(),
                None,
                ConversationKind::Share,
                "found a good lullaby video",
                1,
            ))
            .await
            .unwrap();
        store
            .append_conversation(&Conversation::new(
                granny.clone(),
                Some(amei.clone()),
                ConversationKind::Advice,
                "rub some ginger on it",
                2,
            ))
            .await
            .unwrap();
        store
            .append_conversation(&Conversation::new(
                lian,
                Some(granny),
                ConversationKind::Chat,
                "tea later?",
                3,
            ))
            .await
            .unwrap();

        let visible = store
            .conversations(&ConversationQuery::visible_to(&amei))
            .await
            .unwrap();
        assert_eq!(visible.len(), 2);

        let incoming = store
            .conversations(&ConversationQuery::visible_to(&amei).excluding_sender(&amei))
            .await
            .unwrap();
        assert_eq!(incoming.len(), 2);
    }

    #[tokio::test]
    async fn adopt_plan_dual_write_is_atomic_and_skips_stale_plans() {
        let store = store_with_agents(&["amei"]).await;
        let amei = AgentId::from("amei");

        let first = vec![DailyPlan::new(
            amei.clone(),
            "ask about teething",
            7,
            TimeOfDay::Morning,
            1,
        )];
        let mirror = Memory::new(amei.clone(), MemoryKind::Plan, "planned: ask about teething", 5, 1);
        let skipped = store.adopt_plan(&amei, &first, &mirror).await.unwrap();
        assert_eq!(skipped, 0);

        let second = vec![DailyPlan::new(
            amei.clone(),
            "rest in the afternoon",
            3,
            TimeOfDay::Afternoon,
            4,
        )];
        let mirror2 = Memory::new(amei.clone(), MemoryKind::Plan, "planned: rest", 4, 4);
        let skipped = store.adopt_plan(&amei, &second, &mirror2).await.unwrap();
        assert_eq!(skipped, 1);

        let pending = store.pending_plans(&amei).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].description, "rest in the afternoon");

        let mirrors = store
            .memories(&MemoryQuery::for_agent(&amei).with_kind(MemoryKind::Plan))
            .await
            .unwrap();
        assert_eq!(mirrors.len(), 2);
    }

    #[tokio::test]
    async fn pending_plans_order_by_priority_then_append() {
        let store = store_with_agents(&["amei"]).await;
        let amei = AgentId::from("amei");

        let plans = vec![
            DailyPlan::new(amei.clone(), "low", 2, TimeOfDay::Morning, 1),
            DailyPlan::new(amei.clone(), "high", 9, TimeOfDay::Morning, 1),
            DailyPlan::new(amei.clone(), "also high", 9, TimeOfDay::Evening, 1),
        ];
        let mirror = Memory::new(amei.clone(), MemoryKind::Plan, "planned 3 steps", 5, 1);
        store.adopt_plan(&amei, &plans, &mirror).await.unwrap();

        let pending = store.pending_plans(&amei).await.unwrap();
        let order: Vec<&str> = pending.iter().map(|p| p.description.as_str()).collect();
        assert_eq!(order, vec!["high", "also high", "low"]);
    }

    #[tokio::test]
    async fn plan_status_transitions_are_enforced() {
        let store = store_with_agents(&["amei"]).await;
        let amei = AgentId::from("amei");

        let plan = DailyPlan::new(amei.clone(), "step", 5, TimeOfDay::Morning, 1);
        let plan_id = plan.id;
        let mirror = Memory::new(amei.clone(), MemoryKind::Plan, "planned: step", 5, 1);
        store.adopt_plan(&amei, &[plan], &mirror).await.unwrap();

        // Legal: pending -> completed.
        store
            .update_plan_status(plan_id, PlanStatus::Completed)
            .await
            .unwrap();

        // Illegal: completed -> skipped.
        let err = store
            .update_plan_status(plan_id, PlanStatus::Skipped)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        // Illegal: completed -> pending.
        let err = store
            .update_plan_status(plan_id, PlanStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn skipped_plan_never_becomes_completed() {
        let store = store_with_agents(&["amei"]).await;
        let amei = AgentId::from("amei");

        let plan = DailyPlan::new(amei.clone(), "stale step", 5, TimeOfDay::Morning, 1);
        let plan_id = plan.id;
        let mirror = Memory::new(amei.clone(), MemoryKind::Plan, "planned", 5, 1);
        store.adopt_plan(&amei, &[plan], &mirror).await.unwrap();

        // A later adoption skips the stale plan.
        let mirror2 = Memory::new(amei.clone(), MemoryKind::Plan, "replanned", 5, 2);
        store.adopt_plan(&amei, &[], &mirror2).await.unwrap();

        let err = store
            .update_plan_status(plan_id, PlanStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidTransition {
                from: PlanStatus::Skipped,
                to: PlanStatus::Completed,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn unknown_plan_is_recoverable() {
        let store = store_with_agents(&["amei"]).await;
        let err = store
            .update_plan_status(PlanId::new(), PlanStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownPlan { .. }));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn retention_cleanup_removes_only_old_rows() {
        let store = store_with_agents(&["amei"]).await;
        let amei = AgentId::from("amei");

        let mut old = Memory::new(amei.clone(), MemoryKind::Action, "long ago", 3, 1);
        old.created_at = Utc::now() - Duration::days(30);
        store.append_memory(&old).await.unwrap();
        store
            .append_memory(&Memory::new(amei.clone(), MemoryKind::Action, "just now", 3, 100))
            .await
            .unwrap();

        let mut old_conv =
            Conversation::new(amei.clone(), None, ConversationKind::Chat, "ancient chatter", 1);
        old_conv.created_at = Utc::now() - Duration::days(30);
        store.append_conversation(&old_conv).await.unwrap();

        let removed = store
            .retention_cleanup(Utc::now() - Duration::days(7))
            .await
            .unwrap();
        assert_eq!(removed, 2);

        let left = store.memories(&MemoryQuery::for_agent(&amei)).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].content, "just now");
    }

    #[tokio::test]
    async fn checkpoint_roundtrip() {
        let store = store_with_agents(&[]).await;
        assert_eq!(store.load_checkpoint().await.unwrap(), None);

        store.save_checkpoint(42, 7).await.unwrap();
        assert_eq!(store.load_checkpoint().await.unwrap(), Some((42, 7)));

        store.save_checkpoint(43, 8).await.unwrap();
        assert_eq!(store.load_checkpoint().await.unwrap(), Some((43, 8)));
    }

    #[tokio::test]
    async fn writes_are_immediately_visible() {
        let store = store_with_agents(&["amei"]).await;
        let amei = AgentId::from("amei");
        let reader = store.clone();

        store
            .append_memory(&Memory::new(amei.clone(), MemoryKind::Observation, "visible", 3, 1))
            .await
            .unwrap();
        let seen = reader.memories(&MemoryQuery::for_agent(&amei)).await.unwrap();
        assert_eq!(seen.len(), 1);
    }

    #[tokio::test]
    async fn metadata_survives_roundtrip() {
        let store = store_with_agents(&["amei"]).await;
        let amei = AgentId::from("amei");

        let memory = Memory::new(amei.clone(), MemoryKind::Concern, "rash is back", 8, 3)
            .with_metadata(serde_json::json!({"child": "xiaobao", "severity": 2}));
        store.append_memory(&memory).await.unwrap();

        let loaded = store.memories(&MemoryQuery::for_agent(&amei)).await.unwrap();
        assert_eq!(loaded[0].metadata["child"], "xiaobao");
        assert_eq!(loaded[0].metadata["severity"], 2);
    }
}
