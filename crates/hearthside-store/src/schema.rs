//! SQLite schema for the memory store.
//!
//! Five tables: registered agents, the three append-only record tables,
//! and a single-row checkpoint used to resume bookkeeping after a fatal
//! stop. Each record table has an autoincrement `seq` column; `seq` order
//! is the authoritative append order that queries sort by.

use sqlx::SqlitePool;

use crate::error::StoreError;

/// DDL statements, executed in order by [`init_schema`].
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS agents (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        profile_json TEXT NOT NULL,
        registered_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS memories (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        memory_id TEXT NOT NULL UNIQUE,
        agent_id TEXT NOT NULL,
        kind TEXT NOT NULL,
        content TEXT NOT NULL,
        importance INTEGER NOT NULL,
        tick INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        metadata TEXT NOT NULL DEFAULT '{}'
    )",
    "CREATE INDEX IF NOT EXISTS idx_memories_agent_tick ON memories (agent_id, tick)",
    "CREATE INDEX IF NOT EXISTS idx_memories_kind ON memories (kind)",
    "CREATE TABLE IF NOT EXISTS conversations (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        conversation_id TEXT NOT NULL UNIQUE,
        from_agent TEXT NOT NULL,
        to_agent TEXT,
        kind TEXT NOT NULL,
        message TEXT NOT NULL,
        tick INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_conversations_agents ON conversations (from_agent, to_agent)",
    "CREATE INDEX IF NOT EXISTS idx_conversations_tick ON conversations (tick)",
    "CREATE TABLE IF NOT EXISTS daily_plans (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        plan_id TEXT NOT NULL UNIQUE,
        agent_id TEXT NOT NULL,
        description TEXT NOT NULL,
        priority INTEGER NOT NULL,
        slot TEXT NOT NULL,
        status TEXT NOT NULL,
        tick INTEGER NOT NULL,
        created_at TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_plans_agent_status ON daily_plans (agent_id, status)",
    "CREATE TABLE IF NOT EXISTS checkpoint (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        tick INTEGER NOT NULL,
        conversation_count INTEGER NOT NULL,
        updated_at TEXT NOT NULL
    )",
];

/// Create all tables and indexes if they do not exist yet.
///
/// # Errors
///
/// Returns [`StoreError::Database`] if any DDL statement fails.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::debug!(statements = SCHEMA.len(), "store schema initialized");
    Ok(())
}
