//! File-backed memory store for the Hearthside village simulation.
//!
//! Persists the three record families (memories, conversations, daily
//! plans) plus agent registrations and a scheduler checkpoint in SQLite,
//! and enforces the append-only and transition invariants at this
//! boundary. See [`store::MemoryStore`] for the contract.

pub mod error;
pub mod schema;
pub mod store;

pub use error::StoreError;
pub use store::{ConversationQuery, MemoryQuery, MemoryStore};
