//! SQLite cache layer for journal-sync.
//!
//! This module provides the local mirror of the remote journal using SQLite with:
//! - WAL mode for concurrent reads
//! - Transaction discipline for atomic writes
//! - A per-user sync event log
//!
//! # Submodules
//!
//! - [`events`] - Sync event storage
//! - [`schema`] - Database schema definitions and version checks
//! - [`sqlite`] - Main cache store implementation

pub mod events;
pub mod schema;
pub mod sqlite;

pub use events::{Event, EventType};
pub use sqlite::{CacheCounts, CacheStore, CollectionChanges, MutationContext, StagedChanges};
pub use schema::CURRENT_SCHEMA_VERSION;
