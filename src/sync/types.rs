//! Sync result and status types.

use serde::Serialize;

use crate::model::SyncMetadata;
use crate::storage::{CacheCounts, Event};

/// Per-collection change counts for one sync pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EntityDiff {
    /// Records present remotely but not locally.
    pub added: usize,
    /// Records whose remote copy replaced the local one.
    pub updated: usize,
    /// Local records with no remote counterpart.
    pub deleted: usize,
}

impl EntityDiff {
    #[must_use]
    pub const fn new(added: usize, updated: usize, deleted: usize) -> Self {
        Self {
            added,
            updated,
            deleted,
        }
    }

    /// Total records touched.
    #[must_use]
    pub fn total(&self) -> usize {
        self.added + self.updated + self.deleted
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl std::fmt::Display for EntityDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "+{} ~{} -{}", self.added, self.updated, self.deleted)
    }
}

/// Outcome of a full or incremental sync pass.
///
/// Passes never return `Err`; failures are reported here.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub entries: EntityDiff,
    pub profiles: EntityDiff,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncReport {
    /// A successful pass with the given counts.
    #[must_use]
    pub fn succeeded(entries: EntityDiff, profiles: EntityDiff) -> Self {
        Self {
            entries,
            profiles,
            success: true,
            error: None,
        }
    }

    /// A failed pass. Counts are zero because nothing was written.
    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Whether the pass changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.profiles.is_empty()
    }

    /// Short human summary used for event log details.
    #[must_use]
    pub fn summary(&self) -> String {
        match &self.error {
            Some(err) => err.clone(),
            None => format!("entries {} profiles {}", self.entries, self.profiles),
        }
    }
}

/// Which reconciliation a pass performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    Full,
    Incremental,
}

impl SyncKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full_sync",
            Self::Incremental => "incremental_sync",
        }
    }
}

/// Sync state of one user's cache, for display.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub user_id: String,
    /// `None` until the first full sync completes.
    pub metadata: Option<SyncMetadata>,
    pub counts: CacheCounts,
    pub current_profile_id: String,
    pub recent_events: Vec<Event>,
}

impl SyncStatus {
    /// Whether the next pass must be a full sync.
    #[must_use]
    pub fn needs_full_sync(&self) -> bool {
        self.metadata.is_none()
    }
}
