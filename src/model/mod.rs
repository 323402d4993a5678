//! Data models for journal-sync.
//!
//! This module contains all domain models:
//! - JournalEntry (with highlights and conversation)
//! - Profile
//! - Settings
//! - SyncMetadata

pub mod entry;
pub mod profile;
pub mod settings;

pub use entry::{ConversationMessage, Highlight, JournalEntry, Role};
pub use profile::{mark_current, resolve_current_id, Profile, DEFAULT_PROFILE_ID, DEFAULT_PROFILE_NAME};
pub use settings::{Settings, SyncMetadata};
