//! Remote document store abstraction.
//!
//! The remote store is the source of truth for journal content and the
//! current-profile pointer. One store instance holds one user's documents;
//! `user_id` is passed to reads only so decoded entries carry their owner.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{JournalEntry, Profile};

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Short label for logs (e.g. `localdir:/path/to/repo`).
    fn target_id(&self) -> &str;

    /// All decodable entries. A missing entries container lists as empty;
    /// malformed documents are skipped with a warning.
    async fn list_entries(&self, user_id: &str) -> Result<Vec<JournalEntry>>;

    /// One entry by date, or `None` if absent or unreadable.
    async fn fetch_entry(&self, user_id: &str, date: &str) -> Result<Option<JournalEntry>> {
        Ok(self
            .list_entries(user_id)
            .await?
            .into_iter()
            .find(|e| e.date == date))
    }

    /// Create or overwrite the document for `entry.date`.
    async fn write_entry(&self, entry: &JournalEntry) -> Result<()>;

    /// Remove the document for `date`. Removing an absent entry is a no-op.
    async fn delete_entry(&self, date: &str) -> Result<()>;

    /// All profiles stored remotely. `is_current` is always false here.
    async fn list_profiles(&self) -> Result<Vec<Profile>>;

    /// Create or overwrite a profile document.
    async fn write_profile(&self, profile: &Profile) -> Result<()>;

    /// Remove a profile document. Removing an absent profile is a no-op.
    async fn delete_profile(&self, id: &str) -> Result<()>;

    /// The stored current-profile pointer, unresolved.
    async fn get_current_profile_id(&self) -> Result<Option<String>>;

    async fn set_current_profile_id(&self, id: &str) -> Result<()>;
}
