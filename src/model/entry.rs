//! Journal entry model.
//!
//! One entry per user per calendar day. Entries are overwritten on redo,
//! never versioned.

use serde::{Deserialize, Serialize};

use crate::sync::hash::entry_id;

/// Who wrote a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Get the string representation for storage and documents.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match crate::validate::normalize_role(s).as_deref() {
            Ok("user") => Ok(Self::User),
            Ok("assistant") => Ok(Self::Assistant),
            _ => Err(format!("Unknown role: {s}")),
        }
    }
}

/// A titled highlight of the day. Order matters for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub title: String,
    pub description: String,
}

/// One turn of the conversation that produced the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
    /// Unix milliseconds
    pub timestamp: i64,
}

/// A journal entry for one user and one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Stable identifier derived from `(user_id, date)`
    pub id: String,

    /// Owning user
    pub user_id: String,

    /// Calendar date key (`YYYY-MM-DD`)
    pub date: String,

    /// Mood score, 1-5
    pub mood: u8,

    pub summary: String,

    #[serde(default)]
    pub highlights: Vec<Highlight>,

    /// Immutable once the entry is finalized
    #[serde(default)]
    pub conversation: Vec<ConversationMessage>,

    /// Persona used to generate the entry (weak reference)
    pub profile_id: String,
    pub profile_name: String,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last update timestamp (Unix milliseconds); decides sync conflicts
    pub updated_at: i64,
}

impl JournalEntry {
    /// Create a new entry stamped with the current time.
    #[must_use]
    pub fn new(user_id: &str, date: &str, mood: u8, summary: String) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: entry_id(user_id, date),
            user_id: user_id.to_string(),
            date: date.to_string(),
            mood,
            summary,
            highlights: Vec::new(),
            conversation: Vec::new(),
            profile_id: super::DEFAULT_PROFILE_ID.to_string(),
            profile_name: super::DEFAULT_PROFILE_NAME.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `self` should replace `local` during reconciliation.
    #[must_use]
    pub fn is_newer_than(&self, local: &Self) -> bool {
        self.updated_at > local.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_entry_derives_id() {
        let a = JournalEntry::new("u1", "2024-01-02", 3, "ok".into());
        let b = JournalEntry::new("u1", "2024-01-02", 5, "other".into());
        let c = JournalEntry::new("u2", "2024-01-02", 3, "ok".into());

        assert!(a.id.starts_with("entry_"));
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.profile_id, "default");
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("assistant".parse::<Role>(), Ok(Role::Assistant));
        assert_eq!("Human".parse::<Role>(), Ok(Role::User));
        assert!("narrator".parse::<Role>().is_err());
    }

    #[test]
    fn test_is_newer_than() {
        let mut local = JournalEntry::new("u1", "2024-01-02", 3, "ok".into());
        local.updated_at = 100;
        let mut remote = local.clone();
        remote.updated_at = 200;

        assert!(remote.is_newer_than(&local));
        assert!(!local.is_newer_than(&remote));
        assert!(!local.is_newer_than(&local.clone()));
    }
}
