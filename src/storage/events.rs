//! Sync event log.
//!
//! Every sync pass, refresh and sign-out leaves a row here so the status
//! view can show what happened recently.

use rusqlite::{Connection, Result};
use serde::Serialize;

/// Event types for the sync log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    FullSync,
    IncrementalSync,
    EntryRefreshed,
    EntryRemoved,
    ProfilesRefreshed,
    SyncFailed,
    UserDataCleared,
}

impl EventType {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FullSync => "full_sync",
            Self::IncrementalSync => "incremental_sync",
            Self::EntryRefreshed => "entry_refreshed",
            Self::EntryRemoved => "entry_removed",
            Self::ProfilesRefreshed => "profiles_refreshed",
            Self::SyncFailed => "sync_failed",
            Self::UserDataCleared => "user_data_cleared",
        }
    }
}

/// A sync log record.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: i64,
    pub user_id: String,
    pub event_type: EventType,
    pub detail: Option<String>,
    pub created_at: i64,
}

impl Event {
    /// Create a new event (id will be assigned by database).
    #[must_use]
    pub fn new(user_id: &str, event_type: EventType) -> Self {
        Self {
            id: 0,
            user_id: user_id.to_string(),
            event_type,
            detail: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Attach a free-form detail (diff summary, error text).
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Insert an event into the database.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_event(conn: &Connection, event: &Event) -> Result<i64> {
    conn.execute(
        "INSERT INTO sync_events (user_id, event_type, detail, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            event.user_id,
            event.event_type.as_str(),
            event.detail,
            event.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Get the most recent events for a user, newest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn get_events(conn: &Connection, user_id: &str, limit: Option<u32>) -> Result<Vec<Event>> {
    let limit = limit.unwrap_or(20);
    let mut stmt = conn.prepare(
        "SELECT id, user_id, event_type, detail, created_at
         FROM sync_events
         WHERE user_id = ?1
         ORDER BY created_at DESC, id DESC
         LIMIT ?2",
    )?;

    let rows = stmt.query_map(rusqlite::params![user_id, limit], |row| {
        Ok(Event {
            id: row.get(0)?,
            user_id: row.get(1)?,
            event_type: parse_event_type(row.get::<_, String>(2)?.as_str()),
            detail: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;

    rows.collect()
}

fn parse_event_type(s: &str) -> EventType {
    match s {
        "full_sync" => EventType::FullSync,
        "entry_refreshed" => EventType::EntryRefreshed,
        "entry_removed" => EventType::EntryRemoved,
        "profiles_refreshed" => EventType::ProfilesRefreshed,
        "sync_failed" => EventType::SyncFailed,
        "user_data_cleared" => EventType::UserDataCleared,
        _ => EventType::IncrementalSync,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::apply_schema;

    #[test]
    fn test_event_insert_and_get() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let first = Event::new("u1", EventType::FullSync).with_detail("entries +3");
        let second = Event::new("u1", EventType::SyncFailed).with_detail("remote unreachable");
        let other = Event::new("u2", EventType::FullSync);

        assert!(insert_event(&conn, &first).unwrap() > 0);
        insert_event(&conn, &second).unwrap();
        insert_event(&conn, &other).unwrap();

        let events = get_events(&conn, "u1", Some(10)).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, EventType::SyncFailed);
        assert_eq!(events[1].detail.as_deref(), Some("entries +3"));
    }
}
