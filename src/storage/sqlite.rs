//! SQLite cache store.
//!
//! Local mirror of the remote journal, namespaced by user. Writes follow the
//! MutationContext pattern: one IMMEDIATE transaction per mutation, with the
//! sync events it produced written before commit.

use std::path::Path;
use std::time::Duration;

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Transaction};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{
    mark_current, resolve_current_id, JournalEntry, Profile, Settings, SyncMetadata,
    DEFAULT_PROFILE_ID,
};
use crate::storage::events::{get_events, insert_event, Event, EventType};
use crate::storage::schema::apply_schema;

const ENTRY_COLUMNS: &str = "id, user_id, date, mood, summary, highlights, conversation, \
     profile_id, profile_name, created_at, updated_at";

const PROFILE_COLUMNS: &str =
    "id, name, description, system_prompt, response_count, created_at, updated_at";

/// SQLite-backed local cache.
#[derive(Debug)]
pub struct CacheStore {
    conn: Connection,
}

/// Context for a mutation operation.
///
/// Passed to mutation closures so they can record sync events that are
/// written in the same transaction.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// User whose data is being changed.
    pub user_id: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    #[must_use]
    pub fn new(op_name: &str, user_id: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            user_id: user_id.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event for this operation.
    pub fn record_event(&mut self, event_type: EventType, detail: Option<String>) {
        let event = Event::new(&self.user_id, event_type);
        self.events.push(match detail {
            Some(detail) => event.with_detail(detail),
            None => event,
        });
    }
}

/// Staged mutations for one collection.
#[derive(Debug, Clone)]
pub struct CollectionChanges<T> {
    /// Drop every existing row for the user before applying `upserts`.
    pub replace: bool,
    pub upserts: Vec<T>,
    /// Keys to remove (dates for entries, ids for profiles).
    pub deletes: Vec<String>,
}

impl<T> Default for CollectionChanges<T> {
    fn default() -> Self {
        Self {
            replace: false,
            upserts: Vec::new(),
            deletes: Vec::new(),
        }
    }
}

impl<T> CollectionChanges<T> {
    /// Wholesale overwrite with `items`.
    #[must_use]
    pub fn replace_with(items: Vec<T>) -> Self {
        Self {
            replace: true,
            upserts: items,
            deletes: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.replace && self.upserts.is_empty() && self.deletes.is_empty()
    }
}

/// Everything a sync pass writes, applied in one synchronous block.
#[derive(Debug, Clone, Default)]
pub struct StagedChanges {
    pub entries: CollectionChanges<JournalEntry>,
    pub profiles: CollectionChanges<Profile>,
    /// New current-profile pointer, if it changes.
    pub current_profile_id: Option<String>,
    pub metadata: Option<SyncMetadata>,
    /// Log row for the pass.
    pub event: Option<(EventType, Option<String>)>,
}

/// Row counts for one user.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct CacheCounts {
    pub entries: usize,
    pub profiles: usize,
}

impl CacheStore {
    /// Open the cache at `path`, creating it if needed.
    ///
    /// A database written by an incompatible layout is deleted and rebuilt
    /// once. The cache is a mirror, so the next full sync repopulates it.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened, or if it is still
    /// unusable after the rebuild.
    pub fn open(path: &Path) -> Result<Self> {
        match Self::open_with_timeout(path, None) {
            Err(Error::SchemaMismatch { found, expected }) => {
                warn!(
                    path = %path.display(),
                    found,
                    expected,
                    "Cache schema mismatch, rebuilding local cache"
                );
                remove_database_files(path)?;
                Self::open_with_timeout(path, None)
            }
            other => other,
        }
    }

    /// Open a database with an optional busy timeout. No recovery is attempted.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(timeout_ms.unwrap_or(5000)))?;

        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// Begins an IMMEDIATE transaction, runs the closure, writes the events
    /// it recorded, then commits. Any error rolls the whole thing back.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails.
    pub fn mutate<F, R>(&mut self, op: &str, user_id: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, user_id);
        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;
        debug!(op, user_id, events = ctx.events.len(), "Mutation committed");

        Ok(result)
    }

    // ==================
    // Journal Entries
    // ==================

    /// Get one entry by date.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_entry(&self, user_id: &str, date: &str) -> Result<Option<JournalEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM journal_entries WHERE user_id = ?1 AND date = ?2"
        );
        let entry = self
            .conn
            .query_row(&sql, rusqlite::params![user_id, date], map_entry_row)
            .optional()?;
        Ok(entry)
    }

    /// List all entries for a user, most recent date first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_entries(&self, user_id: &str) -> Result<Vec<JournalEntry>> {
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM journal_entries WHERE user_id = ?1 ORDER BY date DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([user_id], map_entry_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Insert or overwrite one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn put_entry(&mut self, entry: &JournalEntry) -> Result<()> {
        self.mutate("put_entry", &entry.user_id, |tx, _| {
            upsert_entry(tx, entry)?;
            Ok(())
        })
    }

    /// Insert or overwrite several entries in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is written in that case.
    pub fn put_entries(&mut self, user_id: &str, entries: &[JournalEntry]) -> Result<()> {
        self.mutate("put_entries", user_id, |tx, _| {
            for entry in entries {
                upsert_entry(tx, entry)?;
            }
            Ok(())
        })
    }

    /// Remove one entry. Returns whether a row was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_entry(&mut self, user_id: &str, date: &str) -> Result<bool> {
        self.mutate("delete_entry", user_id, |tx, _| {
            Ok(delete_entry_row(tx, user_id, date)? > 0)
        })
    }

    /// Overwrite the user's entry collection wholesale.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; the old collection survives in that case.
    pub fn replace_entries(&mut self, user_id: &str, entries: &[JournalEntry]) -> Result<()> {
        self.mutate("replace_entries", user_id, |tx, _| {
            tx.execute("DELETE FROM journal_entries WHERE user_id = ?1", [user_id])?;
            for entry in entries {
                upsert_entry(tx, entry)?;
            }
            Ok(())
        })
    }

    // ==================
    // Profiles
    // ==================

    /// Get one profile, with `is_current` derived from the pointer.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_profile(&self, user_id: &str, id: &str) -> Result<Option<Profile>> {
        Ok(self.list_profiles(user_id)?.into_iter().find(|p| p.id == id))
    }

    /// List a user's profiles: default first, then by name.
    ///
    /// Exactly one returned profile is current when the set is non-empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_profiles(&self, user_id: &str) -> Result<Vec<Profile>> {
        let sql = format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ?1
             ORDER BY (id = ?2) DESC, name COLLATE NOCASE, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut profiles = stmt
            .query_map(rusqlite::params![user_id, DEFAULT_PROFILE_ID], map_profile_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let pointer = self.current_profile_id(user_id)?;
        let current = resolve_current_id(&profiles, pointer.as_deref());
        mark_current(&mut profiles, &current);

        Ok(profiles)
    }

    /// Insert or overwrite one profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn put_profile(&mut self, user_id: &str, profile: &Profile) -> Result<()> {
        self.mutate("put_profile", user_id, |tx, _| {
            upsert_profile(tx, user_id, profile)?;
            Ok(())
        })
    }

    /// Insert or overwrite several profiles in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is written in that case.
    pub fn put_profiles(&mut self, user_id: &str, profiles: &[Profile]) -> Result<()> {
        self.mutate("put_profiles", user_id, |tx, _| {
            for profile in profiles {
                upsert_profile(tx, user_id, profile)?;
            }
            Ok(())
        })
    }

    /// Remove one profile. Returns whether a row was removed.
    ///
    /// If the removed profile was current, the pointer moves to the default.
    ///
    /// # Errors
    ///
    /// Returns `Error::ProtectedProfile` for the default profile.
    pub fn delete_profile(&mut self, user_id: &str, id: &str) -> Result<bool> {
        if id == DEFAULT_PROFILE_ID {
            return Err(Error::ProtectedProfile);
        }
        self.mutate("delete_profile", user_id, |tx, _| {
            let removed = tx.execute(
                "DELETE FROM profiles WHERE user_id = ?1 AND id = ?2",
                rusqlite::params![user_id, id],
            )?;
            tx.execute(
                "UPDATE current_profile SET profile_id = ?3, updated_at = ?4
                 WHERE user_id = ?1 AND profile_id = ?2",
                rusqlite::params![
                    user_id,
                    id,
                    DEFAULT_PROFILE_ID,
                    chrono::Utc::now().timestamp_millis()
                ],
            )?;
            Ok(removed > 0)
        })
    }

    /// Overwrite the user's profiles and pointer in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; the old set survives in that case.
    pub fn replace_profiles(
        &mut self,
        user_id: &str,
        profiles: &[Profile],
        current_id: &str,
    ) -> Result<()> {
        self.mutate("replace_profiles", user_id, |tx, _| {
            tx.execute("DELETE FROM profiles WHERE user_id = ?1", [user_id])?;
            for profile in profiles {
                upsert_profile(tx, user_id, profile)?;
            }
            write_pointer(tx, user_id, current_id)?;
            Ok(())
        })
    }

    /// The stored current-profile pointer, unresolved.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn current_profile_id(&self, user_id: &str) -> Result<Option<String>> {
        let id = self
            .conn
            .query_row(
                "SELECT profile_id FROM current_profile WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Point the user's current profile at `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn set_current_profile_id(&mut self, user_id: &str, id: &str) -> Result<()> {
        self.mutate("set_current_profile", user_id, |tx, _| {
            write_pointer(tx, user_id, id)?;
            Ok(())
        })
    }

    // ==================
    // Settings & Metadata
    // ==================

    /// The user's settings, or defaults if none were saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_settings(&self, user_id: &str) -> Result<Settings> {
        let settings = self
            .conn
            .query_row(
                "SELECT user_id, auto_sync, sync_interval_minutes, theme, updated_at
                 FROM settings WHERE user_id = ?1",
                [user_id],
                |row| {
                    Ok(Settings {
                        user_id: row.get(0)?,
                        auto_sync: row.get(1)?,
                        sync_interval_minutes: row.get(2)?,
                        theme: row.get(3)?,
                        updated_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(settings.unwrap_or_else(|| Settings::defaults(user_id)))
    }

    /// Save the user's settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn put_settings(&mut self, settings: &Settings) -> Result<()> {
        self.mutate("put_settings", &settings.user_id, |tx, _| {
            tx.execute(
                "INSERT OR REPLACE INTO settings (user_id, auto_sync, sync_interval_minutes, theme, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![
                    settings.user_id,
                    settings.auto_sync,
                    settings.sync_interval_minutes,
                    settings.theme,
                    settings.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    /// Sync bookkeeping for a user. `None` means the user was never synced.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn get_sync_metadata(&self, user_id: &str) -> Result<Option<SyncMetadata>> {
        let metadata = self
            .conn
            .query_row(
                "SELECT user_id, last_sync_time, last_journal_sync_time, last_profile_sync_time
                 FROM sync_metadata WHERE user_id = ?1",
                [user_id],
                |row| {
                    Ok(SyncMetadata {
                        user_id: row.get(0)?,
                        last_sync_time: row.get(1)?,
                        last_journal_sync_time: row.get(2)?,
                        last_profile_sync_time: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(metadata)
    }

    /// Save sync bookkeeping.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn put_sync_metadata(&mut self, metadata: &SyncMetadata) -> Result<()> {
        self.mutate("put_sync_metadata", &metadata.user_id, |tx, _| {
            write_metadata(tx, metadata)?;
            Ok(())
        })
    }

    // ==================
    // Sync Support
    // ==================

    /// Apply the writes staged by a sync pass.
    ///
    /// Entries are written in one transaction, then profiles and the pointer
    /// in another, then metadata and the pass event. Each step is
    /// all-or-nothing; a failure stops the remaining steps.
    ///
    /// # Errors
    ///
    /// Returns the first storage error encountered.
    pub fn apply_changes(&mut self, op: &str, user_id: &str, changes: &StagedChanges) -> Result<()> {
        if !changes.entries.is_empty() {
            self.mutate(op, user_id, |tx, _| {
                let staged = &changes.entries;
                if staged.replace {
                    tx.execute("DELETE FROM journal_entries WHERE user_id = ?1", [user_id])?;
                }
                for entry in &staged.upserts {
                    upsert_entry(tx, entry)?;
                }
                for date in &staged.deletes {
                    delete_entry_row(tx, user_id, date)?;
                }
                Ok(())
            })?;
        }

        if !changes.profiles.is_empty() || changes.current_profile_id.is_some() {
            self.mutate(op, user_id, |tx, _| {
                let staged = &changes.profiles;
                if staged.replace {
                    tx.execute("DELETE FROM profiles WHERE user_id = ?1", [user_id])?;
                }
                for profile in &staged.upserts {
                    upsert_profile(tx, user_id, profile)?;
                }
                for id in staged.deletes.iter().filter(|id| *id != DEFAULT_PROFILE_ID) {
                    tx.execute(
                        "DELETE FROM profiles WHERE user_id = ?1 AND id = ?2",
                        rusqlite::params![user_id, id],
                    )?;
                }
                if let Some(current) = &changes.current_profile_id {
                    write_pointer(tx, user_id, current)?;
                }
                Ok(())
            })?;
        }

        if changes.metadata.is_some() || changes.event.is_some() {
            self.mutate(op, user_id, |tx, ctx| {
                if let Some(metadata) = &changes.metadata {
                    write_metadata(tx, metadata)?;
                }
                if let Some((event_type, detail)) = &changes.event {
                    ctx.record_event(*event_type, detail.clone());
                }
                Ok(())
            })?;
        }

        Ok(())
    }

    /// Remove every row the user owns, in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any delete fails; nothing is removed in that case.
    pub fn clear_user_data(&mut self, user_id: &str) -> Result<()> {
        self.mutate("clear_user_data", user_id, |tx, ctx| {
            let entries = tx.execute("DELETE FROM journal_entries WHERE user_id = ?1", [user_id])?;
            for table in [
                "profiles",
                "current_profile",
                "settings",
                "sync_metadata",
                "sync_events",
            ] {
                tx.execute(&format!("DELETE FROM {table} WHERE user_id = ?1"), [user_id])?;
            }
            // Written after the deletes, so it is the only row left for the user.
            ctx.record_event(EventType::UserDataCleared, Some(format!("entries -{entries}")));
            Ok(())
        })
    }

    /// Append one row to the sync event log.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub fn record_event(
        &mut self,
        user_id: &str,
        event_type: EventType,
        detail: Option<String>,
    ) -> Result<()> {
        self.mutate("record_event", user_id, |_, ctx| {
            ctx.record_event(event_type, detail);
            Ok(())
        })
    }

    /// Most recent sync events, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn recent_events(&self, user_id: &str, limit: Option<u32>) -> Result<Vec<Event>> {
        Ok(get_events(&self.conn, user_id, limit)?)
    }

    /// Row counts for the status view.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn counts(&self, user_id: &str) -> Result<CacheCounts> {
        let count = |table: &str| -> Result<usize> {
            let n: i64 = self.conn.query_row(
                &format!("SELECT COUNT(*) FROM {table} WHERE user_id = ?1"),
                [user_id],
                |row| row.get(0),
            )?;
            Ok(usize::try_from(n).unwrap_or_default())
        };
        Ok(CacheCounts {
            entries: count("journal_entries")?,
            profiles: count("profiles")?,
        })
    }
}

/// Delete the database file and its WAL/SHM siblings.
fn remove_database_files(path: &Path) -> Result<()> {
    let mut targets = vec![path.to_path_buf()];
    for suffix in ["-wal", "-shm"] {
        let mut name = path.as_os_str().to_os_string();
        name.push(suffix);
        targets.push(name.into());
    }
    for target in targets {
        match std::fs::remove_file(&target) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn upsert_entry(conn: &Connection, entry: &JournalEntry) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO journal_entries
             (id, user_id, date, mood, summary, highlights, conversation,
              profile_id, profile_name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        rusqlite::params![
            entry.id,
            entry.user_id,
            entry.date,
            entry.mood,
            entry.summary,
            serde_json::to_string(&entry.highlights)?,
            serde_json::to_string(&entry.conversation)?,
            entry.profile_id,
            entry.profile_name,
            entry.created_at,
            entry.updated_at,
        ],
    )?;
    Ok(())
}

fn delete_entry_row(conn: &Connection, user_id: &str, date: &str) -> Result<usize> {
    Ok(conn.execute(
        "DELETE FROM journal_entries WHERE user_id = ?1 AND date = ?2",
        rusqlite::params![user_id, date],
    )?)
}

fn upsert_profile(conn: &Connection, user_id: &str, profile: &Profile) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO profiles
             (user_id, id, name, description, system_prompt, response_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            user_id,
            profile.id,
            profile.name,
            profile.description,
            profile.system_prompt,
            profile.response_count,
            profile.created_at,
            profile.updated_at,
        ],
    )?;
    Ok(())
}

fn write_pointer(conn: &Connection, user_id: &str, profile_id: &str) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO current_profile (user_id, profile_id, updated_at)
         VALUES (?1, ?2, ?3)",
        rusqlite::params![user_id, profile_id, chrono::Utc::now().timestamp_millis()],
    )?;
    Ok(())
}

fn write_metadata(conn: &Connection, metadata: &SyncMetadata) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO sync_metadata
             (user_id, last_sync_time, last_journal_sync_time, last_profile_sync_time)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            metadata.user_id,
            metadata.last_sync_time,
            metadata.last_journal_sync_time,
            metadata.last_profile_sync_time,
        ],
    )?;
    Ok(())
}

fn json_column<T: DeserializeOwned>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

// Helper to map entry rows
fn map_entry_row(row: &rusqlite::Row) -> rusqlite::Result<JournalEntry> {
    Ok(JournalEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        date: row.get(2)?,
        mood: row.get(3)?,
        summary: row.get(4)?,
        highlights: json_column(row, 5)?,
        conversation: json_column(row, 6)?,
        profile_id: row.get(7)?,
        profile_name: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

// Helper to map profile rows; `is_current` is filled in by the caller
fn map_profile_row(row: &rusqlite::Row) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        system_prompt: row.get(3)?,
        response_count: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        is_current: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConversationMessage, Highlight, Role};

    fn entry(user: &str, date: &str, updated_at: i64) -> JournalEntry {
        let mut e = JournalEntry::new(user, date, 3, format!("summary {date}"));
        e.created_at = 1;
        e.updated_at = updated_at;
        e
    }

    #[test]
    fn test_open_memory() {
        let storage = CacheStore::open_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_entry_crud() {
        let mut storage = CacheStore::open_memory().unwrap();

        let mut first = entry("u1", "2024-01-01", 10);
        first.highlights.push(Highlight {
            title: "Walk".into(),
            description: "Along the river".into(),
        });
        first.conversation.push(ConversationMessage {
            role: Role::Assistant,
            content: "How was today?".into(),
            timestamp: 5,
        });
        storage.put_entry(&first).unwrap();
        storage
            .put_entries("u1", &[entry("u1", "2024-01-03", 10), entry("u2", "2024-01-02", 10)])
            .unwrap();

        let loaded = storage.get_entry("u1", "2024-01-01").unwrap().unwrap();
        assert_eq!(loaded, first);

        let dates: Vec<_> = storage
            .list_entries("u1")
            .unwrap()
            .into_iter()
            .map(|e| e.date)
            .collect();
        assert_eq!(dates, vec!["2024-01-03", "2024-01-01"]);

        assert!(storage.delete_entry("u1", "2024-01-01").unwrap());
        assert!(!storage.delete_entry("u1", "2024-01-01").unwrap());
        assert!(storage.get_entry("u1", "2024-01-01").unwrap().is_none());
    }

    #[test]
    fn test_replace_entries() {
        let mut storage = CacheStore::open_memory().unwrap();
        storage
            .put_entries("u1", &[entry("u1", "2024-01-01", 1), entry("u1", "2024-01-02", 1)])
            .unwrap();
        storage.put_entry(&entry("u2", "2024-01-01", 1)).unwrap();

        storage.replace_entries("u1", &[entry("u1", "2024-02-01", 1)]).unwrap();

        assert_eq!(storage.list_entries("u1").unwrap().len(), 1);
        assert_eq!(storage.list_entries("u2").unwrap().len(), 1);
    }

    #[test]
    fn test_profiles_derive_single_current() {
        let mut storage = CacheStore::open_memory().unwrap();
        let coach = Profile::new("Coach".into(), String::new(), String::new(), 3);
        let alpha = Profile::new("Alpha".into(), String::new(), String::new(), 3);

        storage
            .replace_profiles(
                "u1",
                &[Profile::default_profile(), coach.clone(), alpha.clone()],
                &coach.id,
            )
            .unwrap();

        let profiles = storage.list_profiles("u1").unwrap();
        let ids: Vec<_> = profiles.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec![DEFAULT_PROFILE_ID, alpha.id.as_str(), coach.id.as_str()]);
        assert_eq!(profiles.iter().filter(|p| p.is_current).count(), 1);
        assert!(storage.get_profile("u1", &coach.id).unwrap().unwrap().is_current);

        // Unknown pointer falls back to default
        storage.set_current_profile_id("u1", "missing").unwrap();
        assert!(storage.get_profile("u1", DEFAULT_PROFILE_ID).unwrap().unwrap().is_current);
    }

    #[test]
    fn test_delete_profile() {
        let mut storage = CacheStore::open_memory().unwrap();
        let coach = Profile::new("Coach".into(), String::new(), String::new(), 3);
        storage
            .replace_profiles("u1", &[Profile::default_profile(), coach.clone()], &coach.id)
            .unwrap();

        assert!(matches!(
            storage.delete_profile("u1", DEFAULT_PROFILE_ID),
            Err(Error::ProtectedProfile)
        ));
        assert!(storage.delete_profile("u1", &coach.id).unwrap());
        assert_eq!(
            storage.current_profile_id("u1").unwrap().as_deref(),
            Some(DEFAULT_PROFILE_ID)
        );
    }

    #[test]
    fn test_settings_defaults_and_update() {
        let mut storage = CacheStore::open_memory().unwrap();
        assert_eq!(storage.get_settings("u1").unwrap(), Settings::defaults("u1"));

        let settings = Settings {
            theme: "dark".into(),
            auto_sync: false,
            ..Settings::defaults("u1")
        };
        storage.put_settings(&settings).unwrap();
        assert_eq!(storage.get_settings("u1").unwrap(), settings);
    }

    #[test]
    fn test_apply_changes() {
        let mut storage = CacheStore::open_memory().unwrap();
        storage
            .put_entries("u1", &[entry("u1", "2024-01-01", 1), entry("u1", "2024-01-02", 1)])
            .unwrap();

        let changes = StagedChanges {
            entries: CollectionChanges {
                replace: false,
                upserts: vec![entry("u1", "2024-01-03", 1)],
                deletes: vec!["2024-01-01".into()],
            },
            profiles: CollectionChanges {
                replace: false,
                upserts: vec![Profile::default_profile()],
                deletes: vec![DEFAULT_PROFILE_ID.into()],
            },
            current_profile_id: Some(DEFAULT_PROFILE_ID.into()),
            metadata: Some(SyncMetadata::fresh("u1", 42)),
            event: Some((EventType::IncrementalSync, Some("entries +1 -1".into()))),
        };
        storage.apply_changes("incremental_sync", "u1", &changes).unwrap();

        let dates: Vec<_> = storage
            .list_entries("u1")
            .unwrap()
            .into_iter()
            .map(|e| e.date)
            .collect();
        assert_eq!(dates, vec!["2024-01-03", "2024-01-02"]);
        // Staged deletes never remove the default profile
        assert_eq!(storage.list_profiles("u1").unwrap().len(), 1);
        assert_eq!(storage.get_sync_metadata("u1").unwrap().unwrap().last_sync_time, 42);
        assert_eq!(
            storage.recent_events("u1", None).unwrap()[0].event_type,
            EventType::IncrementalSync
        );
    }

    #[test]
    fn test_clear_user_data() {
        let mut storage = CacheStore::open_memory().unwrap();
        storage.put_entry(&entry("u1", "2024-01-01", 1)).unwrap();
        storage.put_entry(&entry("u2", "2024-01-01", 1)).unwrap();
        storage.put_sync_metadata(&SyncMetadata::fresh("u1", 1)).unwrap();
        storage
            .record_event("u1", EventType::FullSync, None)
            .unwrap();

        storage.clear_user_data("u1").unwrap();

        assert!(storage.list_entries("u1").unwrap().is_empty());
        assert!(storage.get_sync_metadata("u1").unwrap().is_none());
        let events = storage.recent_events("u1", None).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::UserDataCleared);
        assert_eq!(events[0].detail.as_deref(), Some("entries -1"));
        assert_eq!(storage.counts("u2").unwrap().entries, 1);
    }

    #[test]
    fn test_open_rebuilds_on_schema_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE legacy (x INTEGER); PRAGMA user_version = 7;")
                .unwrap();
        }

        assert!(matches!(
            CacheStore::open_with_timeout(&path, None),
            Err(Error::SchemaMismatch { found: 7, .. })
        ));

        let mut storage = CacheStore::open(&path).unwrap();
        storage.put_entry(&entry("u1", "2024-01-01", 1)).unwrap();
        assert_eq!(storage.counts("u1").unwrap().entries, 1);
    }
}
