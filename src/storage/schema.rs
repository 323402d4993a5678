//! Database schema definitions and version checks.
//!
//! Every table is keyed by `user_id` first so that per-user range scans
//! and sign-out cleanup stay on the primary key.

use rusqlite::Connection;

use crate::error::{Error, Result};

/// Current schema version, stored in `PRAGMA user_version`.
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// The complete SQL schema for the cache database.
///
/// Timestamps are stored as INTEGER (Unix milliseconds). Highlights and
/// conversations are stored as JSON text.
pub const SCHEMA_SQL: &str = r"
-- ====================
-- Collections
-- ====================

CREATE TABLE IF NOT EXISTS journal_entries (
    user_id TEXT NOT NULL,
    date TEXT NOT NULL,
    id TEXT NOT NULL,
    mood INTEGER NOT NULL CHECK (mood BETWEEN 1 AND 5),
    summary TEXT NOT NULL,
    highlights TEXT NOT NULL DEFAULT '[]',
    conversation TEXT NOT NULL DEFAULT '[]',
    profile_id TEXT NOT NULL,
    profile_name TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (user_id, date)
);

CREATE INDEX IF NOT EXISTS idx_entries_id ON journal_entries(id);

CREATE TABLE IF NOT EXISTS profiles (
    user_id TEXT NOT NULL,
    id TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    system_prompt TEXT NOT NULL DEFAULT '',
    response_count INTEGER NOT NULL CHECK (response_count BETWEEN 1 AND 10),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (user_id, id)
);

CREATE INDEX IF NOT EXISTS idx_profiles_user ON profiles(user_id);

-- Single current-profile pointer per user
CREATE TABLE IF NOT EXISTS current_profile (
    user_id TEXT PRIMARY KEY,
    profile_id TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    user_id TEXT PRIMARY KEY,
    auto_sync INTEGER NOT NULL DEFAULT 1,
    sync_interval_minutes INTEGER NOT NULL DEFAULT 15,
    theme TEXT NOT NULL DEFAULT 'system',
    updated_at INTEGER NOT NULL
);

-- ====================
-- Sync Bookkeeping
-- ====================

CREATE TABLE IF NOT EXISTS sync_metadata (
    user_id TEXT PRIMARY KEY,
    last_sync_time INTEGER NOT NULL,
    last_journal_sync_time INTEGER NOT NULL,
    last_profile_sync_time INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sync_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    detail TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sync_events_user ON sync_events(user_id, created_at DESC);
";

/// Apply the schema to the database.
///
/// A fresh database gets the schema and the current version. A database
/// already at the current version is left as is (every statement uses
/// `IF NOT EXISTS`). Anything else is reported as a schema mismatch so the
/// caller can decide whether to rebuild.
///
/// # Errors
///
/// Returns `Error::SchemaMismatch` for an unknown layout, or the
/// underlying SQLite error if pragmas or DDL fail.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "cache_size", "-16000")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    let found: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    if found == 0 && user_table_count(conn)? > 0 {
        // Tables from some other layout with no version stamp.
        return Err(Error::SchemaMismatch {
            found,
            expected: CURRENT_SCHEMA_VERSION,
        });
    }
    if found != 0 && found != CURRENT_SCHEMA_VERSION {
        return Err(Error::SchemaMismatch {
            found,
            expected: CURRENT_SCHEMA_VERSION,
        });
    }

    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", CURRENT_SCHEMA_VERSION)?;

    Ok(())
}

fn user_table_count(conn: &Connection) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_schema() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("Failed to apply schema");

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "journal_entries",
            "profiles",
            "current_profile",
            "settings",
            "sync_metadata",
            "sync_events",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).expect("First apply failed");
        apply_schema(&conn).expect("Second apply failed");
    }

    #[test]
    fn test_newer_version_is_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", 99).unwrap();

        let err = apply_schema(&conn).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { found: 99, .. }));
    }

    #[test]
    fn test_unversioned_foreign_tables_are_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE journal_entries (id TEXT PRIMARY KEY, body TEXT);")
            .unwrap();

        assert!(matches!(
            apply_schema(&conn),
            Err(Error::SchemaMismatch { found: 0, .. })
        ));
    }

    #[test]
    fn test_mood_constraint() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let insert = |mood: i64| {
            conn.execute(
                "INSERT INTO journal_entries (user_id, date, id, mood, summary, profile_id, profile_name, created_at, updated_at)
                 VALUES ('u1', ?1, ?1, ?2, 's', 'default', 'Default', 0, 0)",
                rusqlite::params![format!("2024-01-0{mood}"), mood],
            )
        };
        assert!(insert(3).is_ok());
        assert!(insert(6).is_err());
    }
}
