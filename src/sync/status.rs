//! Sync status display.
//!
//! Summarizes one user's cache: last sync times, collection sizes, the
//! current profile and the most recent sync events.

use chrono::{DateTime, Local};
use colored::Colorize;

use crate::error::Result;
use crate::model::resolve_current_id;
use crate::storage::{CacheStore, EventType};
use crate::sync::types::SyncStatus;

/// How many log rows the status view shows.
const RECENT_EVENT_LIMIT: u32 = 5;

/// Get the current sync status for a user.
///
/// # Errors
///
/// Returns an error if cache queries fail.
pub fn get_sync_status(cache: &CacheStore, user_id: &str) -> Result<SyncStatus> {
    let profiles = cache.list_profiles(user_id)?;
    let pointer = cache.current_profile_id(user_id)?;

    Ok(SyncStatus {
        user_id: user_id.to_string(),
        metadata: cache.get_sync_metadata(user_id)?,
        counts: cache.counts(user_id)?,
        current_profile_id: resolve_current_id(&profiles, pointer.as_deref()),
        recent_events: cache.recent_events(user_id, Some(RECENT_EVENT_LIMIT))?,
    })
}

/// Print sync status to stdout in a human-readable format.
pub fn print_status(status: &SyncStatus) {
    println!("{}", "Sync Status".bold().underline());
    println!();
    println!("  User:            {}", status.user_id);

    match &status.metadata {
        Some(meta) => {
            println!("  Last sync:       {}", format_time(meta.last_sync_time));
            println!("  Journal synced:  {}", format_time(meta.last_journal_sync_time));
            println!("  Profiles synced: {}", format_time(meta.last_profile_sync_time));
        }
        None => {
            println!("  Last sync:       {}", "never".yellow());
        }
    }
    println!();

    println!("{}", "Cached Data:".blue().bold());
    println!("  Entries:         {}", status.counts.entries);
    println!("  Profiles:        {}", status.counts.profiles);
    println!("  Current profile: {}", status.current_profile_id.cyan());
    println!();

    if status.recent_events.is_empty() {
        println!("{}", "No sync activity recorded.".dimmed());
    } else {
        println!("{}", "Recent Activity:".blue().bold());
        for event in &status.recent_events {
            let label = event.event_type.as_str();
            let label = if event.event_type == EventType::SyncFailed {
                label.red().to_string()
            } else {
                label.green().to_string()
            };
            let detail = event.detail.as_deref().unwrap_or("");
            println!("  {}  {label} {}", format_time(event.created_at).dimmed(), detail);
        }
    }

    if status.needs_full_sync() {
        println!();
        println!("{}", "Run 'jsync sync run' to populate the cache.".dimmed());
    }
}

/// Format Unix milliseconds as local time.
fn format_time(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis).map_or_else(
        || "unknown".to_string(),
        |t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{JournalEntry, SyncMetadata, DEFAULT_PROFILE_ID};

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(i64::MAX), "unknown");
        assert_eq!(format_time(0).len(), "1970-01-01 00:00:00".len());
    }

    #[test]
    fn test_get_sync_status_empty() {
        let cache = CacheStore::open_memory().unwrap();
        let status = get_sync_status(&cache, "u1").unwrap();

        assert!(status.needs_full_sync());
        assert_eq!(status.counts.entries, 0);
        assert_eq!(status.current_profile_id, DEFAULT_PROFILE_ID);
        assert!(status.recent_events.is_empty());
    }

    #[test]
    fn test_get_sync_status_after_writes() {
        let mut cache = CacheStore::open_memory().unwrap();
        cache
            .put_entry(&JournalEntry::new("u1", "2024-01-01", 3, "ok".into()))
            .unwrap();
        cache.put_sync_metadata(&SyncMetadata::fresh("u1", 1_000)).unwrap();
        cache.record_event("u1", EventType::FullSync, None).unwrap();

        let status = get_sync_status(&cache, "u1").unwrap();
        assert!(!status.needs_full_sync());
        assert_eq!(status.counts.entries, 1);
        assert_eq!(status.recent_events.len(), 1);
    }
}
