//! Command implementations.

pub mod completions;
pub mod entry;
pub mod profile;
pub mod settings;
pub mod signout;
pub mod sync;
pub mod version;

use std::sync::Arc;

use crate::cache::JournalCache;
use crate::cli::Cli;
use crate::config::{engine_config, resolve_db_path, resolve_remote_dir, resolve_user_id};
use crate::error::{Error, Result};
use crate::storage::CacheStore;
use crate::sync::LocalDirRemoteStore;

/// Open the cache and remote named by the global flags.
///
/// # Errors
///
/// Returns an error if configuration cannot be resolved or the cache or
/// remote directory cannot be opened.
pub fn open_cache(cli: &Cli) -> Result<JournalCache> {
    let db_path = resolve_db_path(cli.db.as_deref())
        .ok_or_else(|| Error::Config("Could not determine the cache location".into()))?;
    let remote_dir = resolve_remote_dir(cli.remote.as_deref())?;
    let user_id = resolve_user_id(cli.user.as_deref())?;
    let config = engine_config(cli.timeout)?;

    let store = CacheStore::open(&db_path)?;
    let remote = LocalDirRemoteStore::new(remote_dir)?;
    Ok(JournalCache::new(store, Arc::new(remote), &user_id, config))
}

/// Print a serializable value as one line of JSON.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

/// Truncate a string for table display.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer summary", 10), "a much ...");
        assert_eq!(truncate("ünïcödé", 7), "ünïcödé");
    }
}
