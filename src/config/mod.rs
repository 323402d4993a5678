//! Configuration management.
//!
//! Resolves where the cache lives, which directory acts as the remote
//! journal repository, who the user is and how long a sync pass may run.
//!
//! Every value follows the same priority: explicit CLI flag, then
//! environment variable, then a default under `~/.journal-sync/`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::sync::{EngineConfig, DEFAULT_SYNC_TIMEOUT};

/// Get the global journal-sync directory location (`~/.journal-sync/`).
#[must_use]
pub fn global_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".journal-sync"))
}

/// Check if test mode is enabled.
///
/// Test mode is enabled by setting `JSYNC_TEST_DB=1` (or any non-empty value).
/// This redirects the cache to an isolated test database.
#[must_use]
pub fn is_test_mode() -> bool {
    std::env::var("JSYNC_TEST_DB").is_ok_and(|v| is_truthy(&v))
}

fn is_truthy(value: &str) -> bool {
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

/// Get the test database path (`~/.journal-sync/test/cache.db`).
#[must_use]
pub fn test_db_path() -> Option<PathBuf> {
    global_dir().map(|dir| dir.join("test").join("cache.db"))
}

/// Resolve the cache database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `JSYNC_TEST_DB` environment variable → uses test database
/// 3. `JSYNC_DB` environment variable
/// 4. Global location: `~/.journal-sync/cache.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if is_test_mode() {
        return test_db_path();
    }

    if let Some(path) = non_empty_env("JSYNC_DB") {
        return Some(PathBuf::from(path));
    }

    global_dir().map(|dir| dir.join("cache.db"))
}

/// Resolve the directory that acts as the remote journal repository.
///
/// Priority: explicit flag, `JSYNC_REMOTE`, then `~/.journal-sync/journal`.
///
/// # Errors
///
/// Returns `Error::Config` if no location can be determined.
pub fn resolve_remote_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = non_empty_env("JSYNC_REMOTE") {
        return Ok(PathBuf::from(path));
    }
    global_dir()
        .map(|dir| dir.join("journal"))
        .ok_or_else(|| Error::Config("Could not determine a remote journal directory".into()))
}

/// Resolve the user whose journal is synced.
///
/// Priority: explicit flag, `JSYNC_USER`, then the login name from `USER`.
///
/// # Errors
///
/// Returns `Error::Config` if no user can be determined.
pub fn resolve_user_id(explicit: Option<&str>) -> Result<String> {
    explicit
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .or_else(|| non_empty_env("JSYNC_USER"))
        .or_else(|| non_empty_env("USER"))
        .ok_or_else(|| Error::Config("Could not determine the user id".into()))
}

/// Resolve the per-pass timeout.
///
/// Priority: explicit seconds, `JSYNC_TIMEOUT_SECS`, then 30 seconds.
///
/// # Errors
///
/// Returns `Error::Config` for a zero or unparsable value.
pub fn resolve_timeout(explicit_secs: Option<u64>) -> Result<Duration> {
    let secs = match explicit_secs {
        Some(secs) => secs,
        None => match non_empty_env("JSYNC_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!("JSYNC_TIMEOUT_SECS must be a whole number, got '{raw}'"))
            })?,
            None => return Ok(DEFAULT_SYNC_TIMEOUT),
        },
    };
    if secs == 0 {
        return Err(Error::Config("Sync timeout must be at least 1 second".into()));
    }
    Ok(Duration::from_secs(secs))
}

/// Build the engine configuration from flags and environment.
///
/// # Errors
///
/// Returns `Error::Config` if the timeout is invalid.
pub fn engine_config(timeout_secs: Option<u64>) -> Result<EngineConfig> {
    Ok(EngineConfig {
        timeout: resolve_timeout(timeout_secs)?,
    })
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_db_path_with_explicit() {
        let explicit = PathBuf::from("/custom/path/cache.db");
        assert_eq!(resolve_db_path(Some(&explicit)), Some(explicit));
    }

    #[test]
    fn test_test_db_path_is_separate() {
        let global = global_dir().unwrap();
        let test = test_db_path().unwrap();

        assert!(test.to_string_lossy().contains("test"));
        assert!(test.ends_with("cache.db"));
        assert_ne!(global.join("cache.db"), test);
    }

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(""));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("FALSE"));
        assert!(is_truthy("1"));
        assert!(is_truthy("yes"));
    }

    #[test]
    fn test_explicit_values_win() {
        assert_eq!(resolve_user_id(Some(" alice ")).unwrap(), "alice");
        assert_eq!(
            resolve_remote_dir(Some(Path::new("/repo"))).unwrap(),
            PathBuf::from("/repo")
        );
        assert_eq!(resolve_timeout(Some(5)).unwrap(), Duration::from_secs(5));
        assert!(resolve_timeout(Some(0)).is_err());
    }
}
