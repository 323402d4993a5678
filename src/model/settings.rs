//! Per-user local settings and sync bookkeeping.

use serde::{Deserialize, Serialize};

/// Local-only preferences. Never written to the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub user_id: String,

    /// Run an incremental sync when the cache is opened
    #[serde(default = "default_true")]
    pub auto_sync: bool,

    /// Minimum age of the last sync before an automatic refresh
    #[serde(default = "default_interval")]
    pub sync_interval_minutes: u32,

    /// One of `system`, `light`, `dark`
    #[serde(default = "default_theme")]
    pub theme: String,

    /// Last update timestamp (Unix milliseconds)
    #[serde(default)]
    pub updated_at: i64,
}

fn default_true() -> bool {
    true
}

fn default_interval() -> u32 {
    15
}

fn default_theme() -> String {
    "system".to_string()
}

impl Settings {
    /// Defaults for a user that has never changed anything.
    #[must_use]
    pub fn defaults(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            auto_sync: true,
            sync_interval_minutes: default_interval(),
            theme: default_theme(),
            updated_at: 0,
        }
    }

    /// Whether an automatic refresh is due given the last sync time.
    #[must_use]
    pub fn refresh_due(&self, last_sync_time: Option<i64>, now: i64) -> bool {
        if !self.auto_sync {
            return false;
        }
        let interval_ms = i64::from(self.sync_interval_minutes) * 60_000;
        last_sync_time.is_none_or(|last| now - last >= interval_ms)
    }
}

/// Per-user sync bookkeeping.
///
/// Absence forces a full sync; presence enables incremental sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    pub user_id: String,
    /// Unix milliseconds
    pub last_sync_time: i64,
    pub last_journal_sync_time: i64,
    pub last_profile_sync_time: i64,
}

impl SyncMetadata {
    /// Metadata with every timestamp set to `now`.
    #[must_use]
    pub fn fresh(user_id: &str, now: i64) -> Self {
        Self {
            user_id: user_id.to_string(),
            last_sync_time: now,
            last_journal_sync_time: now,
            last_profile_sync_time: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_due() {
        let settings = Settings::defaults("u1");
        assert!(settings.refresh_due(None, 1_000));
        assert!(!settings.refresh_due(Some(0), 60_000));
        assert!(settings.refresh_due(Some(0), 15 * 60_000));

        let manual = Settings {
            auto_sync: false,
            ..Settings::defaults("u1")
        };
        assert!(!manual.refresh_due(None, 1_000));
    }

    #[test]
    fn test_settings_deserialize_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"user_id":"u1"}"#).unwrap();
        assert_eq!(settings, Settings::defaults("u1"));
    }
}
