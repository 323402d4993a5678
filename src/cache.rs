//! Journal cache facade.
//!
//! The interface the rest of an application talks to. Reads come straight
//! from the local cache. Writes go to the remote store first and are then
//! pulled back through the sync engine, so the cache only ever holds what
//! the remote accepted.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::info;

use crate::error::{Error, Result};
use crate::model::{JournalEntry, Profile, Settings, DEFAULT_PROFILE_ID};
use crate::storage::CacheStore;
use crate::sync::{
    get_sync_status, EngineConfig, EntityDiff, RemoteStore, SyncEngine, SyncKind, SyncReport,
    SyncStatus,
};
use crate::validate::{
    clamp_response_count, find_similar_ids, normalize_date, normalize_theme, validate_mood,
    validate_profile_id,
};

const EVENT_CHANNEL_CAP: usize = 64;

/// Change notifications for subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheEvent {
    EntriesChanged,
    ProfilesChanged,
    SettingsChanged,
    Synced { report: SyncReport },
    SignedOut,
}

/// One user's view of the journal.
pub struct JournalCache {
    engine: SyncEngine,
    remote: Arc<dyn RemoteStore>,
    user_id: String,
    events: broadcast::Sender<CacheEvent>,
}

impl JournalCache {
    #[must_use]
    pub fn new(
        store: CacheStore,
        remote: Arc<dyn RemoteStore>,
        user_id: &str,
        config: EngineConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAP);
        Self {
            engine: SyncEngine::new(Arc::new(Mutex::new(store)), config),
            remote,
            user_id: user_id.to_string(),
            events,
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    /// Receive change notifications from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    fn store(&self) -> MutexGuard<'_, CacheStore> {
        self.engine
            .cache()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, event: CacheEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    // ==================
    // Reads
    // ==================

    /// All entries, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache query fails.
    pub fn entries(&self) -> Result<Vec<JournalEntry>> {
        self.store().list_entries(&self.user_id)
    }

    /// # Errors
    ///
    /// Returns an error for an invalid date or a failed cache query.
    pub fn entry(&self, date: &str) -> Result<Option<JournalEntry>> {
        let date = normalize_date(date).map_err(Error::InvalidArgument)?;
        self.store().get_entry(&self.user_id, &date)
    }

    /// Profiles with exactly one marked current.
    ///
    /// Before the first sync this is the built-in default profile alone.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache query fails.
    pub fn profiles(&self) -> Result<Vec<Profile>> {
        let profiles = self.store().list_profiles(&self.user_id)?;
        if profiles.iter().any(Profile::is_default) {
            return Ok(profiles);
        }
        let mut with_default = vec![Profile::default_profile()];
        with_default.extend(profiles);
        let current = with_default
            .iter()
            .position(|p| p.is_current)
            .unwrap_or(0);
        with_default[current].is_current = true;
        Ok(with_default)
    }

    /// # Errors
    ///
    /// Returns an error if the cache query fails.
    pub fn current_profile(&self) -> Result<Profile> {
        let profiles = self.profiles()?;
        Ok(profiles
            .into_iter()
            .find(|p| p.is_current)
            .unwrap_or_else(|| Profile::default_profile().with_current(true)))
    }

    /// # Errors
    ///
    /// Returns an error if the cache query fails.
    pub fn settings(&self) -> Result<Settings> {
        self.store().get_settings(&self.user_id)
    }

    /// Save local settings. The theme is normalized; the timestamp is set here.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown theme or a failed cache write.
    pub fn update_settings(&self, settings: Settings) -> Result<Settings> {
        let theme = normalize_theme(&settings.theme).map_err(|(value, suggestion)| {
            let hint = suggestion.map_or_else(String::new, |s| format!(" (did you mean '{s}'?)"));
            Error::InvalidArgument(format!("Unknown theme '{value}'{hint}"))
        })?;
        let saved = Settings {
            user_id: self.user_id.clone(),
            theme,
            sync_interval_minutes: settings.sync_interval_minutes.max(1),
            updated_at: chrono::Utc::now().timestamp_millis(),
            ..settings
        };
        self.store().put_settings(&saved)?;
        self.notify(CacheEvent::SettingsChanged);
        Ok(saved)
    }

    /// # Errors
    ///
    /// Returns an error if the cache query fails.
    pub fn sync_status(&self) -> Result<SyncStatus> {
        get_sync_status(&self.store(), &self.user_id)
    }

    // ==================
    // Sync
    // ==================

    /// Run a sync pass and notify subscribers.
    pub async fn refresh(&self, kind: SyncKind) -> SyncReport {
        let report = match kind {
            SyncKind::Full => self.engine.full_sync(&self.user_id, self.remote.as_ref()).await,
            SyncKind::Incremental => {
                self.engine
                    .incremental_sync(&self.user_id, self.remote.as_ref())
                    .await
            }
        };

        if report.success {
            if !report.entries.is_empty() {
                self.notify(CacheEvent::EntriesChanged);
            }
            if !report.profiles.is_empty() {
                self.notify(CacheEvent::ProfilesChanged);
            }
        }
        self.notify(CacheEvent::Synced {
            report: report.clone(),
        });
        report
    }

    /// Run an incremental pass if settings say one is due.
    ///
    /// # Errors
    ///
    /// Returns an error if settings or metadata cannot be read.
    pub async fn refresh_if_due(&self) -> Result<Option<SyncReport>> {
        let (settings, metadata) = {
            let store = self.store();
            (
                store.get_settings(&self.user_id)?,
                store.get_sync_metadata(&self.user_id)?,
            )
        };
        let now = chrono::Utc::now().timestamp_millis();
        if !settings.refresh_due(metadata.map(|m| m.last_sync_time), now) {
            return Ok(None);
        }
        Ok(Some(self.refresh(SyncKind::Incremental).await))
    }

    /// Pull one entry from the remote.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid date, or if the remote read or cache
    /// write fails.
    pub async fn sync_entry(&self, date: &str) -> Result<()> {
        let date = normalize_date(date).map_err(Error::InvalidArgument)?;
        self.engine
            .sync_journal_entry(&self.user_id, self.remote.as_ref(), &date)
            .await?;
        self.notify(CacheEvent::EntriesChanged);
        Ok(())
    }

    /// Pull profiles and the current-profile pointer from the remote.
    ///
    /// # Errors
    ///
    /// Returns an error if the remote read or cache write fails.
    pub async fn sync_profiles(&self) -> Result<EntityDiff> {
        let diff = self
            .engine
            .sync_profiles(&self.user_id, self.remote.as_ref())
            .await?;
        self.notify(CacheEvent::ProfilesChanged);
        Ok(diff)
    }

    // ==================
    // Writes
    // ==================

    /// Write an entry to the remote, then refresh it locally.
    ///
    /// The entry is re-keyed to this user. `created_at` is kept from an
    /// existing copy; `updated_at` is stamped now.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid date or mood, or if the remote write
    /// or refresh fails.
    pub async fn save_entry(&self, entry: JournalEntry) -> Result<JournalEntry> {
        let date = normalize_date(&entry.date).map_err(Error::InvalidArgument)?;
        let mood = validate_mood(i64::from(entry.mood)).map_err(Error::InvalidArgument)?;
        let existing = self.store().get_entry(&self.user_id, &date)?;

        let now = chrono::Utc::now().timestamp_millis();
        let entry = JournalEntry {
            id: crate::sync::entry_id(&self.user_id, &date),
            user_id: self.user_id.clone(),
            date: date.clone(),
            mood,
            created_at: existing.map_or(now, |e| e.created_at),
            updated_at: now,
            ..entry
        };

        self.remote.write_entry(&entry).await?;
        self.engine
            .sync_journal_entry(&self.user_id, self.remote.as_ref(), &date)
            .await?;

        info!(user_id = %self.user_id, date, "Entry saved");
        self.notify(CacheEvent::EntriesChanged);
        Ok(entry)
    }

    /// Delete an entry remotely, then drop it locally.
    ///
    /// # Errors
    ///
    /// Returns `Error::EntryNotFound` if the cache has no such entry, or an
    /// error if the remote delete or refresh fails.
    pub async fn delete_entry(&self, date: &str) -> Result<()> {
        let date = normalize_date(date).map_err(Error::InvalidArgument)?;
        if self.store().get_entry(&self.user_id, &date)?.is_none() {
            return Err(Error::EntryNotFound { date });
        }

        self.remote.delete_entry(&date).await?;
        self.engine
            .sync_journal_entry(&self.user_id, self.remote.as_ref(), &date)
            .await?;

        info!(user_id = %self.user_id, date, "Entry deleted");
        self.notify(CacheEvent::EntriesChanged);
        Ok(())
    }

    /// Create or update a profile remotely, then refresh profiles.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid id, or if the remote write or refresh
    /// fails.
    pub async fn save_profile(&self, profile: Profile) -> Result<Profile> {
        validate_profile_id(&profile.id).map_err(Error::InvalidArgument)?;
        if profile.name.trim().is_empty() {
            return Err(Error::InvalidArgument("Profile name cannot be empty".into()));
        }
        let existing = self.store().get_profile(&self.user_id, &profile.id)?;

        let now = chrono::Utc::now().timestamp_millis();
        let profile = Profile {
            response_count: clamp_response_count(i64::from(profile.response_count)),
            created_at: existing.as_ref().map_or(now, |p| p.created_at),
            updated_at: now,
            is_current: false,
            ..profile
        };

        self.remote.write_profile(&profile).await?;
        self.refresh_profiles().await?;

        info!(user_id = %self.user_id, id = %profile.id, "Profile saved");
        Ok(profile)
    }

    /// Delete a profile remotely. If it was current, the default takes over.
    ///
    /// # Errors
    ///
    /// Returns `Error::ProtectedProfile` for the default profile,
    /// `Error::ProfileNotFound` for an unknown id, or a remote error.
    pub async fn delete_profile(&self, id: &str) -> Result<()> {
        if id == DEFAULT_PROFILE_ID {
            return Err(Error::ProtectedProfile);
        }
        let profile = self.require_profile(id)?;

        if profile.is_current {
            self.remote.set_current_profile_id(DEFAULT_PROFILE_ID).await?;
        }
        self.remote.delete_profile(id).await?;
        self.refresh_profiles().await?;

        info!(user_id = %self.user_id, id, "Profile deleted");
        Ok(())
    }

    /// Make `id` the current profile.
    ///
    /// # Errors
    ///
    /// Returns `Error::ProfileNotFound` for an unknown id, or a remote error.
    pub async fn select_profile(&self, id: &str) -> Result<Profile> {
        self.require_profile(id)?;

        self.remote.set_current_profile_id(id).await?;
        self.refresh_profiles().await?;

        info!(user_id = %self.user_id, id, "Profile selected");
        self.current_profile()
    }

    /// Remove everything cached for this user.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache cannot be cleared.
    pub fn sign_out(&self) -> Result<()> {
        self.store().clear_user_data(&self.user_id)?;
        info!(user_id = %self.user_id, "Local data cleared");
        self.notify(CacheEvent::SignedOut);
        Ok(())
    }

    async fn refresh_profiles(&self) -> Result<()> {
        self.sync_profiles().await.map(|_| ())
    }

    fn require_profile(&self, id: &str) -> Result<Profile> {
        let profiles = self.profiles()?;
        if let Some(profile) = profiles.iter().find(|p| p.id == id) {
            return Ok(profile.clone());
        }
        let ids: Vec<String> = profiles.into_iter().map(|p| p.id).collect();
        let similar = find_similar_ids(id, &ids, 3);
        Err(if similar.is_empty() {
            Error::ProfileNotFound { id: id.to_string() }
        } else {
            Error::ProfileNotFoundSimilar {
                id: id.to_string(),
                similar,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::MemoryRemoteStore;

    fn cache_with_remote() -> (JournalCache, Arc<MemoryRemoteStore>) {
        let remote = Arc::new(MemoryRemoteStore::new());
        let cache = JournalCache::new(
            CacheStore::open_memory().unwrap(),
            remote.clone(),
            "u1",
            EngineConfig::default(),
        );
        (cache, remote)
    }

    #[test]
    fn test_profiles_before_first_sync() {
        let (cache, _) = cache_with_remote();
        let profiles = cache.profiles().unwrap();
        assert_eq!(profiles.len(), 1);
        assert!(profiles[0].is_current);
        assert_eq!(cache.current_profile().unwrap().id, DEFAULT_PROFILE_ID);
    }

    #[tokio::test]
    async fn test_save_entry_writes_remote_first() {
        let (cache, remote) = cache_with_remote();
        let mut events = cache.subscribe();

        let draft = JournalEntry::new("someone-else", "2024-5-6", 4, "Sunny".into());
        let saved = cache.save_entry(draft).await.unwrap();

        assert_eq!(saved.user_id, "u1");
        assert_eq!(saved.date, "2024-05-06");
        assert!(remote.fetch_entry("u1", "2024-05-06").await.unwrap().is_some());
        assert_eq!(cache.entry("2024-05-06").unwrap().unwrap().summary, "Sunny");
        assert_eq!(events.recv().await.unwrap(), CacheEvent::EntriesChanged);
    }

    #[tokio::test]
    async fn test_save_entry_remote_failure_leaves_cache() {
        let (cache, remote) = cache_with_remote();
        remote.set_unavailable(true);

        let draft = JournalEntry::new("u1", "2024-05-06", 4, "Sunny".into());
        assert!(cache.save_entry(draft).await.is_err());
        assert!(cache.entry("2024-05-06").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let (cache, _) = cache_with_remote();
        assert!(matches!(
            cache.delete_entry("2024-05-06").await,
            Err(Error::EntryNotFound { .. })
        ));

        cache
            .save_entry(JournalEntry::new("u1", "2024-05-06", 2, "Meh".into()))
            .await
            .unwrap();
        cache.delete_entry("2024-05-06").await.unwrap();
        assert!(cache.entries().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_profile_lifecycle() {
        let (cache, remote) = cache_with_remote();
        cache.refresh(SyncKind::Full).await;

        let coach = Profile::new("Coach".into(), "Direct".into(), "Be brief".into(), 12);
        let saved = cache.save_profile(coach.clone()).await.unwrap();
        assert_eq!(saved.response_count, 10);

        let current = cache.select_profile(&coach.id).await.unwrap();
        assert_eq!(current.id, coach.id);
        assert_eq!(
            remote.get_current_profile_id().await.unwrap().as_deref(),
            Some(coach.id.as_str())
        );

        cache.delete_profile(&coach.id).await.unwrap();
        assert_eq!(cache.current_profile().unwrap().id, DEFAULT_PROFILE_ID);
        assert_eq!(cache.profiles().unwrap().len(), 1);

        assert!(matches!(
            cache.delete_profile(DEFAULT_PROFILE_ID).await,
            Err(Error::ProtectedProfile)
        ));
        assert!(cache.select_profile("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_if_due_and_sign_out() {
        let (cache, remote) = cache_with_remote();
        remote
            .write_entry(&JournalEntry::new("u1", "2024-01-01", 3, "ok".into()))
            .await
            .unwrap();

        let report = cache.refresh_if_due().await.unwrap().unwrap();
        assert_eq!(report.entries.added, 1);
        // Just synced, so not due again
        assert!(cache.refresh_if_due().await.unwrap().is_none());

        cache.sign_out().unwrap();
        assert!(cache.entries().unwrap().is_empty());
        assert!(cache.sync_status().unwrap().needs_full_sync());
    }

    #[test]
    fn test_update_settings() {
        let (cache, _) = cache_with_remote();
        let saved = cache
            .update_settings(Settings {
                theme: "Dark".into(),
                ..Settings::defaults("ignored")
            })
            .unwrap();
        assert_eq!(saved.user_id, "u1");
        assert_eq!(saved.theme, "dark");
        assert_eq!(cache.settings().unwrap(), saved);

        assert!(cache
            .update_settings(Settings {
                theme: "neon".into(),
                ..Settings::defaults("u1")
            })
            .is_err());
    }
}
