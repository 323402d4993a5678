//! Sync engine.
//!
//! Reconciles the remote store into the local cache. Every pass for a user
//! runs under that user's lock, fetches everything it needs first, then
//! writes its staged changes in one synchronous block. A pass that exceeds
//! the configured timeout is dropped at its current await point and writes
//! nothing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{JournalEntry, Profile, SyncMetadata};
use crate::storage::{CacheStore, CollectionChanges, EventType, StagedChanges};
use crate::sync::diff::{self, ProfilePlan};
use crate::sync::remote::RemoteStore;
use crate::sync::types::{EntityDiff, SyncKind, SyncReport};
use crate::validate::normalize_date;

/// Default bound on a single pass.
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// Engine tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SYNC_TIMEOUT,
        }
    }
}

type FlightKey = (String, SyncKind);
type FlightMap = HashMap<FlightKey, watch::Receiver<Option<SyncReport>>>;

pub struct SyncEngine {
    cache: Arc<Mutex<CacheStore>>,
    config: EngineConfig,
    user_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    in_flight: Mutex<FlightMap>,
}

/// Removes a single-flight registration when the leading pass ends or is
/// dropped.
struct FlightGuard<'a> {
    map: &'a Mutex<FlightMap>,
    key: FlightKey,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        lock(self.map).remove(&self.key);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl SyncEngine {
    #[must_use]
    pub fn new(cache: Arc<Mutex<CacheStore>>, config: EngineConfig) -> Self {
        Self {
            cache,
            config,
            user_locks: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<Mutex<CacheStore>> {
        &self.cache
    }

    /// Replace the local collections with the remote state.
    pub async fn full_sync(&self, user_id: &str, remote: &dyn RemoteStore) -> SyncReport {
        self.coalesced(user_id, SyncKind::Full, remote).await
    }

    /// Apply remote changes since the last pass. Falls back to a full sync
    /// when the user has never been synced.
    pub async fn incremental_sync(&self, user_id: &str, remote: &dyn RemoteStore) -> SyncReport {
        self.coalesced(user_id, SyncKind::Incremental, remote).await
    }

    /// Refresh one entry: store the remote copy, or drop the local one if
    /// the remote has none.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid date, a remote failure, a timeout, or
    /// a cache write failure.
    pub async fn sync_journal_entry(
        &self,
        user_id: &str,
        remote: &dyn RemoteStore,
        date: &str,
    ) -> Result<()> {
        let date = normalize_date(date).map_err(Error::InvalidArgument)?;
        let user_lock = self.user_lock(user_id);
        let _held = user_lock.lock().await;

        let fetched = self.bounded(remote.fetch_entry(user_id, &date)).await?;

        let mut cache = lock(&self.cache);
        match fetched {
            Some(entry) => {
                cache.put_entry(&entry)?;
                cache.record_event(user_id, EventType::EntryRefreshed, Some(date.clone()))?;
                debug!(user_id, date, "Entry refreshed from remote");
            }
            None => {
                if cache.delete_entry(user_id, &date)? {
                    cache.record_event(user_id, EventType::EntryRemoved, Some(date.clone()))?;
                    debug!(user_id, date, "Entry absent remotely, removed locally");
                }
            }
        }
        Ok(())
    }

    /// Refresh the profile set and current-profile pointer only.
    ///
    /// # Errors
    ///
    /// Returns an error for a remote failure, a timeout, or a cache write
    /// failure.
    pub async fn sync_profiles(&self, user_id: &str, remote: &dyn RemoteStore) -> Result<EntityDiff> {
        let user_lock = self.user_lock(user_id);
        let _held = user_lock.lock().await;

        let (profiles, pointer) = self
            .bounded(async {
                tokio::try_join!(remote.list_profiles(), remote.get_current_profile_id())
            })
            .await?;

        let (local_profiles, local_pointer, metadata) = {
            let cache = lock(&self.cache);
            (
                cache.list_profiles(user_id)?,
                cache.current_profile_id(user_id)?,
                cache.get_sync_metadata(user_id)?,
            )
        };

        let plan = diff::diff_profiles(
            &local_profiles,
            local_pointer.as_deref(),
            profiles,
            pointer.as_deref(),
            false,
        );
        let diff = plan.diff;

        let metadata = metadata.map(|m| SyncMetadata {
            last_profile_sync_time: now_ms(),
            ..m
        });
        let changes = StagedChanges {
            metadata,
            event: Some((EventType::ProfilesRefreshed, Some(format!("profiles {diff}")))),
            ..profile_changes(plan)
        };
        lock(&self.cache).apply_changes("sync_profiles", user_id, &changes)?;

        info!(user_id, profiles = %diff, "Profiles refreshed");
        Ok(diff)
    }

    /// Run a pass, or join an identical one already in flight.
    async fn coalesced(&self, user_id: &str, kind: SyncKind, remote: &dyn RemoteStore) -> SyncReport {
        let key = (user_id.to_string(), kind);

        let (sender, follower) = {
            let mut flights = lock(&self.in_flight);
            if let Some(rx) = flights.get(&key) {
                (None, Some(rx.clone()))
            } else {
                let (tx, rx) = watch::channel(None);
                flights.insert(key.clone(), rx);
                (Some(tx), None)
            }
        };

        if let Some(mut rx) = follower {
            debug!(user_id, kind = kind.as_str(), "Joining in-flight sync");
            let shared = rx
                .wait_for(Option::is_some)
                .await
                .ok()
                .and_then(|report| (*report).clone());
            return shared.unwrap_or_else(|| SyncReport::failed("in-flight sync was cancelled"));
        }

        let _guard = FlightGuard {
            map: &self.in_flight,
            key,
        };
        let report = self.run_pass(user_id, kind, remote).await;
        if let Some(tx) = sender {
            tx.send_replace(Some(report.clone()));
        }
        report
    }

    async fn run_pass(&self, user_id: &str, kind: SyncKind, remote: &dyn RemoteStore) -> SyncReport {
        let user_lock = self.user_lock(user_id);
        let _held = user_lock.lock().await;
        let started = Instant::now();

        let kind = match kind {
            SyncKind::Incremental if self.needs_full_sync(user_id) => {
                info!(user_id, "No sync metadata, running full sync");
                SyncKind::Full
            }
            other => other,
        };

        let planned = match kind {
            SyncKind::Full => self.bounded(self.plan_full(user_id, remote)).await,
            SyncKind::Incremental => self.bounded(self.plan_incremental(user_id, remote)).await,
        };

        let outcome = planned.and_then(|(changes, report)| {
            lock(&self.cache).apply_changes(kind.as_str(), user_id, &changes)?;
            Ok(report)
        });

        match outcome {
            Ok(report) => {
                info!(
                    user_id,
                    kind = kind.as_str(),
                    target = remote.target_id(),
                    entries = %report.entries,
                    profiles = %report.profiles,
                    elapsed_ms = started.elapsed().as_millis(),
                    "Sync complete"
                );
                report
            }
            Err(err) => {
                warn!(user_id, kind = kind.as_str(), error = %err, "Sync failed");
                let detail = format!("{}: {err}", kind.as_str());
                if let Err(log_err) =
                    lock(&self.cache).record_event(user_id, EventType::SyncFailed, Some(detail))
                {
                    warn!(user_id, error = %log_err, "Could not record sync failure");
                }
                SyncReport::failed(err.to_string())
            }
        }
    }

    fn needs_full_sync(&self, user_id: &str) -> bool {
        // An unreadable metadata row is treated as missing.
        lock(&self.cache)
            .get_sync_metadata(user_id)
            .map_or(true, |m| m.is_none())
    }

    async fn plan_full(
        &self,
        user_id: &str,
        remote: &dyn RemoteStore,
    ) -> Result<(StagedChanges, SyncReport)> {
        let (entries, profiles, pointer) = tokio::try_join!(
            remote.list_entries(user_id),
            remote.list_profiles(),
            remote.get_current_profile_id()
        )?;
        let (local_entries, local_profiles, local_pointer) = self.read_local(user_id)?;

        let entry_plan = diff::replace_entries(&local_entries, entries);
        let profile_plan = diff::diff_profiles(
            &local_profiles,
            local_pointer.as_deref(),
            profiles,
            pointer.as_deref(),
            true,
        );

        let report = SyncReport::succeeded(entry_plan.diff, profile_plan.diff);
        let changes = StagedChanges {
            entries: entry_plan.changes,
            profiles: profile_plan.changes,
            current_profile_id: Some(profile_plan.current_id),
            metadata: Some(SyncMetadata::fresh(user_id, now_ms())),
            event: Some((EventType::FullSync, Some(report.summary()))),
        };
        Ok((changes, report))
    }

    async fn plan_incremental(
        &self,
        user_id: &str,
        remote: &dyn RemoteStore,
    ) -> Result<(StagedChanges, SyncReport)> {
        let (entries, profiles, pointer) = tokio::try_join!(
            remote.list_entries(user_id),
            remote.list_profiles(),
            remote.get_current_profile_id()
        )?;
        let (local_entries, local_profiles, local_pointer) = self.read_local(user_id)?;

        let entry_plan = diff::diff_entries(&local_entries, &entries);
        let profile_plan = diff::diff_profiles(
            &local_profiles,
            local_pointer.as_deref(),
            profiles,
            pointer.as_deref(),
            false,
        );

        let report = SyncReport::succeeded(entry_plan.diff, profile_plan.diff);
        let changes = StagedChanges {
            entries: entry_plan.changes,
            metadata: Some(SyncMetadata::fresh(user_id, now_ms())),
            event: Some((EventType::IncrementalSync, Some(report.summary()))),
            ..profile_changes(profile_plan)
        };
        Ok((changes, report))
    }

    fn read_local(&self, user_id: &str) -> Result<(Vec<JournalEntry>, Vec<Profile>, Option<String>)> {
        let cache = lock(&self.cache);
        Ok((
            cache.list_entries(user_id)?,
            cache.list_profiles(user_id)?,
            cache.current_profile_id(user_id)?,
        ))
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.config.timeout, fut)
            .await
            .map_err(|_| Error::SyncTimeout {
                seconds: self.config.timeout.as_secs(),
            })?
    }

    fn user_lock(&self, user_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        Arc::clone(lock(&self.user_locks).entry(user_id.to_string()).or_default())
    }
}

/// Profile half of a staged change set.
fn profile_changes(plan: ProfilePlan) -> StagedChanges {
    StagedChanges {
        entries: CollectionChanges::default(),
        profiles: plan.changes,
        current_profile_id: plan.pointer_changed.then_some(plan.current_id),
        metadata: None,
        event: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DEFAULT_PROFILE_ID;
    use crate::sync::memory::MemoryRemoteStore;

    fn engine() -> SyncEngine {
        engine_with_timeout(Duration::from_secs(5))
    }

    fn engine_with_timeout(timeout: Duration) -> SyncEngine {
        let cache = CacheStore::open_memory().unwrap();
        SyncEngine::new(Arc::new(Mutex::new(cache)), EngineConfig { timeout })
    }

    fn entry(date: &str, updated_at: i64) -> JournalEntry {
        let mut e = JournalEntry::new("u1", date, 3, format!("Summary for {date}"));
        e.created_at = 1_700_000_000_000;
        e.updated_at = updated_at;
        e
    }

    fn coach() -> Profile {
        Profile {
            id: "coach".into(),
            name: "Coach".into(),
            description: "Direct".into(),
            system_prompt: "Be brief".into(),
            response_count: 2,
            created_at: 1_700_000_000_000,
            updated_at: 1_700_000_000_000,
            is_current: false,
        }
    }

    async fn seeded_remote() -> MemoryRemoteStore {
        let remote = MemoryRemoteStore::new();
        remote.write_entry(&entry("2024-01-01", 1_700_000_000_000)).await.unwrap();
        remote.write_entry(&entry("2024-01-02", 1_700_000_000_000)).await.unwrap();
        remote.write_profile(&coach()).await.unwrap();
        remote.set_current_profile_id("coach").await.unwrap();
        remote
    }

    fn current_ids(engine: &SyncEngine) -> Vec<String> {
        lock(engine.cache())
            .list_profiles("u1")
            .unwrap()
            .into_iter()
            .filter(|p| p.is_current)
            .map(|p| p.id)
            .collect()
    }

    #[tokio::test]
    async fn test_full_sync_converges() {
        let engine = engine();
        let remote = seeded_remote().await;

        let report = engine.full_sync("u1", &remote).await;
        assert!(report.success, "{report:?}");
        assert_eq!(report.entries, EntityDiff::new(2, 0, 0));
        assert_eq!(report.profiles, EntityDiff::new(2, 0, 0));

        let cache = lock(engine.cache());
        let dates: Vec<_> = cache.list_entries("u1").unwrap().into_iter().map(|e| e.date).collect();
        assert_eq!(dates, vec!["2024-01-02", "2024-01-01"]);
        let profiles = cache.list_profiles("u1").unwrap();
        assert_eq!(profiles[0].id, DEFAULT_PROFILE_ID);
        assert!(cache.get_sync_metadata("u1").unwrap().is_some());
        drop(cache);

        assert_eq!(current_ids(&engine), vec!["coach"]);
    }

    #[tokio::test]
    async fn test_incremental_is_idempotent() {
        let engine = engine();
        let remote = seeded_remote().await;

        engine.full_sync("u1", &remote).await;
        let first = engine.incremental_sync("u1", &remote).await;
        let second = engine.incremental_sync("u1", &remote).await;

        assert!(first.success && second.success);
        assert!(first.is_empty(), "{first:?}");
        assert!(second.is_empty(), "{second:?}");
    }

    #[tokio::test]
    async fn test_incremental_scenario_counts() {
        let engine = engine();
        {
            let mut cache = lock(engine.cache());
            cache
                .put_entries(
                    "u1",
                    &[entry("2024-01-01", 100), entry("2024-01-02", 100), entry("2024-01-03", 100)],
                )
                .unwrap();
            cache.put_sync_metadata(&SyncMetadata::fresh("u1", 1)).unwrap();
        }

        let remote = MemoryRemoteStore::new();
        let mut newer = entry("2024-01-02", 200);
        newer.summary = "Rewritten".into();
        remote.write_entry(&newer).await.unwrap();
        remote.write_entry(&entry("2024-01-04", 100)).await.unwrap();

        let report = engine.incremental_sync("u1", &remote).await;
        assert!(report.success, "{report:?}");
        assert_eq!(report.entries, EntityDiff::new(1, 1, 2));

        let cache = lock(engine.cache());
        let dates: Vec<_> = cache.list_entries("u1").unwrap().into_iter().map(|e| e.date).collect();
        assert_eq!(dates, vec!["2024-01-04", "2024-01-02"]);
        assert_eq!(cache.get_entry("u1", "2024-01-02").unwrap().unwrap().summary, "Rewritten");
        assert!(cache.get_sync_metadata("u1").unwrap().unwrap().last_sync_time > 1);
    }

    #[tokio::test]
    async fn test_incremental_without_metadata_runs_full() {
        let engine = engine();
        let remote = seeded_remote().await;

        let report = engine.incremental_sync("u1", &remote).await;
        assert!(report.success);
        assert_eq!(report.entries.added, 2);

        let events = lock(engine.cache()).recent_events("u1", Some(1)).unwrap();
        assert_eq!(events[0].event_type, EventType::FullSync);
    }

    #[tokio::test]
    async fn test_deletions_propagate_but_default_survives() {
        let engine = engine();
        let remote = seeded_remote().await;
        engine.full_sync("u1", &remote).await;

        remote.delete_entry("2024-01-01").await.unwrap();
        remote.delete_profile("coach").await.unwrap();

        let report = engine.incremental_sync("u1", &remote).await;
        assert_eq!(report.entries, EntityDiff::new(0, 0, 1));
        // coach removed, default becomes current
        assert_eq!(report.profiles, EntityDiff::new(0, 1, 1));
        assert_eq!(current_ids(&engine), vec![DEFAULT_PROFILE_ID]);
    }

    #[tokio::test]
    async fn test_remote_failure_reports_and_keeps_cache() {
        let engine = engine();
        let remote = seeded_remote().await;
        engine.full_sync("u1", &remote).await;
        let before = lock(engine.cache()).get_sync_metadata("u1").unwrap();

        remote.set_unavailable(true);
        let report = engine.incremental_sync("u1", &remote).await;

        assert!(!report.success);
        assert!(report.error.is_some());
        let cache = lock(engine.cache());
        assert_eq!(cache.get_sync_metadata("u1").unwrap(), before);
        assert_eq!(cache.list_entries("u1").unwrap().len(), 2);
        assert_eq!(
            cache.recent_events("u1", Some(1)).unwrap()[0].event_type,
            EventType::SyncFailed
        );
    }

    #[tokio::test]
    async fn test_timeout_writes_nothing() {
        let engine = engine_with_timeout(Duration::from_millis(50));
        let remote = seeded_remote().await;
        remote.set_latency(Duration::from_millis(300));

        let report = engine.full_sync("u1", &remote).await;

        assert!(!report.success);
        assert!(report.error.unwrap().contains("timed out"));
        let cache = lock(engine.cache());
        assert!(cache.get_sync_metadata("u1").unwrap().is_none());
        assert!(cache.list_entries("u1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_coalesced() {
        let engine = engine();
        let remote = seeded_remote().await;
        remote.set_latency(Duration::from_millis(100));

        let (a, b) = tokio::join!(
            engine.incremental_sync("u1", &remote),
            engine.incremental_sync("u1", &remote)
        );

        assert_eq!(a, b);
        assert!(a.success);
        assert_eq!(remote.entry_listings(), 1);

        // A later request runs again
        engine.incremental_sync("u1", &remote).await;
        assert_eq!(remote.entry_listings(), 2);
    }

    #[tokio::test]
    async fn test_sync_journal_entry() {
        let engine = engine();
        let remote = seeded_remote().await;

        engine.sync_journal_entry("u1", &remote, "2024-01-01").await.unwrap();
        assert!(lock(engine.cache()).get_entry("u1", "2024-01-01").unwrap().is_some());

        remote.delete_entry("2024-01-01").await.unwrap();
        engine.sync_journal_entry("u1", &remote, "2024-01-01").await.unwrap();
        assert!(lock(engine.cache()).get_entry("u1", "2024-01-01").unwrap().is_none());
        // Single-entry refresh does not count as a sync pass
        assert!(lock(engine.cache()).get_sync_metadata("u1").unwrap().is_none());

        assert!(engine.sync_journal_entry("u1", &remote, "yesterday").await.is_err());
    }

    #[tokio::test]
    async fn test_sync_profiles_follows_pointer() {
        let engine = engine();
        let remote = seeded_remote().await;
        engine.full_sync("u1", &remote).await;
        let before = lock(engine.cache()).get_sync_metadata("u1").unwrap().unwrap();

        remote.set_current_profile_id(DEFAULT_PROFILE_ID).await.unwrap();
        let diff = engine.sync_profiles("u1", &remote).await.unwrap();

        assert_eq!(diff, EntityDiff::new(0, 2, 0));
        assert_eq!(current_ids(&engine), vec![DEFAULT_PROFILE_ID]);
        let after = lock(engine.cache()).get_sync_metadata("u1").unwrap().unwrap();
        assert_eq!(after.last_journal_sync_time, before.last_journal_sync_time);
        assert!(after.last_profile_sync_time >= before.last_profile_sync_time);
    }

    #[tokio::test]
    async fn test_single_current_after_any_sequence() {
        let engine = engine();
        let remote = seeded_remote().await;
        let mut extra = coach();
        extra.id = "night".into();
        extra.name = "Night owl".into();

        engine.full_sync("u1", &remote).await;
        assert_eq!(current_ids(&engine).len(), 1);

        remote.write_profile(&extra).await.unwrap();
        remote.set_current_profile_id("night").await.unwrap();
        engine.incremental_sync("u1", &remote).await;
        assert_eq!(current_ids(&engine), vec!["night"]);

        remote.set_current_profile_id("").await.unwrap();
        engine.sync_profiles("u1", &remote).await.unwrap();
        assert_eq!(current_ids(&engine), vec![DEFAULT_PROFILE_ID]);

        remote.set_current_profile_id("ghost").await.unwrap();
        engine.full_sync("u1", &remote).await;
        assert_eq!(current_ids(&engine), vec![DEFAULT_PROFILE_ID]);
    }
}
