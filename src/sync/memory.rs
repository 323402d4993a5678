//! In-memory remote store.
//!
//! Holds encoded documents in memory, so entries still go through the codec
//! exactly as they would on disk. Useful for embedders without a filesystem
//! remote and as the remote in engine tests, which can also inject latency
//! and outages.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use crate::codec;
use crate::error::{Error, Result};
use crate::model::{JournalEntry, Profile};
use crate::sync::remote::RemoteStore;

static INMEM_NEXT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct Documents {
    /// date -> encoded entry document
    entries: BTreeMap<String, String>,
    profiles: BTreeMap<String, Profile>,
    current_profile_id: Option<String>,
}

#[derive(Debug)]
pub struct MemoryRemoteStore {
    target_id: String,
    docs: Mutex<Documents>,
    unavailable: AtomicBool,
    latency_ms: AtomicU64,
    entry_listings: AtomicUsize,
}

impl MemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        let id = INMEM_NEXT_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            target_id: format!("inmem:{id}"),
            docs: Mutex::new(Documents::default()),
            unavailable: AtomicBool::new(false),
            latency_ms: AtomicU64::new(0),
            entry_listings: AtomicUsize::new(0),
        }
    }

    /// Make every call fail with a remote error until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        let millis = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(millis, Ordering::SeqCst);
    }

    /// Number of `list_entries` calls served so far.
    #[must_use]
    pub fn entry_listings(&self) -> usize {
        self.entry_listings.load(Ordering::SeqCst)
    }

    /// Store a raw document under `date`, bypassing the codec.
    pub fn insert_raw_document(&self, date: &str, document: &str) {
        self.docs()
            .entries
            .insert(date.to_string(), document.to_string());
    }

    fn docs(&self) -> MutexGuard<'_, Documents> {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn simulate_network(&self) -> Result<()> {
        let latency = self.latency_ms.load(Ordering::SeqCst);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Remote(format!("{} is unavailable", self.target_id)));
        }
        Ok(())
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_logged(date: &str, document: &str, user_id: &str) -> Option<JournalEntry> {
    let entry = codec::decode(document, user_id, date);
    if entry.is_none() {
        warn!(date, "Skipping unreadable journal document");
    }
    entry
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    fn target_id(&self) -> &str {
        &self.target_id
    }

    async fn list_entries(&self, user_id: &str) -> Result<Vec<JournalEntry>> {
        self.entry_listings.fetch_add(1, Ordering::SeqCst);
        self.simulate_network().await?;
        let docs = self.docs();
        Ok(docs
            .entries
            .iter()
            .filter_map(|(date, doc)| decode_logged(date, doc, user_id))
            .collect())
    }

    async fn fetch_entry(&self, user_id: &str, date: &str) -> Result<Option<JournalEntry>> {
        self.simulate_network().await?;
        let docs = self.docs();
        Ok(docs
            .entries
            .get(date)
            .and_then(|doc| decode_logged(date, doc, user_id)))
    }

    async fn write_entry(&self, entry: &JournalEntry) -> Result<()> {
        self.simulate_network().await?;
        self.docs()
            .entries
            .insert(entry.date.clone(), codec::encode(entry));
        Ok(())
    }

    async fn delete_entry(&self, date: &str) -> Result<()> {
        self.simulate_network().await?;
        self.docs().entries.remove(date);
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.simulate_network().await?;
        Ok(self.docs().profiles.values().cloned().collect())
    }

    async fn write_profile(&self, profile: &Profile) -> Result<()> {
        self.simulate_network().await?;
        let stored = profile.clone().normalized().with_current(false);
        self.docs().profiles.insert(stored.id.clone(), stored);
        Ok(())
    }

    async fn delete_profile(&self, id: &str) -> Result<()> {
        self.simulate_network().await?;
        self.docs().profiles.remove(id);
        Ok(())
    }

    async fn get_current_profile_id(&self) -> Result<Option<String>> {
        self.simulate_network().await?;
        Ok(self.docs().current_profile_id.clone())
    }

    async fn set_current_profile_id(&self, id: &str) -> Result<()> {
        self.simulate_network().await?;
        self.docs().current_profile_id = Some(id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_entries_go_through_codec() {
        let store = MemoryRemoteStore::new();
        let entry = JournalEntry::new("u1", "2024-03-01", 2, "Tired".into());
        store.write_entry(&entry).await.unwrap();
        store.insert_raw_document("2024-03-02", "not a journal entry");

        let entries = store.list_entries("u1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].summary, "Tired");
        assert_eq!(store.entry_listings(), 1);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let store = MemoryRemoteStore::new();
        store.set_unavailable(true);
        assert!(matches!(store.list_profiles().await, Err(Error::Remote(_))));

        store.set_unavailable(false);
        assert!(store.list_profiles().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_profiles_stored_without_current_flag() {
        let store = MemoryRemoteStore::new();
        store
            .write_profile(&Profile::default_profile().with_current(true))
            .await
            .unwrap();
        assert!(!store.list_profiles().await.unwrap()[0].is_current);
    }
}
