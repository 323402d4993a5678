//! Directory-backed remote store.
//!
//! Treats a checked-out journal repository as the remote:
//!
//! ```text
//! <root>/journal/YYYY-MM-DD.md     entry documents
//! <root>/profiles/<id>.json        profile documents
//! <root>/profiles/current.json     {"profile_id": "..."}
//! ```
//!
//! Committing and pushing the repository is left to the user's git tooling.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::codec;
use crate::error::{Error, Result};
use crate::model::{JournalEntry, Profile};
use crate::sync::file::{atomic_write, ensure_gitignore, list_files, read_optional, remove_if_exists};
use crate::sync::hash::{has_changed, text_hash};
use crate::sync::remote::RemoteStore;
use crate::validate::{normalize_date, validate_profile_id};

const ENTRIES_DIR: &str = "journal";
const PROFILES_DIR: &str = "profiles";
const POINTER_FILE: &str = "current.json";

#[derive(Debug, Serialize, Deserialize)]
struct CurrentPointer {
    profile_id: String,
}

#[derive(Clone, Debug)]
pub struct LocalDirRemoteStore {
    root: PathBuf,
    target_id: String,
}

impl LocalDirRemoteStore {
    /// Use `root` as the remote, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)?;
        let canonical = root.canonicalize().unwrap_or_else(|_| root.clone());
        let target_id = format!("localdir:{}", canonical.to_string_lossy());
        Ok(Self { root, target_id })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, date: &str) -> Result<PathBuf> {
        let date = normalize_date(date).map_err(Error::InvalidArgument)?;
        Ok(self.root.join(ENTRIES_DIR).join(format!("{date}.md")))
    }

    fn profile_path(&self, id: &str) -> Result<PathBuf> {
        validate_profile_id(id).map_err(Error::InvalidArgument)?;
        Ok(self.root.join(PROFILES_DIR).join(format!("{id}.json")))
    }

    fn pointer_path(&self) -> PathBuf {
        self.root.join(PROFILES_DIR).join(POINTER_FILE)
    }

    /// Write `content` unless the file already holds exactly that.
    async fn write_if_changed(&self, path: &Path, content: &str) -> Result<()> {
        let existing = read_optional(path).await.map_err(|e| remote_io(path, &e))?;
        let stored_hash = existing.as_deref().map(text_hash);
        if !has_changed(&text_hash(content), stored_hash.as_deref()) {
            debug!(path = %path.display(), "Remote document unchanged, skipping write");
            return Ok(());
        }

        ensure_gitignore(&self.root)
            .await
            .map_err(|e| remote_io(&self.root, &e))?;
        atomic_write(path, content)
            .await
            .map_err(|e| remote_io(path, &e))
    }

    async fn read_entry_file(&self, path: &Path, user_id: &str) -> Result<Option<JournalEntry>> {
        let Some(document) = read_optional(path).await.map_err(|e| remote_io(path, &e))? else {
            return Ok(None);
        };
        let fallback_date = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();

        let entry = codec::decode(&document, user_id, &fallback_date);
        if entry.is_none() {
            warn!(path = %path.display(), "Skipping unreadable journal document");
        }
        Ok(entry)
    }
}

fn remote_io(path: &Path, err: &std::io::Error) -> Error {
    Error::Remote(format!("{}: {err}", path.display()))
}

#[async_trait]
impl RemoteStore for LocalDirRemoteStore {
    fn target_id(&self) -> &str {
        &self.target_id
    }

    async fn list_entries(&self, user_id: &str) -> Result<Vec<JournalEntry>> {
        let dir = self.root.join(ENTRIES_DIR);
        let files = list_files(&dir, "md").await.map_err(|e| remote_io(&dir, &e))?;

        let mut entries = Vec::with_capacity(files.len());
        for path in files {
            if let Some(entry) = self.read_entry_file(&path, user_id).await? {
                entries.push(entry);
            }
        }
        debug!(target = %self.target_id, count = entries.len(), "Listed remote entries");
        Ok(entries)
    }

    async fn fetch_entry(&self, user_id: &str, date: &str) -> Result<Option<JournalEntry>> {
        let path = self.entry_path(date)?;
        self.read_entry_file(&path, user_id).await
    }

    async fn write_entry(&self, entry: &JournalEntry) -> Result<()> {
        let path = self.entry_path(&entry.date)?;
        self.write_if_changed(&path, &codec::encode(entry)).await
    }

    async fn delete_entry(&self, date: &str) -> Result<()> {
        let path = self.entry_path(date)?;
        remove_if_exists(&path)
            .await
            .map_err(|e| remote_io(&path, &e))?;
        Ok(())
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let dir = self.root.join(PROFILES_DIR);
        let files = list_files(&dir, "json").await.map_err(|e| remote_io(&dir, &e))?;

        let mut profiles = Vec::with_capacity(files.len());
        for path in files {
            if path.file_name().is_some_and(|n| n == POINTER_FILE) {
                continue;
            }
            let Some(text) = read_optional(&path).await.map_err(|e| remote_io(&path, &e))? else {
                continue;
            };
            match serde_json::from_str::<Profile>(&text) {
                Ok(profile) => profiles.push(profile.normalized().with_current(false)),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable profile document"),
            }
        }
        Ok(profiles)
    }

    async fn write_profile(&self, profile: &Profile) -> Result<()> {
        let path = self.profile_path(&profile.id)?;
        let stored = profile.clone().with_current(false);
        let mut content = serde_json::to_string_pretty(&stored)?;
        content.push('\n');
        self.write_if_changed(&path, &content).await
    }

    async fn delete_profile(&self, id: &str) -> Result<()> {
        let path = self.profile_path(id)?;
        remove_if_exists(&path)
            .await
            .map_err(|e| remote_io(&path, &e))?;
        Ok(())
    }

    async fn get_current_profile_id(&self) -> Result<Option<String>> {
        let path = self.pointer_path();
        let Some(text) = read_optional(&path).await.map_err(|e| remote_io(&path, &e))? else {
            return Ok(None);
        };
        match serde_json::from_str::<CurrentPointer>(&text) {
            Ok(pointer) => Ok(Some(pointer.profile_id)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable current-profile pointer");
                Ok(None)
            }
        }
    }

    async fn set_current_profile_id(&self, id: &str) -> Result<()> {
        let pointer = CurrentPointer {
            profile_id: id.to_string(),
        };
        let mut content = serde_json::to_string_pretty(&pointer)?;
        content.push('\n');
        self.write_if_changed(&self.pointer_path(), &content).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DEFAULT_PROFILE_ID;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalDirRemoteStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalDirRemoteStore::new(dir.path().join("repo")).unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_empty_repository_lists_nothing() {
        let (_dir, store) = store();
        assert!(store.list_entries("u1").await.unwrap().is_empty());
        assert!(store.list_profiles().await.unwrap().is_empty());
        assert!(store.get_current_profile_id().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_entry_write_fetch_delete() {
        let (_dir, store) = store();
        let mut entry = JournalEntry::new("u1", "2024-01-02", 4, "Quiet day".into());
        entry.created_at = 1_704_186_000_000;
        entry.updated_at = 1_704_187_800_000;

        store.write_entry(&entry).await.unwrap();
        assert!(store.root().join("journal/2024-01-02.md").exists());
        assert!(store.root().join(".gitignore").exists());

        let fetched = store.fetch_entry("u1", "2024-01-02").await.unwrap().unwrap();
        assert_eq!(fetched, entry);
        assert_eq!(store.list_entries("u1").await.unwrap().len(), 1);

        store.delete_entry("2024-01-02").await.unwrap();
        store.delete_entry("2024-01-02").await.unwrap();
        assert!(store.fetch_entry("u1", "2024-01-02").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_documents_are_skipped() {
        let (_dir, store) = store();
        store
            .write_entry(&JournalEntry::new("u1", "2024-01-01", 3, "ok".into()))
            .await
            .unwrap();
        std::fs::write(store.root().join("journal/2024-01-05.md"), "garbage").unwrap();

        let entries = store.list_entries("u1").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(store.fetch_entry("u1", "2024-01-05").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_out_of_range_response_counts_are_clamped() {
        let (_dir, store) = store();
        let profiles_dir = store.root().join("profiles");
        std::fs::create_dir_all(&profiles_dir).unwrap();
        std::fs::write(
            profiles_dir.join("coach.json"),
            r#"{"id":"coach","name":"Coach","response_count":500}"#,
        )
        .unwrap();
        std::fs::write(
            profiles_dir.join("neg.json"),
            r#"{"id":"neg","name":"Negative","response_count":-2}"#,
        )
        .unwrap();

        let profiles = store.list_profiles().await.unwrap();
        assert_eq!(profiles.len(), 2);
        let count = |id: &str| profiles.iter().find(|p| p.id == id).unwrap().response_count;
        assert_eq!(count("coach"), 10);
        assert_eq!(count("neg"), 1);
    }

    #[tokio::test]
    async fn test_profiles_and_pointer() {
        let (_dir, store) = store();
        let coach = Profile::new("Coach".into(), String::new(), "Be brief".into(), 2)
            .with_current(true);

        store.write_profile(&Profile::default_profile()).await.unwrap();
        store.write_profile(&coach).await.unwrap();
        store.set_current_profile_id(&coach.id).await.unwrap();

        let profiles = store.list_profiles().await.unwrap();
        assert_eq!(profiles.len(), 2);
        assert!(profiles.iter().all(|p| !p.is_current));
        assert_eq!(
            store.get_current_profile_id().await.unwrap().as_deref(),
            Some(coach.id.as_str())
        );

        store.delete_profile(&coach.id).await.unwrap();
        let ids: Vec<_> = store
            .list_profiles()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![DEFAULT_PROFILE_ID]);
    }

    #[tokio::test]
    async fn test_rejects_path_like_keys() {
        let (_dir, store) = store();
        assert!(store.delete_entry("../etc/passwd").await.is_err());
        assert!(store.delete_profile("../x").await.is_err());
    }
}
