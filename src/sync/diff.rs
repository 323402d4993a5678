//! Pure reconciliation planning.
//!
//! Nothing in here performs I/O: the engine fetches both sides, asks these
//! functions what to change, and writes the result in one block.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::model::{mark_current, resolve_current_id, JournalEntry, Profile, DEFAULT_PROFILE_ID};
use crate::storage::CollectionChanges;
use crate::sync::types::EntityDiff;

/// Staged entry writes plus their counts.
#[derive(Debug, Clone, Default)]
pub struct EntryPlan {
    pub changes: CollectionChanges<JournalEntry>,
    pub diff: EntityDiff,
}

/// Staged profile writes, counts, and the converged pointer.
#[derive(Debug, Clone)]
pub struct ProfilePlan {
    pub changes: CollectionChanges<Profile>,
    pub diff: EntityDiff,
    /// Resolved current profile after convergence.
    pub current_id: String,
    /// Whether the stored local pointer must be rewritten.
    pub pointer_changed: bool,
}

/// Incremental entry reconciliation.
///
/// Remote-only entries are added, entries whose remote `updated_at` is newer
/// are replaced, and local-only entries are deleted. Equal or locally newer
/// entries are left alone; nothing flows back to the remote.
#[must_use]
pub fn diff_entries(local: &[JournalEntry], remote: &[JournalEntry]) -> EntryPlan {
    let local_by_date: HashMap<&str, &JournalEntry> =
        local.iter().map(|e| (e.date.as_str(), e)).collect();
    let remote_dates: HashSet<&str> = remote.iter().map(|e| e.date.as_str()).collect();

    let mut plan = EntryPlan::default();

    for entry in remote {
        match local_by_date.get(entry.date.as_str()) {
            None => {
                debug!(date = %entry.date, "Entry added remotely");
                plan.diff.added += 1;
                plan.changes.upserts.push(entry.clone());
            }
            Some(existing) if entry.is_newer_than(existing) => {
                debug!(date = %entry.date, "Entry updated remotely");
                plan.diff.updated += 1;
                plan.changes.upserts.push(entry.clone());
            }
            Some(_) => {}
        }
    }

    for entry in local {
        if !remote_dates.contains(entry.date.as_str()) {
            debug!(date = %entry.date, "Entry removed remotely");
            plan.diff.deleted += 1;
            plan.changes.deletes.push(entry.date.clone());
        }
    }

    plan
}

/// Full entry replacement. Counts are taken against the local state.
#[must_use]
pub fn replace_entries(local: &[JournalEntry], remote: Vec<JournalEntry>) -> EntryPlan {
    let local_by_date: HashMap<&str, &JournalEntry> =
        local.iter().map(|e| (e.date.as_str(), e)).collect();
    let remote_dates: HashSet<&str> = remote.iter().map(|e| e.date.as_str()).collect();

    let mut diff = EntityDiff::default();
    for entry in &remote {
        match local_by_date.get(entry.date.as_str()) {
            None => diff.added += 1,
            Some(existing) if *existing != entry => diff.updated += 1,
            Some(_) => {}
        }
    }
    diff.deleted = local
        .iter()
        .filter(|e| !remote_dates.contains(e.date.as_str()))
        .count();

    EntryPlan {
        changes: CollectionChanges::replace_with(remote),
        diff,
    }
}

/// Build the converged profile set from the remote side.
///
/// The default profile comes first: the remote copy if there is one,
/// otherwise `fallback_default`. Every other remote profile follows.
/// `is_current` is set from the remote pointer (absent, empty, or unknown
/// resolves to the default).
#[must_use]
pub fn merge_profiles(
    remote: Vec<Profile>,
    remote_pointer: Option<&str>,
    fallback_default: Profile,
) -> (Vec<Profile>, String) {
    let mut default = None;
    let mut others = Vec::with_capacity(remote.len());
    for profile in remote {
        let profile = profile.normalized();
        if profile.is_default() {
            default = Some(profile);
        } else {
            others.push(profile);
        }
    }

    let mut merged = Vec::with_capacity(others.len() + 1);
    merged.push(default.unwrap_or(fallback_default));
    merged.extend(others);

    let current_id = resolve_current_id(&merged, remote_pointer);
    mark_current(&mut merged, &current_id);
    (merged, current_id)
}

/// Profile reconciliation against the local set.
///
/// `local` must carry `is_current` as derived from the local pointer, so a
/// profile whose current flag flips counts as updated. With `replace` the
/// staged changes overwrite the whole collection (full sync); otherwise only
/// the differences are staged.
#[must_use]
pub fn diff_profiles(
    local: &[Profile],
    local_pointer: Option<&str>,
    remote: Vec<Profile>,
    remote_pointer: Option<&str>,
    replace: bool,
) -> ProfilePlan {
    let fallback_default = if replace {
        Profile::default_profile()
    } else {
        local
            .iter()
            .find(|p| p.is_default())
            .cloned()
            .unwrap_or_else(Profile::default_profile)
    };
    let (merged, current_id) = merge_profiles(remote, remote_pointer, fallback_default);

    let local_by_id: HashMap<&str, &Profile> = local.iter().map(|p| (p.id.as_str(), p)).collect();
    let merged_ids: HashSet<&str> = merged.iter().map(|p| p.id.as_str()).collect();

    let mut diff = EntityDiff::default();
    let mut changes = CollectionChanges::default();

    for profile in &merged {
        match local_by_id.get(profile.id.as_str()) {
            None => {
                debug!(id = %profile.id, "Profile added");
                diff.added += 1;
                changes.upserts.push(profile.clone());
            }
            Some(existing) if *existing != profile => {
                debug!(id = %profile.id, "Profile changed");
                diff.updated += 1;
                changes.upserts.push(profile.clone());
            }
            Some(_) => {}
        }
    }

    for profile in local {
        if profile.id != DEFAULT_PROFILE_ID && !merged_ids.contains(profile.id.as_str()) {
            debug!(id = %profile.id, "Profile removed remotely");
            diff.deleted += 1;
            changes.deletes.push(profile.id.clone());
        }
    }

    if replace {
        changes = CollectionChanges::replace_with(merged);
    }

    ProfilePlan {
        pointer_changed: local_pointer != Some(current_id.as_str()),
        changes,
        diff,
        current_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(date: &str, updated_at: i64) -> JournalEntry {
        let mut e = JournalEntry::new("u1", date, 3, format!("summary {date}"));
        e.created_at = 0;
        e.updated_at = updated_at;
        e
    }

    fn profile(id: &str, name: &str) -> Profile {
        Profile {
            id: id.to_string(),
            name: name.to_string(),
            ..Profile::default_profile()
        }
    }

    #[test]
    fn test_entry_scenario() {
        let local = vec![
            entry("2024-01-01", 10),
            entry("2024-01-02", 10),
            entry("2024-01-03", 10),
        ];
        let remote = vec![entry("2024-01-02", 20), entry("2024-01-04", 10)];

        let plan = diff_entries(&local, &remote);
        assert_eq!(plan.diff, EntityDiff::new(1, 1, 2));
        assert_eq!(plan.changes.upserts.len(), 2);
        assert_eq!(plan.changes.deletes, vec!["2024-01-01", "2024-01-03"]);
        assert!(!plan.changes.replace);
    }

    #[test]
    fn test_locally_newer_entry_untouched() {
        let local = vec![entry("2024-01-01", 30)];
        let remote = vec![entry("2024-01-01", 20)];
        assert!(diff_entries(&local, &remote).diff.is_empty());
    }

    #[test]
    fn test_replace_entries_counts() {
        let local = vec![entry("2024-01-01", 10), entry("2024-01-02", 10)];
        let remote = vec![entry("2024-01-02", 10), entry("2024-01-03", 10)];
        let plan = replace_entries(&local, remote);
        assert_eq!(plan.diff, EntityDiff::new(1, 0, 1));
        assert!(plan.changes.replace);
        assert_eq!(plan.changes.upserts.len(), 2);
    }

    #[test]
    fn test_merge_synthesizes_default() {
        let (merged, current) = merge_profiles(
            vec![profile("coach", "Coach")],
            Some("coach"),
            Profile::default_profile(),
        );
        assert_eq!(merged[0].id, DEFAULT_PROFILE_ID);
        assert_eq!(current, "coach");
        assert_eq!(merged.iter().filter(|p| p.is_current).count(), 1);
    }

    #[test]
    fn test_merge_unknown_pointer_falls_back() {
        let (merged, current) =
            merge_profiles(vec![profile("coach", "Coach")], Some("ghost"), Profile::default_profile());
        assert_eq!(current, DEFAULT_PROFILE_ID);
        assert!(merged[0].is_current);
    }

    #[test]
    fn test_profile_diff_pointer_flip_counts_as_update() {
        let local = vec![
            Profile::default_profile().with_current(true),
            profile("coach", "Coach"),
        ];
        let remote = vec![profile("coach", "Coach")];

        let plan = diff_profiles(&local, Some(DEFAULT_PROFILE_ID), remote, Some("coach"), false);
        assert_eq!(plan.diff, EntityDiff::new(0, 2, 0));
        assert!(plan.pointer_changed);
        assert_eq!(plan.current_id, "coach");
    }

    #[test]
    fn test_profile_diff_adds_default_and_deletes_missing() {
        let local = vec![profile("old", "Old").with_current(true)];
        let plan = diff_profiles(&local, Some("old"), Vec::new(), None, false);

        assert_eq!(plan.diff, EntityDiff::new(1, 0, 1));
        assert_eq!(plan.changes.deletes, vec!["old"]);
        assert_eq!(plan.current_id, DEFAULT_PROFILE_ID);
    }

    #[test]
    fn test_profile_diff_never_deletes_default() {
        let local = vec![Profile::default_profile().with_current(true)];
        let plan = diff_profiles(&local, Some(DEFAULT_PROFILE_ID), Vec::new(), None, false);
        assert!(plan.diff.is_empty());
        assert!(plan.changes.is_empty());
        assert!(!plan.pointer_changed);
    }

    #[test]
    fn test_full_profile_diff_replaces() {
        let local = vec![Profile::default_profile().with_current(true)];
        let plan = diff_profiles(&local, Some(DEFAULT_PROFILE_ID), vec![profile("a", "A")], None, true);
        assert!(plan.changes.replace);
        assert_eq!(plan.changes.upserts.len(), 2);
        assert_eq!(plan.diff, EntityDiff::new(1, 0, 0));
    }
}
