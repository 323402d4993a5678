//! Content hashing for sync operations.
//!
//! SHA256 over document text, used for stable entry ids and for skipping
//! remote writes whose content is already in place.

use sha2::{Digest, Sha256};

/// SHA256 of raw text, hex encoded.
#[must_use]
pub fn text_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Stable entry id for a `(user_id, date)` pair.
#[must_use]
pub fn entry_id(user_id: &str, date: &str) -> String {
    let digest = text_hash(&format!("{user_id}:{date}"));
    format!("entry_{}", &digest[..16])
}

/// Check if content differs from a previously stored hash.
///
/// Returns `true` when there is no stored hash.
#[must_use]
pub fn has_changed(current_hash: &str, stored_hash: Option<&str>) -> bool {
    stored_hash.is_none_or(|h| h != current_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_hash_deterministic() {
        let hash = text_hash("# Journal Entry - 2024-01-01");
        assert_eq!(hash, text_hash("# Journal Entry - 2024-01-01"));
        assert_ne!(hash, text_hash("# Journal Entry - 2024-01-02"));
        assert_eq!(hash.len(), 64);
    }

    #[test]
    fn test_entry_id_stable_and_scoped() {
        assert_eq!(entry_id("u1", "2024-01-01"), entry_id("u1", "2024-01-01"));
        assert_ne!(entry_id("u1", "2024-01-01"), entry_id("u2", "2024-01-01"));
        assert_eq!(entry_id("u1", "2024-01-01").len(), "entry_".len() + 16);
    }

    #[test]
    fn test_has_changed() {
        assert!(has_changed("abc123", None));
        assert!(has_changed("abc123", Some("xyz789")));
        assert!(!has_changed("abc123", Some("abc123")));
    }
}
