//! Legacy single-heading entry layout.
//!
//! Older documents look like:
//!
//! ```text
//! # Journal Entry - 2023-11-05 (Mood: 3/5)
//!
//! Free text that becomes the summary.
//! ```

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::SUMMARY_PLACEHOLDER;
use crate::model::{JournalEntry, DEFAULT_PROFILE_ID, DEFAULT_PROFILE_NAME};
use crate::sync::hash::entry_id;
use crate::validate::{normalize_date, validate_mood};

struct LegacyPatterns {
    heading: Regex,
    date: Regex,
    mood: Regex,
}

fn build_patterns() -> Option<LegacyPatterns> {
    Some(LegacyPatterns {
        heading: Regex::new(r"^#{1,6}\s+(?P<title>.+?)\s*$").ok()?,
        date: Regex::new(r"\d{4}-\d{1,2}-\d{1,2}").ok()?,
        mood: Regex::new(r"(?i)mood:\s*(?P<score>-?\d+)\s*/\s*5").ok()?,
    })
}

static PATTERNS: LazyLock<Option<LegacyPatterns>> = LazyLock::new(build_patterns);

pub(super) fn decode(document: &str, user_id: &str, fallback_date: &str) -> Option<JournalEntry> {
    let mut lines = document
        .trim_start_matches('\u{feff}')
        .lines()
        .skip_while(|l| l.trim().is_empty());

    let patterns = PATTERNS.as_ref()?;
    let heading = lines.next()?;
    let title = patterns.heading.captures(heading.trim())?.name("title")?.as_str();

    let score = patterns
        .mood
        .captures(title)
        .and_then(|c| c["score"].parse::<i64>().ok());
    let Some(score) = score else {
        debug!(heading, "legacy heading has no mood marker");
        return None;
    };
    let mood = validate_mood(score).ok()?;

    let date = patterns
        .date
        .find(title)
        .and_then(|m| normalize_date(m.as_str()).ok())
        .or_else(|| normalize_date(fallback_date).ok())?;

    let body: Vec<&str> = lines.collect();
    let summary = super::trim_blank_lines(&body);

    Some(JournalEntry {
        id: entry_id(user_id, &date),
        user_id: user_id.to_string(),
        date,
        mood,
        summary: if summary.trim().is_empty() {
            SUMMARY_PLACEHOLDER.to_string()
        } else {
            summary
        },
        highlights: Vec::new(),
        conversation: Vec::new(),
        profile_id: DEFAULT_PROFILE_ID.to_string(),
        profile_name: DEFAULT_PROFILE_NAME.to_string(),
        created_at: 0,
        updated_at: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_with_date_in_heading() {
        let doc = "# Journal Entry - 2023-11-05 (Mood: 3/5)\n\nRainy.\nStayed in.\n";
        let entry = super::super::decode(doc, "u1", "2000-01-01").unwrap();

        assert_eq!(entry.date, "2023-11-05");
        assert_eq!(entry.mood, 3);
        assert_eq!(entry.summary, "Rainy.\nStayed in.");
        assert!(entry.highlights.is_empty());
        assert!(entry.conversation.is_empty());
        assert_eq!(entry.profile_id, DEFAULT_PROFILE_ID);
    }

    #[test]
    fn test_legacy_uses_fallback_date() {
        let doc = "## Evening notes (mood: 5 / 5)\nGreat day.";
        let entry = decode(doc, "u1", "2023-12-24").unwrap();
        assert_eq!(entry.date, "2023-12-24");
        assert_eq!(entry.mood, 5);
    }

    #[test]
    fn test_legacy_requires_mood() {
        assert!(decode("# Journal Entry - 2023-11-05\n\ntext", "u1", "2023-11-05").is_none());
        assert!(decode("# Entry (Mood: 7/5)\n", "u1", "2023-11-05").is_none());
    }

    #[test]
    fn test_legacy_empty_body_gets_placeholder() {
        let entry = decode("# 2023-11-05 (Mood: 2/5)", "u1", "2023-11-05").unwrap();
        assert_eq!(entry.summary, SUMMARY_PLACEHOLDER);
    }

    #[test]
    fn test_legacy_bad_fallback_without_heading_date() {
        assert!(decode("# Notes (Mood: 2/5)", "u1", "not-a-date").is_none());
    }
}
