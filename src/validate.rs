//! Input validation for journal data.
//!
//! Dates, moods, profile ids and response counts arrive from documents,
//! from the remote store and from the command line. Everything funnels
//! through here so the cache only ever holds canonical values.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use chrono::NaiveDate;

/// Lowest accepted mood score.
pub const MOOD_MIN: u8 = 1;
/// Highest accepted mood score.
pub const MOOD_MAX: u8 = 5;

/// Bounds for `Profile::response_count`.
pub const RESPONSE_COUNT_MIN: u8 = 1;
pub const RESPONSE_COUNT_MAX: u8 = 10;
pub const RESPONSE_COUNT_DEFAULT: u8 = 3;

// ── Valid value sets ─────────────────────────────────────────

pub static VALID_ROLES: LazyLock<HashSet<&str>> =
    LazyLock::new(|| ["user", "assistant"].into_iter().collect());

pub static VALID_THEMES: LazyLock<HashSet<&str>> =
    LazyLock::new(|| ["system", "light", "dark"].into_iter().collect());

// ── Synonym maps ─────────────────────────────────────────────

pub static ROLE_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [
        ("me", "user"),
        ("human", "user"),
        ("you", "assistant"),
        ("ai", "assistant"),
        ("bot", "assistant"),
        ("model", "assistant"),
    ]
    .into_iter()
    .collect()
});

pub static THEME_SYNONYMS: LazyLock<HashMap<&str, &str>> = LazyLock::new(|| {
    [("auto", "system"), ("default", "system"), ("night", "dark"), ("day", "light")]
        .into_iter()
        .collect()
});

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").ok()
}

/// Validate a date key and return it in canonical `YYYY-MM-DD` form.
pub fn normalize_date(input: &str) -> Result<String, String> {
    parse_date(input)
        .map(|d| d.format("%Y-%m-%d").to_string())
        .ok_or_else(|| format!("invalid date: {input}"))
}

/// Validate a mood score.
pub fn validate_mood(mood: i64) -> Result<u8, String> {
    u8::try_from(mood)
        .ok()
        .filter(|m| (MOOD_MIN..=MOOD_MAX).contains(m))
        .ok_or_else(|| format!("mood must be between {MOOD_MIN} and {MOOD_MAX}, got {mood}"))
}

/// Clamp a response count into the accepted range.
#[must_use]
pub fn clamp_response_count(count: i64) -> u8 {
    let clamped = count.clamp(i64::from(RESPONSE_COUNT_MIN), i64::from(RESPONSE_COUNT_MAX));
    u8::try_from(clamped).unwrap_or(RESPONSE_COUNT_DEFAULT)
}

/// Validate a profile id.
///
/// Ids become file names in the remote store, so only ASCII letters,
/// digits, `-` and `_` are allowed. `current` is reserved for the pointer file.
pub fn validate_profile_id(id: &str) -> Result<(), String> {
    if id.is_empty() || id.len() > 64 {
        return Err("profile id must be 1-64 characters".to_string());
    }
    if id == "current" {
        return Err("profile id 'current' is reserved".to_string());
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(format!("profile id contains invalid characters: {id}"));
    }
    Ok(())
}

/// Normalize a conversation role via exact match or synonym lookup.
pub fn normalize_role(input: &str) -> Result<String, (String, Option<String>)> {
    normalize_with(input, &VALID_ROLES, &ROLE_SYNONYMS)
}

/// Normalize a theme name via exact match or synonym lookup.
pub fn normalize_theme(input: &str) -> Result<String, (String, Option<String>)> {
    normalize_with(input, &VALID_THEMES, &THEME_SYNONYMS)
}

fn normalize_with(
    input: &str,
    valid: &HashSet<&str>,
    synonyms: &HashMap<&str, &str>,
) -> Result<String, (String, Option<String>)> {
    let lower = input.trim().to_lowercase();

    if valid.contains(lower.as_str()) {
        return Ok(lower);
    }

    if let Some(&canonical) = synonyms.get(lower.as_str()) {
        return Ok(canonical.to_string());
    }

    let suggestion = find_closest_match(&lower, valid, synonyms);
    Err((input.to_string(), suggestion))
}

/// Find the closest matching value across valid set and synonyms.
fn find_closest_match(
    input: &str,
    valid: &HashSet<&str>,
    synonyms: &HashMap<&str, &str>,
) -> Option<String> {
    let mut best: Option<(&str, usize)> = None;

    for &v in valid.iter().chain(synonyms.keys()) {
        let dist = levenshtein_distance(input, v);
        if dist <= 3 && best.is_none_or(|(_, d)| dist < d) {
            let shown = synonyms.get(v).copied().unwrap_or(v);
            best = Some((shown, dist));
        }
    }

    best.map(|(v, _)| v.to_string())
}

// ── Levenshtein distance ─────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
#[must_use]
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let a_len = a.len();
    let b_len = b.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for i in 1..=a_len {
        curr[0] = i;
        for j in 1..=b_len {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            curr[j] = (prev[j] + 1)
                .min(curr[j - 1] + 1)
                .min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Find existing ids similar to the searched id.
///
/// Returns up to `max` suggestions with edit distance ≤ 3,
/// sorted by distance then alphabetically.
#[must_use]
pub fn find_similar_ids(searched: &str, existing: &[String], max: usize) -> Vec<String> {
    let mut candidates: Vec<(usize, &str)> = existing
        .iter()
        .map(|id| (levenshtein_distance(searched, id), id.as_str()))
        .filter(|(dist, _)| *dist <= 3)
        .collect();

    candidates.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)));

    candidates
        .into_iter()
        .take(max)
        .map(|(_, id)| id.to_string())
        .collect()
}
