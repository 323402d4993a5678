//! Journal entry <-> Markdown document codec.
//!
//! Entries live in the remote store as Markdown documents. Two layouts are
//! understood:
//!
//! - **Structured**: a fenced JSON metadata block followed by sections
//!   wrapped in explicit `<!-- section: NAME -->` / `<!-- /section -->`
//!   markers. Conversation messages are wrapped in
//!   `<!-- message: ROLE TIMESTAMP -->` / `<!-- /message -->`.
//! - **Legacy**: a single `# Journal Entry - DATE (Mood: n/5)` heading
//!   followed by free text. Only tried when structured parsing fails.
//!
//! # Example
//!
//! ````text
//! ```json
//! {"date":"2024-01-02","mood":4,"profile_id":"default",...}
//! ```
//!
//! # Journal Entry - 2024-01-02
//!
//! <!-- section: summary -->
//! ## Summary
//!
//! Walked to the lake.
//! <!-- /section -->
//! ````
//!
//! Free text (summary, highlight descriptions, message contents) is
//! written one line at a time. A line whose first non-blank character
//! opens a marker (`<!--`), a heading (`#`) or an escape (`\`) gets one
//! extra leading `\`, which decoding strips again.
//!
//! The codec is pure: no I/O, no logging above `debug`. Decoding never
//! fails loudly; an unreadable document yields `None` and the caller
//! decides how to report it.

mod legacy;

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{ConversationMessage, Highlight, JournalEntry, Role};
use crate::model::{DEFAULT_PROFILE_ID, DEFAULT_PROFILE_NAME};
use crate::sync::hash::entry_id;
use crate::validate::{normalize_date, validate_mood};

/// Written in place of a whitespace-only summary.
pub const SUMMARY_PLACEHOLDER: &str = "No summary available.";
/// Written in place of an empty highlight list; decodes back to no highlights.
pub const HIGHLIGHTS_PLACEHOLDER: &str = "No highlights available.";
/// Written in place of a whitespace-only highlight description.
pub const DESCRIPTION_PLACEHOLDER: &str = "No description available.";

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";
const SECTION_END: &str = "<!-- /section -->";
const MESSAGE_END: &str = "<!-- /message -->";

/// Metadata header carried in the fenced JSON block.
#[derive(Debug, Serialize, Deserialize)]
struct EntryHeader {
    date: String,
    mood: i64,
    #[serde(default)]
    profile_id: Option<String>,
    #[serde(default)]
    profile_name: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
}

/// Serialize an entry to a structured document.
#[must_use]
pub fn encode(entry: &JournalEntry) -> String {
    let header = EntryHeader {
        date: entry.date.clone(),
        mood: i64::from(entry.mood),
        profile_id: Some(entry.profile_id.clone()),
        profile_name: Some(entry.profile_name.clone()),
        created_at: Some(format_timestamp(entry.created_at)),
        updated_at: Some(format_timestamp(entry.updated_at)),
    };
    // A struct of strings and integers always serializes.
    let header_json = serde_json::to_string_pretty(&header).unwrap_or_default();

    let mut out = String::new();
    out.push_str(FENCE_OPEN);
    out.push('\n');
    out.push_str(&header_json);
    out.push('\n');
    out.push_str(FENCE_CLOSE);
    out.push_str("\n\n");
    out.push_str(&format!("# Journal Entry - {}\n\n", entry.date));

    // Highlights
    out.push_str("<!-- section: highlights -->\n## Highlights\n\n");
    if entry.highlights.is_empty() {
        out.push_str(HIGHLIGHTS_PLACEHOLDER);
        out.push('\n');
    } else {
        for highlight in &entry.highlights {
            let description = if highlight.description.trim().is_empty() {
                DESCRIPTION_PLACEHOLDER
            } else {
                highlight.description.as_str()
            };
            out.push_str(&format!(
                "### {}\n{}\n\n",
                highlight.title.trim(),
                escape_text(description)
            ));
        }
    }
    out.push_str(SECTION_END);
    out.push_str("\n\n");

    // Summary
    let summary = if entry.summary.trim().is_empty() {
        SUMMARY_PLACEHOLDER
    } else {
        entry.summary.as_str()
    };
    out.push_str("<!-- section: summary -->\n## Summary\n\n");
    out.push_str(&escape_text(summary));
    out.push('\n');
    out.push_str(SECTION_END);
    out.push_str("\n\n");

    // Conversation
    out.push_str("<!-- section: conversation -->\n## Conversation\n\n");
    for message in &entry.conversation {
        out.push_str(&format!(
            "<!-- message: {} {} -->\n",
            message.role,
            format_timestamp(message.timestamp)
        ));
        if !message.content.is_empty() {
            out.push_str(&escape_text(&message.content));
            out.push('\n');
        }
        out.push_str(MESSAGE_END);
        out.push('\n');
    }
    out.push_str(SECTION_END);
    out.push('\n');

    out
}

/// Parse a document into an entry for `user_id`.
///
/// `fallback_date` is used when a legacy document carries no date (usually
/// the date taken from the document's file name). Returns `None` when
/// neither layout can be read.
#[must_use]
pub fn decode(document: &str, user_id: &str, fallback_date: &str) -> Option<JournalEntry> {
    match decode_structured(document, user_id) {
        Some(entry) => Some(entry),
        None => {
            debug!(fallback_date, "structured parse failed, trying legacy layout");
            legacy::decode(document, user_id, fallback_date)
        }
    }
}

fn decode_structured(document: &str, user_id: &str) -> Option<JournalEntry> {
    let lines: Vec<&str> = document.trim_start_matches('\u{feff}').lines().collect();
    let start = lines.iter().position(|l| !l.trim().is_empty())?;
    if lines[start].trim() != FENCE_OPEN {
        return None;
    }
    let close = start + 1 + lines[start + 1..].iter().position(|l| l.trim() == FENCE_CLOSE)?;

    let header: EntryHeader = match serde_json::from_str(&lines[start + 1..close].join("\n")) {
        Ok(h) => h,
        Err(e) => {
            debug!(error = %e, "metadata header is not valid JSON");
            return None;
        }
    };

    let date = normalize_date(&header.date).ok()?;
    let mood = validate_mood(header.mood).ok()?;
    let sections = collect_sections(&lines[close + 1..]);

    let summary = sections
        .iter()
        .find(|(name, _)| name == "summary")
        .map(|(_, body)| unescape_text(&trim_blank_lines(skip_heading(body))))
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| SUMMARY_PLACEHOLDER.to_string());

    let highlights = sections
        .iter()
        .find(|(name, _)| name == "highlights")
        .map(|(_, body)| parse_highlights(skip_heading(body)))
        .unwrap_or_default();

    let conversation = sections
        .iter()
        .find(|(name, _)| name == "conversation")
        .map(|(_, body)| parse_conversation(body))
        .unwrap_or_default();

    Some(JournalEntry {
        id: entry_id(user_id, &date),
        user_id: user_id.to_string(),
        date,
        mood,
        summary,
        highlights,
        conversation,
        profile_id: header
            .profile_id
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_PROFILE_ID.to_string()),
        profile_name: header
            .profile_name
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_PROFILE_NAME.to_string()),
        created_at: header.created_at.as_deref().and_then(parse_timestamp).unwrap_or(0),
        updated_at: header.updated_at.as_deref().and_then(parse_timestamp).unwrap_or(0),
    })
}

/// Split the body into `(name, lines)` pairs using the section markers.
///
/// Section end markers inside a conversation message belong to the message.
fn collect_sections<'a>(lines: &[&'a str]) -> Vec<(String, Vec<&'a str>)> {
    let mut sections = Vec::new();
    let mut current: Option<(String, Vec<&'a str>)> = None;
    let mut in_message = false;

    for &line in lines {
        let trimmed = line.trim();
        match current.as_mut() {
            None => {
                if let Some(name) = marker_value(trimmed, "section") {
                    current = Some((name.to_lowercase(), Vec::new()));
                }
            }
            Some((_, body)) => {
                if in_message {
                    if trimmed == MESSAGE_END {
                        in_message = false;
                    }
                    body.push(line);
                } else if trimmed == SECTION_END {
                    if let Some(done) = current.take() {
                        sections.push(done);
                    }
                } else {
                    if marker_value(trimmed, "message").is_some() {
                        in_message = true;
                    }
                    body.push(line);
                }
            }
        }
    }

    // Tolerate a missing final end marker.
    if let Some(open) = current {
        sections.push(open);
    }
    sections
}

/// Extract `VALUE` from `<!-- KIND: VALUE -->`.
fn marker_value<'a>(line: &'a str, kind: &str) -> Option<&'a str> {
    let inner = line.strip_prefix("<!--")?.strip_suffix("-->")?.trim();
    let value = inner.strip_prefix(kind)?.strip_prefix(':')?.trim();
    (!value.is_empty()).then_some(value)
}

/// Drop a leading `## Heading` line.
fn skip_heading<'a, 'b>(body: &'b [&'a str]) -> &'b [&'a str] {
    match body.iter().position(|l| !l.trim().is_empty()) {
        Some(i) if body[i].trim_start().starts_with("## ") => &body[i + 1..],
        _ => body,
    }
}

fn escape_text(text: &str) -> String {
    text.split('\n').map(escape_line).collect::<Vec<_>>().join("\n")
}

fn escape_line(line: &str) -> String {
    let head = line.trim_start();
    if head.starts_with("<!--") || head.starts_with('#') || head.starts_with('\\') {
        format!("\\{line}")
    } else {
        line.to_string()
    }
}

fn unescape_text(text: &str) -> String {
    text.split('\n').map(unescape_line).collect::<Vec<_>>().join("\n")
}

fn unescape_line(line: &str) -> &str {
    line.strip_prefix('\\').unwrap_or(line)
}

/// Join lines after removing blank lines at both ends.
fn trim_blank_lines(lines: &[&str]) -> String {
    let start = lines.iter().position(|l| !l.trim().is_empty());
    let end = lines.iter().rposition(|l| !l.trim().is_empty());
    match (start, end) {
        (Some(s), Some(e)) => lines[s..=e].join("\n"),
        _ => String::new(),
    }
}

fn parse_highlights(body: &[&str]) -> Vec<Highlight> {
    if trim_blank_lines(body) == HIGHLIGHTS_PLACEHOLDER {
        return Vec::new();
    }

    let mut highlights = Vec::new();
    let mut title: Option<String> = None;
    let mut description: Vec<&str> = Vec::new();

    for &line in body {
        if let Some(rest) = line.strip_prefix("###") {
            if let Some(done) = title.take() {
                highlights.push(finish_highlight(done, &description));
            }
            title = Some(rest.trim().to_string());
            description.clear();
        } else if title.is_some() {
            description.push(line);
        }
    }
    if let Some(done) = title {
        highlights.push(finish_highlight(done, &description));
    }

    highlights
}

fn finish_highlight(title: String, description: &[&str]) -> Highlight {
    let description = unescape_text(&trim_blank_lines(description));
    Highlight {
        title,
        description: if description.is_empty() {
            DESCRIPTION_PLACEHOLDER.to_string()
        } else {
            description
        },
    }
}

fn parse_conversation(body: &[&str]) -> Vec<ConversationMessage> {
    let mut messages = Vec::new();
    let mut open: Option<(Option<Role>, i64, Vec<&str>)> = None;

    for &line in body {
        let trimmed = line.trim();
        if let Some((role, timestamp, content)) = open.as_mut() {
            if trimmed == MESSAGE_END {
                if let Some(role) = *role {
                    messages.push(ConversationMessage {
                        role,
                        content: content.join("\n"),
                        timestamp: *timestamp,
                    });
                }
                open = None;
            } else {
                content.push(unescape_line(line));
            }
        } else if let Some(value) = marker_value(trimmed, "message") {
            let mut parts = value.split_whitespace();
            let role = parts.next().and_then(|r| r.parse::<Role>().ok());
            if role.is_none() {
                debug!(marker = value, "skipping message with unknown role");
            }
            let timestamp = parts.next().and_then(parse_timestamp).unwrap_or(0);
            open = Some((role, timestamp, Vec::new()));
        }
    }

    messages
}

/// Render Unix milliseconds as RFC 3339 with millisecond precision.
#[must_use]
pub fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 timestamp into Unix milliseconds.
#[must_use]
pub fn parse_timestamp(text: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|dt| dt.timestamp_millis())
}
