//! Journal entry command implementations.

use colored::Colorize;
use serde::Serialize;

use crate::cli::{Cli, EntryCommands, EntrySaveArgs};
use crate::error::{Error, Result};
use crate::model::{ConversationMessage, Highlight, JournalEntry, Role};
use crate::validate::validate_mood;

use super::{open_cache, print_json, truncate};

#[derive(Serialize)]
struct EntryListOutput<'a> {
    count: usize,
    entries: &'a [JournalEntry],
}

#[derive(Serialize)]
struct DeleteOutput<'a> {
    deleted: &'a str,
}

/// Execute entry commands.
pub async fn execute(command: &EntryCommands, cli: &Cli, json: bool) -> Result<()> {
    match command {
        EntryCommands::List { limit } => list(*limit, cli, json),
        EntryCommands::Show { date } => show(date, cli, json),
        EntryCommands::Save(args) => save(args, cli, json).await,
        EntryCommands::Delete { date } => delete(date, cli, json).await,
    }
}

fn list(limit: Option<usize>, cli: &Cli, json: bool) -> Result<()> {
    let cache = open_cache(cli)?;
    let mut entries = cache.entries()?;
    if let Some(limit) = limit {
        entries.truncate(limit);
    }

    if json {
        return print_json(&EntryListOutput {
            count: entries.len(),
            entries: &entries,
        });
    }

    if entries.is_empty() {
        println!("No journal entries cached.");
        return Ok(());
    }

    println!("Journal entries ({} found):", entries.len());
    println!();
    for entry in &entries {
        println!(
            "{}  {}  {}",
            entry.date.cyan(),
            mood_label(entry.mood),
            truncate(&entry.summary, 60)
        );
    }
    Ok(())
}

fn show(date: &str, cli: &Cli, json: bool) -> Result<()> {
    let cache = open_cache(cli)?;
    let entry = cache.entry(date)?.ok_or_else(|| Error::EntryNotFound {
        date: date.to_string(),
    })?;

    if json {
        return print_json(&entry);
    }

    println!("{}", entry.date.bold().underline());
    println!("Mood:    {}", mood_label(entry.mood));
    println!("Profile: {}", entry.profile_name);
    println!();
    println!("{}", entry.summary);

    if !entry.highlights.is_empty() {
        println!();
        println!("{}", "Highlights:".blue().bold());
        for highlight in &entry.highlights {
            println!("  • {}: {}", highlight.title.bold(), highlight.description);
        }
    }

    if !entry.conversation.is_empty() {
        println!();
        println!("{}", "Conversation:".blue().bold());
        for message in &entry.conversation {
            let role = match message.role {
                Role::User => message.role.as_str().green(),
                Role::Assistant => message.role.as_str().magenta(),
            };
            println!("  {role}: {}", message.content);
        }
    }
    Ok(())
}

async fn save(args: &EntrySaveArgs, cli: &Cli, json: bool) -> Result<()> {
    let cache = open_cache(cli)?;

    let profile = match &args.profile {
        Some(id) => cache
            .profiles()?
            .into_iter()
            .find(|p| &p.id == id)
            .ok_or_else(|| Error::ProfileNotFound { id: id.clone() })?,
        None => cache.current_profile()?,
    };

    let highlights = args
        .highlights
        .iter()
        .map(|raw| parse_highlight(raw))
        .collect::<Result<Vec<_>>>()?;
    let now = chrono::Utc::now().timestamp_millis();
    let conversation = args
        .messages
        .iter()
        .map(|raw| parse_message(raw, now))
        .collect::<Result<Vec<_>>>()?;

    let mood = validate_mood(args.mood).map_err(Error::InvalidArgument)?;
    let draft = JournalEntry {
        highlights,
        conversation,
        profile_id: profile.id,
        profile_name: profile.name,
        ..JournalEntry::new(cache.user_id(), &args.date, mood, args.summary.clone())
    };

    let saved = cache.save_entry(draft).await?;

    if json {
        print_json(&saved)?;
    } else if !cli.quiet {
        println!("Saved entry {}", saved.date.cyan());
    }
    Ok(())
}

async fn delete(date: &str, cli: &Cli, json: bool) -> Result<()> {
    let cache = open_cache(cli)?;
    cache.delete_entry(date).await?;

    if json {
        print_json(&DeleteOutput { deleted: date })?;
    } else if !cli.quiet {
        println!("Deleted entry {date}");
    }
    Ok(())
}

/// Parse `title: description`. The description may be empty.
fn parse_highlight(raw: &str) -> Result<Highlight> {
    let (title, description) = raw.split_once(':').unwrap_or((raw, ""));
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "Highlight needs a title: '{raw}'"
        )));
    }
    Ok(Highlight {
        title: title.to_string(),
        description: description.trim().to_string(),
    })
}

/// Parse `role: content`.
fn parse_message(raw: &str, timestamp: i64) -> Result<ConversationMessage> {
    let (role, content) = raw.split_once(':').ok_or_else(|| {
        Error::InvalidArgument(format!("Message must be 'role: content', got '{raw}'"))
    })?;
    let role = role.parse::<Role>().map_err(Error::InvalidArgument)?;
    Ok(ConversationMessage {
        role,
        content: content.trim().to_string(),
        timestamp,
    })
}

fn mood_label(mood: u8) -> String {
    let filled = usize::from(mood.min(5));
    format!("{}{}", "●".repeat(filled), "○".repeat(5 - filled))
}
