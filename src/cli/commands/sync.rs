//! Sync command implementations.
//!
//! Each invocation opens the cache, runs one pass or refresh against the
//! remote journal directory and prints what changed.

use colored::Colorize;
use serde::Serialize;

use crate::cli::{Cli, SyncCommands};
use crate::error::{Error, Result};
use crate::sync::{print_status, EntityDiff, SyncKind, SyncReport};

use super::{open_cache, print_json};

#[derive(Serialize)]
struct RunOutput<'a> {
    kind: SyncKind,
    #[serde(flatten)]
    report: &'a SyncReport,
}

#[derive(Serialize)]
struct EntryOutput<'a> {
    date: &'a str,
    cached: bool,
}

#[derive(Serialize)]
struct ProfilesOutput {
    profiles: EntityDiff,
    current_profile_id: String,
}

/// Execute sync commands.
pub async fn execute(command: &SyncCommands, cli: &Cli, json: bool) -> Result<()> {
    match command {
        SyncCommands::Run { full } => run(*full, cli, json).await,
        SyncCommands::Entry { date } => entry(date, cli, json).await,
        SyncCommands::Profiles => profiles(cli, json).await,
        SyncCommands::Status => status(cli, json),
    }
}

async fn run(full: bool, cli: &Cli, json: bool) -> Result<()> {
    let cache = open_cache(cli)?;
    let kind = if full { SyncKind::Full } else { SyncKind::Incremental };
    let report = cache.refresh(kind).await;

    if json {
        print_json(&RunOutput {
            kind,
            report: &report,
        })?;
    } else if report.success && !cli.quiet {
        if report.is_empty() {
            println!("Already up to date.");
        } else {
            println!("{} complete", kind.as_str().replace('_', " "));
            println!();
            println!("  Entries:  {}", report.entries);
            println!("  Profiles: {}", report.profiles);
        }
    }

    match report.error {
        Some(err) if !report.success => Err(Error::Sync(err)),
        _ => Ok(()),
    }
}

async fn entry(date: &str, cli: &Cli, json: bool) -> Result<()> {
    let cache = open_cache(cli)?;
    cache.sync_entry(date).await?;
    let cached = cache.entry(date)?;

    if json {
        let date = cached.as_ref().map_or(date, |e| e.date.as_str());
        print_json(&EntryOutput {
            date,
            cached: cached.is_some(),
        })?;
    } else if !cli.quiet {
        match cached {
            Some(entry) => println!("Refreshed entry {}", entry.date.cyan()),
            None => println!("No remote entry for {date}; removed from cache."),
        }
    }
    Ok(())
}

async fn profiles(cli: &Cli, json: bool) -> Result<()> {
    let cache = open_cache(cli)?;
    let diff = cache.sync_profiles().await?;
    let current = cache.current_profile()?;

    if json {
        print_json(&ProfilesOutput {
            profiles: diff,
            current_profile_id: current.id,
        })?;
    } else if !cli.quiet {
        println!("Profiles refreshed: {diff}");
        println!("Current profile: {}", current.name.cyan());
    }
    Ok(())
}

fn status(cli: &Cli, json: bool) -> Result<()> {
    let cache = open_cache(cli)?;
    let status = cache.sync_status()?;

    if json {
        print_json(&status)?;
    } else {
        print_status(&status);
    }
    Ok(())
}
