//! Profile command implementations.

use colored::Colorize;
use serde::Serialize;

use crate::cli::{Cli, ProfileCommands, ProfileSaveArgs};
use crate::error::{Error, Result};
use crate::model::Profile;
use crate::validate::{clamp_response_count, RESPONSE_COUNT_DEFAULT};

use super::{open_cache, print_json, truncate};

#[derive(Serialize)]
struct ProfileListOutput<'a> {
    count: usize,
    profiles: &'a [Profile],
}

#[derive(Serialize)]
struct DeleteOutput<'a> {
    deleted: &'a str,
}

/// Execute profile commands.
pub async fn execute(command: &ProfileCommands, cli: &Cli, json: bool) -> Result<()> {
    match command {
        ProfileCommands::List => list(cli, json),
        ProfileCommands::Current => current(cli, json),
        ProfileCommands::Use { id } => use_profile(id, cli, json).await,
        ProfileCommands::Save(args) => save(args, cli, json).await,
        ProfileCommands::Delete { id } => delete(id, cli, json).await,
    }
}

fn list(cli: &Cli, json: bool) -> Result<()> {
    let cache = open_cache(cli)?;
    let profiles = cache.profiles()?;

    if json {
        return print_json(&ProfileListOutput {
            count: profiles.len(),
            profiles: &profiles,
        });
    }

    println!("Profiles ({} found):", profiles.len());
    println!();
    for profile in &profiles {
        let marker = if profile.is_current { "*".green().bold() } else { " ".normal() };
        println!(
            "{marker} {:<20} {:<24} {}",
            profile.id.cyan(),
            truncate(&profile.name, 24),
            truncate(&profile.description, 40).dimmed()
        );
    }
    Ok(())
}

fn current(cli: &Cli, json: bool) -> Result<()> {
    let cache = open_cache(cli)?;
    let profile = cache.current_profile()?;

    if json {
        return print_json(&profile);
    }
    print_profile(&profile);
    Ok(())
}

async fn use_profile(id: &str, cli: &Cli, json: bool) -> Result<()> {
    let cache = open_cache(cli)?;
    let profile = cache.select_profile(id).await?;

    if json {
        print_json(&profile)?;
    } else if !cli.quiet {
        println!("Now using {} ({})", profile.name.cyan(), profile.id);
    }
    Ok(())
}

async fn save(args: &ProfileSaveArgs, cli: &Cli, json: bool) -> Result<()> {
    let cache = open_cache(cli)?;

    let existing = match &args.id {
        Some(id) => cache.profiles()?.into_iter().find(|p| &p.id == id),
        None => None,
    };

    let profile = match existing {
        Some(existing) => apply_changes(existing, args),
        None => {
            let name = args.name.clone().ok_or_else(|| {
                Error::InvalidArgument("A new profile needs --name".into())
            })?;
            let mut profile = Profile::new(
                name,
                args.description.clone().unwrap_or_default(),
                args.prompt.clone().unwrap_or_default(),
                args.responses.unwrap_or(i64::from(RESPONSE_COUNT_DEFAULT)),
            );
            if let Some(id) = &args.id {
                profile.id.clone_from(id);
            }
            profile
        }
    };

    let saved = cache.save_profile(profile).await?;

    if json {
        print_json(&saved)?;
    } else if !cli.quiet {
        println!("Saved profile {} ({})", saved.name.cyan(), saved.id);
    }
    Ok(())
}

async fn delete(id: &str, cli: &Cli, json: bool) -> Result<()> {
    let cache = open_cache(cli)?;
    cache.delete_profile(id).await?;

    if json {
        print_json(&DeleteOutput { deleted: id })?;
    } else if !cli.quiet {
        println!("Deleted profile {id}");
    }
    Ok(())
}

/// Overlay the flags that were given onto an existing profile.
fn apply_changes(mut profile: Profile, args: &ProfileSaveArgs) -> Profile {
    if let Some(name) = &args.name {
        profile.name.clone_from(name);
    }
    if let Some(description) = &args.description {
        profile.description.clone_from(description);
    }
    if let Some(prompt) = &args.prompt {
        profile.system_prompt.clone_from(prompt);
    }
    if let Some(responses) = args.responses {
        profile.response_count = clamp_response_count(responses);
    }
    profile
}

fn print_profile(profile: &Profile) {
    println!("{} ({})", profile.name.bold(), profile.id.cyan());
    if !profile.description.is_empty() {
        println!("{}", profile.description);
    }
    println!("Responses per conversation: {}", profile.response_count);
    if !profile.system_prompt.is_empty() {
        println!();
        println!("{}", profile.system_prompt.dimmed());
    }
}
