//! Settings command implementations.

use crate::cli::{Cli, SettingsCommands, SettingsSetArgs};
use crate::error::Result;
use crate::model::Settings;

use super::{open_cache, print_json};

/// Execute settings commands.
pub fn execute(command: &SettingsCommands, cli: &Cli, json: bool) -> Result<()> {
    match command {
        SettingsCommands::Show => show(cli, json),
        SettingsCommands::Set(args) => set(args, cli, json),
    }
}

fn show(cli: &Cli, json: bool) -> Result<()> {
    let cache = open_cache(cli)?;
    let settings = cache.settings()?;

    if json {
        return print_json(&settings);
    }
    print_settings(&settings);
    Ok(())
}

fn set(args: &SettingsSetArgs, cli: &Cli, json: bool) -> Result<()> {
    let cache = open_cache(cli)?;
    let mut settings = cache.settings()?;

    if let Some(auto_sync) = args.auto_sync {
        settings.auto_sync = auto_sync;
    }
    if let Some(interval) = args.interval {
        settings.sync_interval_minutes = interval;
    }
    if let Some(theme) = &args.theme {
        settings.theme.clone_from(theme);
    }

    let saved = cache.update_settings(settings)?;

    if json {
        print_json(&saved)?;
    } else if !cli.quiet {
        print_settings(&saved);
    }
    Ok(())
}

fn print_settings(settings: &Settings) {
    println!("Auto sync:     {}", if settings.auto_sync { "on" } else { "off" });
    println!("Sync interval: {} min", settings.sync_interval_minutes);
    println!("Theme:         {}", settings.theme);
}
