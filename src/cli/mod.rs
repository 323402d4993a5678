//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// jsync - local-first cache for a Markdown journal
#[derive(Parser, Debug)]
#[command(name = "jsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Cache database path (default: ~/.journal-sync/cache.db)
    #[arg(long, global = true, env = "JSYNC_DB")]
    pub db: Option<PathBuf>,

    /// Remote journal directory (default: ~/.journal-sync/journal)
    #[arg(long, global = true, env = "JSYNC_REMOTE")]
    pub remote: Option<PathBuf>,

    /// User whose journal is synced
    #[arg(long, global = true, env = "JSYNC_USER")]
    pub user: Option<String>,

    /// Sync pass timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pull journal data from the remote into the cache
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },

    /// Journal entries
    Entry {
        #[command(subcommand)]
        command: EntryCommands,
    },

    /// Chatbot profiles
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },

    /// Local settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommands,
    },

    /// Remove everything cached for the user
    Signout,

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

// ============================================================================
// Sync Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum SyncCommands {
    /// Run a sync pass (incremental unless --full)
    Run {
        /// Replace the cache with the remote contents
        #[arg(long)]
        full: bool,
    },

    /// Refresh a single entry
    Entry {
        /// Entry date (YYYY-MM-DD)
        date: String,
    },

    /// Refresh profiles and the current-profile pointer
    Profiles,

    /// Show sync status
    Status,
}

// ============================================================================
// Entry Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum EntryCommands {
    /// List cached entries, most recent first
    List {
        /// Maximum entries to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show one entry
    Show {
        /// Entry date (YYYY-MM-DD)
        date: String,
    },

    /// Create or overwrite the entry for a date
    Save(EntrySaveArgs),

    /// Delete the entry for a date
    Delete {
        /// Entry date (YYYY-MM-DD)
        date: String,
    },
}

#[derive(Args, Debug)]
pub struct EntrySaveArgs {
    /// Entry date (YYYY-MM-DD)
    pub date: String,

    /// Mood score (1-5)
    #[arg(short, long)]
    pub mood: i64,

    /// Summary of the day
    #[arg(short, long)]
    pub summary: String,

    /// Highlight as "title: description" (repeatable)
    #[arg(long = "highlight")]
    pub highlights: Vec<String>,

    /// Conversation message as "role: content" (repeatable)
    #[arg(long = "message")]
    pub messages: Vec<String>,

    /// Profile that produced the entry (default: current profile)
    #[arg(long)]
    pub profile: Option<String>,
}

// ============================================================================
// Profile Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum ProfileCommands {
    /// List profiles
    List,

    /// Show the current profile
    Current,

    /// Switch the current profile
    Use {
        /// Profile ID
        id: String,
    },

    /// Create a profile, or update one with --id
    Save(ProfileSaveArgs),

    /// Delete a profile
    Delete {
        /// Profile ID
        id: String,
    },
}

#[derive(Args, Debug)]
pub struct ProfileSaveArgs {
    /// Existing profile ID to update
    #[arg(long)]
    pub id: Option<String>,

    /// Display name
    #[arg(short, long)]
    pub name: Option<String>,

    /// Short description
    #[arg(short, long)]
    pub description: Option<String>,

    /// System prompt for the conversation
    #[arg(long)]
    pub prompt: Option<String>,

    /// Questions per conversation (clamped to 1-10)
    #[arg(long)]
    pub responses: Option<i64>,
}

// ============================================================================
// Settings Commands
// ============================================================================

#[derive(Subcommand, Debug)]
pub enum SettingsCommands {
    /// Show current settings
    Show,

    /// Change settings
    Set(SettingsSetArgs),
}

#[derive(Args, Debug)]
pub struct SettingsSetArgs {
    /// Sync automatically when due
    #[arg(long)]
    pub auto_sync: Option<bool>,

    /// Minutes between automatic syncs
    #[arg(long)]
    pub interval: Option<u32>,

    /// Theme (system, light, dark)
    #[arg(long)]
    pub theme: Option<String>,
}
