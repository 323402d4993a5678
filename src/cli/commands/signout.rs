//! Sign-out command implementation.

use crate::cli::Cli;
use crate::error::Result;

use super::{open_cache, print_json};

/// Clear everything cached for the user. The remote is left untouched.
pub fn execute(cli: &Cli, json: bool) -> Result<()> {
    let cache = open_cache(cli)?;
    cache.sign_out()?;

    if json {
        print_json(&serde_json::json!({ "signed_out": cache.user_id() }))?;
    } else if !cli.quiet {
        println!("Cleared local data for {}", cache.user_id());
    }
    Ok(())
}
