//! Version command implementation.

use crate::error::Result;
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput<'a> {
    version: &'a str,
    schema: i64,
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let schema = crate::storage::CURRENT_SCHEMA_VERSION;

    if json {
        return super::print_json(&VersionOutput { version, schema });
    }

    println!("jsync {version} (cache schema v{schema})");
    Ok(())
}
