//! Atomic file operations for directory-backed remotes.
//!
//! - Atomic writes: write to temp file, sync to disk, then rename
//! - Tolerant reads and removals that treat a missing file as absence

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;

/// Write content to a file atomically.
///
/// This function:
/// 1. Writes content to a temporary file next to the target
/// 2. Calls `fsync` to ensure data is on disk
/// 3. Atomically renames the temp file to the target path
///
/// If any step fails, the original file (if any) remains untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub async fn atomic_write(path: &Path, content: &str) -> std::io::Result<()> {
    let temp_path = temp_path_for(path);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    {
        let mut file = File::create(&temp_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        file.sync_all().await?;
    }

    fs::rename(&temp_path, path).await
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Read a file, returning `None` if it does not exist.
///
/// # Errors
///
/// Returns an error for any failure other than a missing file.
pub async fn read_optional(path: &Path) -> std::io::Result<Option<String>> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Remove a file. Returns whether it existed.
///
/// # Errors
///
/// Returns an error for any failure other than a missing file.
pub async fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// List files in `dir` with the given extension, sorted by name.
///
/// A missing directory lists as empty.
///
/// # Errors
///
/// Returns an error if the directory exists but cannot be read.
pub async fn list_files(dir: &Path, extension: &str) -> std::io::Result<Vec<PathBuf>> {
    let mut reader = match fs::read_dir(dir).await {
        Ok(reader) => reader,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|ext| ext == extension) && entry.file_type().await?.is_file()
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Generate .gitignore content for a journal repository.
///
/// Keeps interrupted atomic writes out of commits.
#[must_use]
pub fn gitignore_content() -> &'static str {
    "# journal-sync temporary files\n*.tmp\n"
}

/// Ensure .gitignore exists at the repository root.
///
/// An existing file is never modified (the user may have customized it).
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub async fn ensure_gitignore(root: &Path) -> std::io::Result<()> {
    let gitignore_path = root.join(".gitignore");
    if fs::try_exists(&gitignore_path).await? {
        return Ok(());
    }
    atomic_write(&gitignore_path, gitignore_content()).await
}
