//! Error types for journal-sync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=cache, 3=not_found, 4=validation, etc.)
//! - Retryability flags so callers can retry a sync silently
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use thiserror::Error;

/// Result type alias for journal-sync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Cache (exit 2)
    CacheError,
    SchemaMismatch,

    // Not Found (exit 3)
    EntryNotFound,
    ProfileNotFound,

    // Validation (exit 4)
    InvalidArgument,
    ProtectedProfile,

    // Remote (exit 5)
    RemoteError,

    // Sync (exit 6)
    SyncError,
    SyncTimeout,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::CacheError => "CACHE_ERROR",
            Self::SchemaMismatch => "SCHEMA_MISMATCH",
            Self::EntryNotFound => "ENTRY_NOT_FOUND",
            Self::ProfileNotFound => "PROFILE_NOT_FOUND",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::ProtectedProfile => "PROTECTED_PROFILE",
            Self::RemoteError => "REMOTE_ERROR",
            Self::SyncError => "SYNC_ERROR",
            Self::SyncTimeout => "SYNC_TIMEOUT",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::CacheError | Self::SchemaMismatch => 2,
            Self::EntryNotFound | Self::ProfileNotFound => 3,
            Self::InvalidArgument | Self::ProtectedProfile => 4,
            Self::RemoteError => 5,
            Self::SyncError | Self::SyncTimeout => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether the failed operation is worth retrying as-is.
    ///
    /// True for transient remote and sync failures. False for validation,
    /// not-found and configuration errors, which need different input.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RemoteError | Self::SyncError | Self::SyncTimeout | Self::CacheError
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in journal-sync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Journal entry not found: {date}")]
    EntryNotFound { date: String },

    #[error("Profile not found: {id}")]
    ProfileNotFound { id: String },

    #[error("Profile not found: {id} (did you mean: {}?)", similar.join(", "))]
    ProfileNotFoundSimilar { id: String, similar: Vec<String> },

    #[error("The default profile cannot be deleted")]
    ProtectedProfile,

    #[error("Cache schema mismatch: found version {found}, expected {expected}")]
    SchemaMismatch { found: i64, expected: i64 },

    #[error("Remote store error: {0}")]
    Remote(String),

    #[error("Sync timed out after {seconds}s")]
    SyncTimeout { seconds: u64 },

    #[error("Sync error: {0}")]
    Sync(String),

    #[error("Cache error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Database(_) => ErrorCode::CacheError,
            Self::SchemaMismatch { .. } => ErrorCode::SchemaMismatch,
            Self::EntryNotFound { .. } => ErrorCode::EntryNotFound,
            Self::ProfileNotFound { .. } | Self::ProfileNotFoundSimilar { .. } => {
                ErrorCode::ProfileNotFound
            }
            Self::ProtectedProfile => ErrorCode::ProtectedProfile,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Remote(_) => ErrorCode::RemoteError,
            Self::Sync(_) => ErrorCode::SyncError,
            Self::SyncTimeout { .. } => ErrorCode::SyncTimeout,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::EntryNotFound { date } => Some(format!(
                "No cached entry for {date}. Run `jsync sync run` or `jsync entry list`."
            )),

            Self::ProfileNotFound { id } => Some(format!(
                "No profile with ID '{id}'. Use `jsync profile list` to see available profiles."
            )),

            Self::ProfileNotFoundSimilar { similar, .. } => Some(format!(
                "Did you mean: {}? Use `jsync profile list` to see available profiles.",
                similar.join(", ")
            )),

            Self::ProtectedProfile => {
                Some("Switch to another profile instead: jsync profile use <id>".to_string())
            }

            Self::SyncTimeout { .. } => {
                Some("Retry later or raise the limit with --timeout".to_string())
            }

            Self::Config(msg) if msg.contains("remote") => Some(
                "Pass --remote <dir> or set JSYNC_REMOTE to the journal repository checkout"
                    .to_string(),
            ),

            Self::Config(msg) if msg.contains("user") => {
                Some("Pass --user <id> or set JSYNC_USER".to_string())
            }

            Self::InvalidArgument(msg) => {
                if msg.contains("date") {
                    Some("Dates use the YYYY-MM-DD format, e.g. 2024-01-31".to_string())
                } else if msg.contains("mood") {
                    Some("Mood is an integer from 1 to 5".to_string())
                } else {
                    None
                }
            }

            Self::Database(_)
            | Self::SchemaMismatch { .. }
            | Self::Remote(_)
            | Self::Sync(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
