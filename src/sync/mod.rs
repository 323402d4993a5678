//! Remote-to-cache synchronization.
//!
//! - **Remote**: the [`RemoteStore`] trait plus directory and in-memory stores
//! - **Diff**: pure planning of entry and profile changes
//! - **Engine**: full/incremental passes with per-user serialization,
//!   single-flight coalescing and timeouts
//! - **Hashing**: SHA256 for entry ids and skipping unchanged writes
//! - **Status**: last sync times and recent activity
//!
//! # Example
//!
//! ```ignore
//! use jsync::sync::{EngineConfig, LocalDirRemoteStore, SyncEngine};
//!
//! let engine = SyncEngine::new(cache, EngineConfig::default());
//! let remote = LocalDirRemoteStore::new(repo_dir)?;
//!
//! let report = engine.incremental_sync("alice", &remote).await;
//! println!("entries {} profiles {}", report.entries, report.profiles);
//! ```

pub mod diff;
mod engine;
pub mod file;
pub mod hash;
mod localdir;
mod memory;
mod remote;
mod status;
mod types;

pub use engine::{EngineConfig, SyncEngine, DEFAULT_SYNC_TIMEOUT};
pub use hash::{entry_id, has_changed, text_hash};
pub use localdir::LocalDirRemoteStore;
pub use memory::MemoryRemoteStore;
pub use remote::RemoteStore;
pub use status::{get_sync_status, print_status};
pub use types::{EntityDiff, SyncKind, SyncReport, SyncStatus};
