//! journal-sync - local-first cache for a Markdown journal
//!
//! Mirrors a journal kept as Markdown documents in a user-owned repository
//! into a local SQLite cache, and keeps the two reconciled.
//!
//! # Architecture
//!
//! - [`cache`] - Facade the application talks to (reads, writes, refresh)
//! - [`cli`] - Command-line interface using clap
//! - [`codec`] - Markdown document encoding and decoding
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling
//! - [`model`] - Data types (`JournalEntry`, `Profile`, `Settings`, `SyncMetadata`)
//! - [`storage`] - SQLite cache layer
//! - [`sync`] - Remote stores, diffing and the sync engine
//! - [`validate`] - Input validation

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod model;
pub mod storage;
pub mod sync;
pub mod validate;

pub use cache::{CacheEvent, JournalCache};
pub use error::{Error, Result};
