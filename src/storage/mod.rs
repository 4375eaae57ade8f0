//! Storage module for persisting the mirrored forum
//!
//! This module handles all database operations for the mirror, including:
//! - SQLite schema management for the board directory
//! - The board name -> document table binding map
//! - Batched, fault-tolerant upserts of thread documents

mod schema;
mod sqlite;
mod traits;

pub use schema::{initialize_schema, BoardTable};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::config::StorageConfig;

use std::path::Path;

/// Opens the storage described by the configuration
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Database reachable and directory schema in place
/// * `Err(StorageError)` - Failed to open or initialise the database
pub fn open_storage(config: &StorageConfig) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(Path::new(&config.database_path), config)
}

/// A forum board as listed on the directory page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    pub name: String,
    pub category: String,
    pub description: String,
}

impl Board {
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            description: description.into(),
        }
    }
}

/// A forum thread: all post texts plus the metadata of its first and last post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub title: String,
    pub creator: String,
    /// Epoch seconds of the first post, 0 when unknown
    pub create_time: i64,
    /// Epoch seconds of the last post, 0 when unknown
    pub update_time: i64,
    pub url: String,
    pub content: String,
}

impl Document {
    /// A document whose header metadata could not be parsed
    pub fn sentinel(url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: String::new(),
            creator: String::new(),
            create_time: 0,
            update_time: 0,
            url: url.into(),
            content: content.into(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.title.is_empty()
            && self.creator.is_empty()
            && self.create_time == 0
            && self.update_time == 0
    }
}

/// Outcome of a directory synchronisation
#[derive(Debug, Clone, Default)]
pub struct DirectorySync {
    /// Boards that can be mirrored, in directory order
    pub bindings: Vec<(Board, BoardTable)>,
    /// Boards not present in the previous directory
    pub added: Vec<String>,
    /// Boards dropped from the directory (their tables are kept)
    pub removed: Vec<String>,
    /// Boards listed but not bound to a table
    pub rejected: Vec<String>,
    /// Repeated directory rows that were ignored
    pub duplicates: Vec<String>,
}

/// Counters for one `persist_documents` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistReport {
    pub saved: usize,
    pub failed: usize,
    pub commits: usize,
}
