//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{Board, BoardTable, DirectorySync, Document, PersistReport};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Board name {name:?} cannot be used as a table name: {reason}")]
    InvalidBoardName { name: String, reason: String },

    #[error("Table {table} for board {board} is already bound to board {owner}")]
    TableConflict {
        board: String,
        table: String,
        owner: String,
    },

    #[error("Saving threads of board {board} aborted after {failures} consecutive failures")]
    PersistenceAborted { board: String, failures: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every operation owns its own database connection for its whole duration
/// and releases it before returning, whatever the outcome.
pub trait Storage {
    // ===== Directory =====

    /// Replaces the board directory with `boards`
    ///
    /// Boards seen for the first time get a document table; boards that
    /// disappeared keep theirs. Returns the table bindings of every board that
    /// can be mirrored, in the order given.
    fn sync_directory(&self, boards: &[Board]) -> StorageResult<DirectorySync>;

    /// Lists the directory as stored by the last sync, in directory order
    fn list_boards(&self) -> StorageResult<Vec<Board>>;

    /// Gets the document table bound to a board, if any
    fn table_for(&self, board: &str) -> StorageResult<Option<BoardTable>>;

    // ===== Documents =====

    /// Upserts every document of the stream into the board's table
    ///
    /// Commits every configured batch of successful upserts. Aborts with
    /// [`StorageError::PersistenceAborted`] once the configured number of
    /// consecutive upserts has failed. A final commit is attempted on every
    /// exit path.
    fn persist_documents(
        &self,
        table: &BoardTable,
        documents: &mut dyn Iterator<Item = Document>,
    ) -> StorageResult<PersistReport>;

    /// Counts the documents stored for a board
    fn count_documents(&self, table: &BoardTable) -> StorageResult<u64>;

    /// Gets a document by URL
    fn get_document(&self, table: &BoardTable, url: &str) -> StorageResult<Option<Document>>;
}
