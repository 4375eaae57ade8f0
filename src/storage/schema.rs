//! Database schema definitions
//!
//! This module contains the SQL for the directory tables and the per-board
//! document tables, and the validated identifiers those tables are named by.

use crate::storage::traits::{StorageError, StorageResult};

/// SQL schema for the board directory
pub const SCHEMA_SQL: &str = r#"
-- Boards listed by the latest directory crawl
CREATE TABLE IF NOT EXISTS boards (
    name TEXT PRIMARY KEY,
    category TEXT NOT NULL,
    description TEXT NOT NULL
);

-- Board -> document table bindings, kept across runs
CREATE TABLE IF NOT EXISTS board_tables (
    board TEXT PRIMARY KEY,
    table_name TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL
);
"#;

/// Prefix of every per-board document table
const TABLE_PREFIX: &str = "board_";

/// Longest board name accepted as part of a table name
const MAX_BOARD_NAME_LEN: usize = 64;

/// Initializes the directory schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// The document table bound to one board
///
/// The identifier only ever contains ASCII alphanumerics, `_` and `-`, so it
/// can be spliced (quoted) into SQL text.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoardTable {
    board: String,
    name: String,
}

impl BoardTable {
    /// Derives the table identifier for a board name
    ///
    /// SQLite identifiers are case-insensitive, so the name is lowercased.
    pub fn for_board(board: &str) -> StorageResult<Self> {
        if board.is_empty() {
            return Err(invalid(board, "name is empty"));
        }

        if board.chars().count() > MAX_BOARD_NAME_LEN {
            return Err(invalid(
                board,
                &format!("name is longer than {} characters", MAX_BOARD_NAME_LEN),
            ));
        }

        if !is_identifier_safe(board) {
            return Err(invalid(
                board,
                "only ASCII letters, digits, '_' and '-' are allowed",
            ));
        }

        Ok(Self {
            board: board.to_string(),
            name: format!("{}{}", TABLE_PREFIX, board.to_ascii_lowercase()),
        })
    }

    /// Rebuilds a binding read back from `board_tables`
    pub(crate) fn from_binding(board: &str, table_name: &str) -> StorageResult<Self> {
        if !table_name.starts_with(TABLE_PREFIX) || !is_identifier_safe(table_name) {
            return Err(invalid(
                board,
                &format!("stored table name {:?} is not a safe identifier", table_name),
            ));
        }

        Ok(Self {
            board: board.to_string(),
            name: table_name.to_string(),
        })
    }

    /// The board this table belongs to
    pub fn board(&self) -> &str {
        &self.board
    }

    /// The bare table identifier
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The identifier quoted for use in SQL text
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.name)
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for this board's documents
    pub fn create_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} (
    title TEXT NOT NULL,
    creator TEXT NOT NULL,
    create_time INTEGER NOT NULL,
    update_time INTEGER NOT NULL,
    url TEXT PRIMARY KEY NOT NULL CHECK (length(url) > 0),
    content TEXT NOT NULL
);",
            self.quoted()
        )
    }

    /// Insert-or-replace statement keyed by `url`
    pub fn upsert_sql(&self) -> String {
        format!(
            "INSERT OR REPLACE INTO {} (title, creator, create_time, update_time, url, content)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            self.quoted()
        )
    }
}

fn is_identifier_safe(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn invalid(name: &str, reason: &str) -> StorageError {
    StorageError::InvalidBoardName {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}
