//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::config::StorageConfig;
use crate::observer::{CrawlObserver, NullObserver};
use crate::storage::schema::{initialize_schema, BoardTable};
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{Board, DirectorySync, Document, PersistReport};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// SQLite storage backend
///
/// Holds only the database location; each operation opens a fresh connection.
pub struct SqliteStorage {
    path: PathBuf,
    commit_batch_size: usize,
    failure_threshold: usize,
    observer: Arc<dyn CrawlObserver>,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// The database file is created if needed and the directory schema is
    /// initialised, so a bad path fails here rather than mid-crawl.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `config` - Batch size and failure threshold
    pub fn new(path: &Path, config: &StorageConfig) -> StorageResult<Self> {
        let storage = Self {
            path: path.to_path_buf(),
            commit_batch_size: config.commit_batch_size.max(1),
            failure_threshold: config.failure_threshold.max(1),
            observer: Arc::new(NullObserver),
        };

        storage.connect()?;

        Ok(storage)
    }

    /// Reports storage events to `observer`
    pub fn with_observer(mut self, observer: Arc<dyn CrawlObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> StorageResult<Connection> {
        let conn = Connection::open(&self.path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(conn)
    }

    /// Looks up or creates the table binding for a board
    ///
    /// Returns the table and whether it was bound just now.
    fn bind_table(&self, conn: &Connection, board: &str) -> StorageResult<(BoardTable, bool)> {
        let existing: Option<String> = conn
            .query_row(
                "SELECT table_name FROM board_tables WHERE board = ?1",
                params![board],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(table_name) = existing {
            let table = BoardTable::from_binding(board, &table_name)?;
            conn.execute_batch(&table.create_sql())?;
            return Ok((table, false));
        }

        let table = BoardTable::for_board(board)?;

        let owner: Option<String> = conn
            .query_row(
                "SELECT board FROM board_tables WHERE table_name = ?1",
                params![table.name()],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(owner) = owner {
            return Err(StorageError::TableConflict {
                board: board.to_string(),
                table: table.name().to_string(),
                owner,
            });
        }

        conn.execute(
            "INSERT INTO board_tables (board, table_name, created_at) VALUES (?1, ?2, ?3)",
            params![board, table.name(), Utc::now().to_rfc3339()],
        )?;
        conn.execute_batch(&table.create_sql())?;

        Ok((table, true))
    }

    fn upsert_all(
        &self,
        writer: &mut BatchWriter<'_>,
        table: &BoardTable,
        documents: &mut dyn Iterator<Item = Document>,
    ) -> StorageResult<()> {
        let mut consecutive_failures = 0;

        for document in documents {
            match writer.upsert(&document) {
                Ok(()) => {
                    consecutive_failures = 0;
                    self.observer.document_saved(&document.url);
                    writer.record_saved()?;
                }
                Err(e) => {
                    consecutive_failures += 1;
                    writer.record_failed();
                    self.observer.persist_failed(&document.url, &e);

                    if consecutive_failures >= self.failure_threshold {
                        return Err(StorageError::PersistenceAborted {
                            board: table.board().to_string(),
                            failures: consecutive_failures,
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

impl Storage for SqliteStorage {
    // ===== Directory =====

    fn sync_directory(&self, boards: &[Board]) -> StorageResult<DirectorySync> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let old_names: HashSet<String> = {
            let mut stmt = tx.prepare("SELECT name FROM boards")?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<HashSet<_>, _>>()?;
            names
        };

        let mut sync = DirectorySync::default();
        let mut seen = HashSet::new();
        let mut listed = Vec::new();
        for board in boards {
            if seen.insert(board.name.as_str()) {
                listed.push(board);
            } else {
                self.observer
                    .board_rejected(&board.name, "repeated directory row ignored");
                sync.duplicates.push(board.name.clone());
            }
        }

        tx.execute("DELETE FROM boards", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO boards (name, category, description) VALUES (?1, ?2, ?3)",
            )?;
            for board in &listed {
                insert.execute(params![board.name, board.category, board.description])?;
            }
        }

        for board in &listed {
            if !old_names.contains(&board.name) {
                sync.added.push(board.name.clone());
            }

            match self.bind_table(&tx, &board.name) {
                Ok((table, created)) => {
                    if created {
                        self.observer.board_added(&board.name, table.name());
                    }
                    sync.bindings.push(((*board).clone(), table));
                }
                Err(
                    e @ (StorageError::InvalidBoardName { .. }
                    | StorageError::TableConflict { .. }),
                ) => {
                    self.observer.board_rejected(&board.name, &e.to_string());
                    sync.rejected.push(board.name.clone());
                }
                Err(e) => return Err(e),
            }
        }

        let mut removed: Vec<String> = old_names
            .into_iter()
            .filter(|name| !seen.contains(name.as_str()))
            .collect();
        removed.sort();
        for name in &removed {
            self.observer.board_retained(name);
        }
        sync.removed = removed;

        tx.commit()?;

        Ok(sync)
    }

    fn list_boards(&self) -> StorageResult<Vec<Board>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT name, category, description FROM boards ORDER BY rowid")?;

        let boards = stmt
            .query_map([], |row| {
                Ok(Board {
                    name: row.get(0)?,
                    category: row.get(1)?,
                    description: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(boards)
    }

    fn table_for(&self, board: &str) -> StorageResult<Option<BoardTable>> {
        let conn = self.connect()?;
        let table_name: Option<String> = conn
            .query_row(
                "SELECT table_name FROM board_tables WHERE board = ?1",
                params![board],
                |row| row.get(0),
            )
            .optional()?;

        table_name
            .map(|name| BoardTable::from_binding(board, &name))
            .transpose()
    }

    // ===== Documents =====

    fn persist_documents(
        &self,
        table: &BoardTable,
        documents: &mut dyn Iterator<Item = Document>,
    ) -> StorageResult<PersistReport> {
        let conn = self.connect()?;
        let mut writer = BatchWriter::begin(
            conn,
            table,
            self.commit_batch_size,
            self.observer.as_ref(),
        )?;

        let outcome = self.upsert_all(&mut writer, table, documents);
        let finished = writer.finish();

        // A failed final commit was already reported by the writer
        match (outcome, finished) {
            (Ok(()), finished) => finished,
            (Err(e), _) => Err(e),
        }
    }

    fn count_documents(&self, table: &BoardTable) -> StorageResult<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.quoted()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_document(&self, table: &BoardTable, url: &str) -> StorageResult<Option<Document>> {
        let conn = self.connect()?;
        let document = conn
            .query_row(
                &format!(
                    "SELECT title, creator, create_time, update_time, url, content
                     FROM {} WHERE url = ?1",
                    table.quoted()
                ),
                params![url],
                |row| {
                    Ok(Document {
                        title: row.get(0)?,
                        creator: row.get(1)?,
                        create_time: row.get(2)?,
                        update_time: row.get(3)?,
                        url: row.get(4)?,
                        content: row.get(5)?,
                    })
                },
            )
            .optional()?;

        Ok(document)
    }
}

/// An open transaction that is committed every `batch_size` saved documents
///
/// Dropping the writer without calling [`BatchWriter::finish`] still commits
/// whatever is pending before the connection closes.
struct BatchWriter<'a> {
    conn: Option<Connection>,
    table: &'a BoardTable,
    upsert_sql: String,
    batch_size: usize,
    pending: usize,
    report: PersistReport,
    observer: &'a dyn CrawlObserver,
}

impl<'a> BatchWriter<'a> {
    fn begin(
        conn: Connection,
        table: &'a BoardTable,
        batch_size: usize,
        observer: &'a dyn CrawlObserver,
    ) -> StorageResult<Self> {
        conn.execute_batch("BEGIN")?;

        Ok(Self {
            conn: Some(conn),
            table,
            upsert_sql: table.upsert_sql(),
            batch_size,
            pending: 0,
            report: PersistReport::default(),
            observer,
        })
    }

    fn conn(&self) -> StorageResult<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| StorageError::Database("connection already released".to_string()))
    }

    fn upsert(&self, document: &Document) -> StorageResult<()> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&self.upsert_sql)?;
        stmt.execute(params![
            document.title,
            document.creator,
            document.create_time,
            document.update_time,
            document.url,
            document.content,
        ])?;
        Ok(())
    }

    fn record_saved(&mut self) -> StorageResult<()> {
        self.report.saved += 1;
        self.pending += 1;

        if self.pending >= self.batch_size {
            let conn = self.conn()?;
            conn.execute_batch("COMMIT")?;
            self.report.commits += 1;
            self.pending = 0;
            self.observer
                .batch_committed(self.table.name(), self.report.saved);
            self.conn()?.execute_batch("BEGIN")?;
        }

        Ok(())
    }

    fn record_failed(&mut self) {
        self.report.failed += 1;
    }

    /// Commits the open transaction and closes the connection
    fn finish(mut self) -> StorageResult<PersistReport> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => return Ok(self.report),
        };

        let committed = if conn.is_autocommit() {
            Ok(false)
        } else {
            conn.execute_batch("COMMIT").map(|_| true)
        };
        let closed = conn.close().map_err(|(_, e)| e);

        match committed.and_then(|committed| closed.map(|()| committed)) {
            Ok(committed) => {
                if committed {
                    self.report.commits += 1;
                    self.observer
                        .batch_committed(self.table.name(), self.report.saved);
                }
                Ok(self.report)
            }
            Err(e) => {
                let error = StorageError::from(e);
                self.observer.commit_failed(self.table.name(), &error);
                Err(error)
            }
        }
    }
}

impl Drop for BatchWriter<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            if !conn.is_autocommit() {
                if let Err(e) = conn.execute_batch("COMMIT") {
                    self.observer
                        .commit_failed(self.table.name(), &StorageError::from(e));
                }
            }
        }
    }
}
