//! Crawl event observation
//!
//! Every pipeline component reports progress and failures through a
//! [`CrawlObserver`] handed to it by the caller. The library never touches a
//! global logger directly; [`TracingObserver`] is the default sink and turns
//! events into `tracing` records.

use crate::storage::{Board, PersistReport, StorageError};
use crate::MirrorError;

/// Receiver of crawl events
///
/// All methods have empty default bodies, so an implementation only overrides
/// the events it cares about.
pub trait CrawlObserver: Send + Sync {
    /// A board row was read from the directory page
    fn board_discovered(&self, _board: &Board) {}

    /// A board was bound to a new document table
    fn board_added(&self, _name: &str, _table: &str) {}

    /// A board vanished from the directory; its table is kept
    fn board_retained(&self, _name: &str) {}

    /// A board name could not be bound to a table
    fn board_rejected(&self, _name: &str, _reason: &str) {}

    /// Crawling of a board's threads begins
    fn board_started(&self, _name: &str) {}

    /// Crawling of a board's threads ended normally
    fn board_finished(&self, _name: &str, _report: &PersistReport) {}

    /// A thread URL was found on a list page
    fn thread_discovered(&self, _title: &str, _url: &str) {}

    /// A list page could not be read; the board's thread list ends here
    fn list_page_failed(&self, _board: &str, _url: &str, _error: &MirrorError) {}

    /// Persisting a board was abandoned after repeated storage failures
    fn board_aborted(&self, _name: &str, _error: &StorageError) {}

    /// A thread was parsed with full metadata
    fn document_parsed(&self, _url: &str, _preview: &str) {}

    /// A thread's headers did not match; the sentinel record is stored
    fn metadata_unparsed(&self, _url: &str, _preview: &str) {}

    /// A thread produced no document
    fn thread_skipped(&self, _url: &str, _reason: &str) {}

    /// A document was upserted
    fn document_saved(&self, _url: &str) {}

    /// A document could not be upserted
    fn persist_failed(&self, _url: &str, _error: &StorageError) {}

    /// A batch of upserts was committed
    fn batch_committed(&self, _table: &str, _saved: usize) {}

    /// Pending upserts could not be committed; they are lost
    fn commit_failed(&self, _table: &str, _error: &StorageError) {}

    /// A connection-level failure will be retried
    fn fetch_retry(&self, _url: &str, _attempt: u32, _error: &str) {}

    /// The board directory could not be read; nothing can be mirrored
    fn directory_failed(&self, _url: &str, _error: &MirrorError) {}
}

/// Observer that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl CrawlObserver for NullObserver {}

/// Observer that forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl CrawlObserver for TracingObserver {
    fn board_discovered(&self, board: &Board) {
        tracing::info!(
            "Found board {} [{}] {}",
            board.name,
            board.category,
            board.description
        );
    }

    fn board_added(&self, name: &str, table: &str) {
        tracing::info!("New board {} stored in table {}", name, table);
    }

    fn board_retained(&self, name: &str) {
        tracing::warn!(
            "Board {} is no longer listed; keeping its archived threads",
            name
        );
    }

    fn board_rejected(&self, name: &str, reason: &str) {
        tracing::warn!("Board {:?} will not be mirrored: {}", name, reason);
    }

    fn board_started(&self, name: &str) {
        tracing::info!("Walking threads of board {}", name);
    }

    fn board_finished(&self, name: &str, report: &PersistReport) {
        tracing::info!(
            "Board {} done: {} saved, {} failed, {} commits",
            name,
            report.saved,
            report.failed,
            report.commits
        );
    }

    fn board_aborted(&self, name: &str, error: &StorageError) {
        tracing::error!("Giving up on board {}: {}", name, error);
    }

    fn thread_discovered(&self, title: &str, url: &str) {
        tracing::info!("Found thread {}: {}", title.trim(), url);
    }

    fn list_page_failed(&self, board: &str, url: &str, error: &MirrorError) {
        tracing::error!(
            "Cannot read thread list of board {} at {}: {}",
            board,
            url,
            error
        );
    }

    fn document_parsed(&self, url: &str, preview: &str) {
        tracing::info!("Parsed thread {}: {}", url, preview);
    }

    fn metadata_unparsed(&self, url: &str, preview: &str) {
        tracing::error!("Unrecognised thread header format at {}: {}", url, preview);
    }

    fn thread_skipped(&self, url: &str, reason: &str) {
        tracing::error!("Skipped thread {}: {}", url, reason);
    }

    fn document_saved(&self, url: &str) {
        tracing::info!("Saved thread {}", url);
    }

    fn persist_failed(&self, url: &str, error: &StorageError) {
        tracing::error!("Failed to save thread {}: {}", url, error);
    }

    fn batch_committed(&self, table: &str, saved: usize) {
        tracing::debug!("Committed {} threads into {}", saved, table);
    }

    fn commit_failed(&self, table: &str, error: &StorageError) {
        tracing::error!("Commit into {} failed: {}", table, error);
    }

    fn fetch_retry(&self, url: &str, attempt: u32, error: &str) {
        tracing::debug!("Attempt {} for {} failed: {}", attempt, url, error);
    }

    fn directory_failed(&self, url: &str, error: &MirrorError) {
        tracing::error!("Cannot read board directory at {}: {}", url, error);
    }
}
