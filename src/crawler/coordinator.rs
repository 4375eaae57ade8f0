//! Mirror coordinator - the crawl-parse-persist pipeline
//!
//! One run walks the board directory, syncs it into storage, then for every
//! bound board streams thread URLs through the post parser into batched
//! upserts. Boards are processed sequentially in directory order.

use crate::config::Config;
use crate::crawler::directory::BoardDirectoryCrawler;
use crate::crawler::fetcher::{HttpFetcher, PageSource};
use crate::crawler::post::PostParser;
use crate::crawler::site::SiteUrls;
use crate::crawler::thread_list::ThreadListCrawler;
use crate::observer::CrawlObserver;
use crate::storage::{open_storage, PersistReport, SqliteStorage, Storage, StorageError};
use crate::MirrorError;
use std::sync::Arc;

/// Outcome of one mirror run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Boards listed on the directory page
    pub boards_listed: usize,
    /// Boards whose threads were walked to the end
    pub boards_mirrored: usize,
    /// Boards that could not be bound to a table
    pub rejected_boards: Vec<String>,
    /// Boards abandoned by the storage circuit breaker
    pub aborted_boards: Vec<String>,
    /// Boards listed previously but not this time
    pub removed_boards: Vec<String>,
    pub documents_saved: usize,
    pub documents_failed: usize,
}

impl RunSummary {
    fn record(&mut self, report: &PersistReport) {
        self.boards_mirrored += 1;
        self.documents_saved += report.saved;
        self.documents_failed += report.failed;
    }
}

/// Main mirror coordinator structure
pub struct Mirror<S> {
    config: Config,
    source: S,
    storage: SqliteStorage,
    observer: Arc<dyn CrawlObserver>,
}

impl Mirror<HttpFetcher> {
    /// Creates a mirror that fetches over HTTP and stores into the configured database
    ///
    /// # Returns
    ///
    /// * `Ok(Mirror)` - Client built and database reachable
    /// * `Err(MirrorError)` - Failed to initialize
    pub fn from_config(config: Config, observer: Arc<dyn CrawlObserver>) -> Result<Self, MirrorError> {
        let fetcher = HttpFetcher::new(&config.site, &config.fetch, observer.clone())?;
        let storage = open_storage(&config.storage)?.with_observer(observer.clone());

        Ok(Self::new(config, fetcher, storage, observer))
    }
}

impl<S: PageSource> Mirror<S> {
    pub fn new(
        config: Config,
        source: S,
        storage: SqliteStorage,
        observer: Arc<dyn CrawlObserver>,
    ) -> Self {
        Self {
            config,
            source,
            storage,
            observer,
        }
    }

    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Runs one complete mirror pass
    ///
    /// # Returns
    ///
    /// * `Ok(RunSummary)` - Every bound board was visited
    /// * `Err(MirrorError)` - The directory could not be read or synced, or
    ///   storage failed in a way other than the circuit breaker
    pub fn run(&self) -> Result<RunSummary, MirrorError> {
        let urls = SiteUrls::new(&self.config.site)?;

        let directory =
            BoardDirectoryCrawler::new(&self.source, urls.entry()?, self.observer.clone());
        let boards = directory.list_boards()?;
        tracing::info!("Directory lists {} boards", boards.len());

        let sync = self.storage.sync_directory(&boards)?;

        let mut summary = RunSummary {
            boards_listed: boards.len(),
            rejected_boards: sync.rejected.clone(),
            removed_boards: sync.removed.clone(),
            ..RunSummary::default()
        };

        let lister = ThreadListCrawler::new(&self.source, urls, self.observer.clone());
        let parser = PostParser::new(
            &self.source,
            self.config.site.utc_offset_hours,
            self.observer.clone(),
        )?;

        for (board, table) in &sync.bindings {
            self.observer.board_started(&board.name);

            let mut documents = lister
                .thread_urls(&board.name)
                .filter_map(|url| parser.parse(&url));

            match self.storage.persist_documents(table, &mut documents) {
                Ok(report) => {
                    self.observer.board_finished(&board.name, &report);
                    summary.record(&report);
                }
                Err(e @ StorageError::PersistenceAborted { .. }) => {
                    self.observer.board_aborted(&board.name, &e);
                    summary.aborted_boards.push(board.name.clone());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(summary)
    }
}
