//! Board directory crawler
//!
//! Reads the forum's "all boards" page. Each listing row carries the board
//! name in cell 1, the category in cell 2 wrapped in one bracket character on
//! each side (`[IT]`), and the description in cell 3 behind a two-character
//! marker. Those offsets are part of the site's markup and are cut literally.

use crate::crawler::fetcher::PageSource;
use crate::crawler::markup::{cells, drop_chars, listing_rows, text_of};
use crate::observer::CrawlObserver;
use crate::storage::Board;
use crate::MirrorError;
use scraper::Html;
use std::sync::Arc;
use url::Url;

const NAME_CELL: usize = 1;
const CATEGORY_CELL: usize = 2;
const DESCRIPTION_CELL: usize = 3;

/// Lists the boards of the forum
pub struct BoardDirectoryCrawler<S> {
    source: S,
    entry_url: Url,
    observer: Arc<dyn CrawlObserver>,
}

impl<S: PageSource> BoardDirectoryCrawler<S> {
    pub fn new(source: S, entry_url: Url, observer: Arc<dyn CrawlObserver>) -> Self {
        Self {
            source,
            entry_url,
            observer,
        }
    }

    /// Fetches the directory page and returns its boards in row order
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<Board>)` - One board per listing row
    /// * `Err(MirrorError)` - The page could not be fetched or is not a
    ///   directory listing; nothing can be crawled without it
    pub fn list_boards(&self) -> Result<Vec<Board>, MirrorError> {
        let boards = self
            .source
            .fetch(&self.entry_url)
            .and_then(|html| parse_directory(&html, &self.entry_url))
            .map_err(|e| {
                self.observer.directory_failed(self.entry_url.as_str(), &e);
                e
            })?;

        for board in &boards {
            self.observer.board_discovered(board);
        }

        Ok(boards)
    }
}

/// Extracts the boards from a parsed directory page
pub fn parse_directory(html: &Html, url: &Url) -> Result<Vec<Board>, MirrorError> {
    listing_rows(html, url)?
        .into_iter()
        .enumerate()
        .map(|(index, row)| {
            let cells = cells(row)?;
            if cells.len() <= DESCRIPTION_CELL {
                return Err(MirrorError::Markup {
                    url: url.to_string(),
                    message: format!(
                        "directory row {} has {} cells, expected at least {}",
                        index + 1,
                        cells.len(),
                        DESCRIPTION_CELL + 1
                    ),
                });
            }

            Ok(Board {
                name: text_of(cells[NAME_CELL]).trim().to_string(),
                category: drop_chars(&text_of(cells[CATEGORY_CELL]), 1, 1),
                description: drop_chars(&text_of(cells[DESCRIPTION_CELL]), 2, 0),
            })
        })
        .collect()
}
