//! Thread list crawler
//!
//! A board's threads are listed newest-last over pages of `bbstdoc`, each
//! addressed by the row offset it starts at. [`ThreadUrls`] walks those pages
//! lazily and holds at most one page of thread URLs at a time.

use crate::crawler::fetcher::PageSource;
use crate::crawler::markup::{cells, has_next_page, listing_rows, selector, text_of};
use crate::crawler::site::SiteUrls;
use crate::observer::CrawlObserver;
use crate::MirrorError;
use scraper::Html;
use std::collections::VecDeque;
use std::sync::Arc;
use url::Url;

const THREAD_CELL: usize = 4;

/// Lists the thread URLs of boards
pub struct ThreadListCrawler<S> {
    source: S,
    urls: SiteUrls,
    observer: Arc<dyn CrawlObserver>,
}

impl<S: PageSource> ThreadListCrawler<S> {
    pub fn new(source: S, urls: SiteUrls, observer: Arc<dyn CrawlObserver>) -> Self {
        Self {
            source,
            urls,
            observer,
        }
    }

    /// Returns the lazy sequence of thread URLs for `board`
    ///
    /// Nothing is fetched until the iterator is first advanced.
    pub fn thread_urls<'a>(&'a self, board: &str) -> ThreadUrls<'a, S> {
        let next_page = match self.urls.thread_list(board, 0) {
            Ok(url) => Some(url),
            Err(e) => {
                self.observer.list_page_failed(board, "bbstdoc", &e);
                None
            }
        };

        ThreadUrls {
            crawler: self,
            board: board.to_string(),
            offset: 0,
            pending: VecDeque::new(),
            next_page,
        }
    }
}

/// One list page, read as far as its markup allowed
struct ListPage {
    links: Vec<(String, Url)>,
    has_next: bool,
    error: Option<MirrorError>,
}

fn read_list_page(html: &Html, page_url: &Url) -> Result<ListPage, MirrorError> {
    let link = selector("a[href]")?;
    let mut page = ListPage {
        links: Vec::new(),
        has_next: has_next_page(html, page_url)?,
        error: None,
    };

    for row in listing_rows(html, page_url)? {
        let cells = cells(row)?;
        let anchor = cells
            .get(THREAD_CELL)
            .and_then(|cell| cell.select(&link).next());

        let resolved = anchor
            .and_then(|a| a.value().attr("href"))
            .map(|href| page_url.join(href));

        match (anchor, resolved) {
            (Some(anchor), Some(Ok(url))) => page.links.push((text_of(anchor), url)),
            (_, Some(Err(e))) => {
                page.error = Some(e.into());
                break;
            }
            _ => {
                page.error = Some(MirrorError::Markup {
                    url: page_url.to_string(),
                    message: format!("row {} has no thread link", page.links.len() + 1),
                });
                break;
            }
        }
    }

    Ok(page)
}

/// Lazy iterator over one board's thread URLs
///
/// Finite and not restartable. A failed list page ends the sequence; URLs
/// yielded before it stand.
pub struct ThreadUrls<'a, S> {
    crawler: &'a ThreadListCrawler<S>,
    board: String,
    offset: u32,
    pending: VecDeque<Url>,
    next_page: Option<Url>,
}

impl<'a, S: PageSource> ThreadUrls<'a, S> {
    /// Row offset the next list page would start at
    pub fn offset(&self) -> u32 {
        self.offset
    }

    fn load(&mut self, page_url: Url) {
        let observer = &self.crawler.observer;

        let page = match self
            .crawler
            .source
            .fetch(&page_url)
            .and_then(|html| read_list_page(&html, &page_url))
        {
            Ok(page) => page,
            Err(e) => {
                observer.list_page_failed(&self.board, page_url.as_str(), &e);
                return;
            }
        };

        let rows = page.links.len();
        for (title, url) in page.links {
            observer.thread_discovered(&title, url.as_str());
            self.pending.push_back(url);
            self.offset += 1;
        }

        if let Some(e) = page.error {
            observer.list_page_failed(&self.board, page_url.as_str(), &e);
            return;
        }

        // A next link on an empty page would request the same offset forever
        if page.has_next && rows > 0 {
            match self.crawler.urls.thread_list(&self.board, self.offset) {
                Ok(url) => self.next_page = Some(url),
                Err(e) => observer.list_page_failed(&self.board, page_url.as_str(), &e),
            }
        }
    }
}

impl<'a, S: PageSource> Iterator for ThreadUrls<'a, S> {
    type Item = Url;

    fn next(&mut self) -> Option<Url> {
        loop {
            if let Some(url) = self.pending.pop_front() {
                return Some(url);
            }

            let page_url = self.next_page.take()?;
            self.load(page_url);
        }
    }
}
