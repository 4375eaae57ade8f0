//! In-memory page source for crawler tests

use crate::crawler::fetcher::PageSource;
use crate::MirrorError;
use scraper::Html;
use std::cell::RefCell;
use std::collections::HashMap;
use url::Url;

/// Serves canned pages by exact URL; any other URL fails like a dead host
#[derive(Debug, Default)]
pub struct StaticPages {
    pages: HashMap<String, String>,
    requested: RefCell<Vec<String>>,
}

impl StaticPages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    /// URLs fetched so far, in order
    pub fn requested(&self) -> Vec<String> {
        self.requested.borrow().clone()
    }
}

impl PageSource for StaticPages {
    fn fetch(&self, url: &Url) -> Result<Html, MirrorError> {
        self.requested.borrow_mut().push(url.to_string());

        match self.pages.get(url.as_str()) {
            Some(html) => Ok(Html::parse_document(html)),
            None => Err(MirrorError::FetchFailed {
                url: url.to_string(),
                attempts: 1,
                message: "connection refused".to_string(),
            }),
        }
    }
}
