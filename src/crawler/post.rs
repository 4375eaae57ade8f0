//! Thread page parser
//!
//! A thread page holds one `table.main` block per post, the raw post text in
//! its `<textarea>`. Each post starts with the site's mail-style header:
//!
//! ```text
//! 发信人: sysop (Administrator), 信区: tech
//! 标  题: Hello
//! 发信站: 南京大学小百合站 (Sat Jan  1 10:00:00 2020)
//! ```
//!
//! The first post gives the thread's creator, title and creation time; the
//! last post gives its latest update time.

use crate::crawler::fetcher::PageSource;
use crate::crawler::markup::selector;
use crate::observer::CrawlObserver;
use crate::storage::Document;
use crate::MirrorError;
use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use regex::Regex;
use scraper::Html;
use std::sync::Arc;
use url::Url;

const HEADER_PATTERN: &str =
    r"(?m)发信人: (\S+) .+\n标\s+题: (.+)\n发信站: \S+ \(([a-zA-Z0-9: ]+)\)";

const PREVIEW_CHARS: usize = 256;

const WEEKDAYS: [&str; 14] = [
    "mon", "tue", "wed", "thu", "fri", "sat", "sun", "monday", "tuesday", "wednesday",
    "thursday", "friday", "saturday", "sunday",
];

/// Layouts tried after the weekday is dropped and whitespace collapsed
const NAIVE_FORMATS: [&str; 8] = [
    "%b %d %H:%M:%S %Y",
    "%b %d %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
    "%d %b %H:%M:%S %Y",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Fields captured from one post header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostHeader {
    pub creator: String,
    pub title: String,
    pub timestamp: String,
    /// Byte offset just past the header in the text it was found in
    pub end: usize,
}

/// The compiled post header pattern
#[derive(Debug, Clone)]
pub struct HeaderPattern {
    regex: Regex,
}

impl HeaderPattern {
    pub fn new() -> Result<Self, MirrorError> {
        Ok(Self {
            regex: Regex::new(HEADER_PATTERN)?,
        })
    }

    /// Finds the first header in `text`
    pub fn parse(&self, text: &str) -> Option<PostHeader> {
        let captures = self.regex.captures(text)?;
        let whole = captures.get(0)?;

        Some(PostHeader {
            creator: captures.get(1)?.as_str().to_string(),
            title: captures.get(2)?.as_str().to_string(),
            timestamp: captures.get(3)?.as_str().to_string(),
            end: whole.end(),
        })
    }
}

/// Parses one post header out of raw post text
///
/// Compiles the pattern on every call; hold a [`HeaderPattern`] for repeated use.
pub fn parse_header(text: &str) -> Option<PostHeader> {
    HeaderPattern::new().ok()?.parse(text)
}

/// Parses a timestamp into epoch seconds
///
/// Whitespace runs are collapsed and a leading weekday is ignored, so
/// `"Sat Jan  1 10:00:00 2020"` parses even though that day was a Wednesday.
/// Times without a zone are read in `offset`.
pub fn parse_timestamp(text: &str, offset: FixedOffset) -> Option<i64> {
    let trimmed = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.timestamp());
    }

    let mut tokens: Vec<&str> = trimmed.split_whitespace().collect();
    if tokens
        .first()
        .map(|t| WEEKDAYS.contains(&t.trim_end_matches(',').to_lowercase().as_str()))
        .unwrap_or(false)
    {
        tokens.remove(0);
    }
    let normalized = tokens.join(" ");

    if let Ok(dt) = DateTime::parse_from_str(&normalized, "%d %b %Y %H:%M:%S %z") {
        return Some(dt.timestamp());
    }

    NAIVE_FORMATS.iter().find_map(|format| {
        let naive = NaiveDateTime::parse_from_str(&normalized, format).ok()?;
        offset
            .from_local_datetime(&naive)
            .single()
            .map(|dt| dt.timestamp())
    })
}

/// Thread metadata taken from the first and last post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadMeta {
    pub creator: String,
    pub title: String,
    pub create_time: i64,
    pub update_time: i64,
    /// End of the first header within the first post
    pub header_end: usize,
}

/// Reads creator, title and times from the first and last post
///
/// Returns `None` unless both headers and both timestamps parse. An update
/// time earlier than the creation time is clamped to it.
pub fn extract_metadata(
    pattern: &HeaderPattern,
    first: &str,
    last: &str,
    offset: FixedOffset,
) -> Option<ThreadMeta> {
    let created = pattern.parse(first)?;
    let updated = pattern.parse(last)?;

    let create_time = parse_timestamp(&created.timestamp, offset)?;
    let update_time = parse_timestamp(&updated.timestamp, offset)?;

    Some(ThreadMeta {
        creator: created.creator,
        title: created.title,
        create_time,
        update_time: update_time.max(create_time),
        header_end: created.end,
    })
}

/// Converts CRLF line endings to LF
pub fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
}

/// Collects the post texts of a thread page in page order
pub fn post_blocks(html: &Html, url: &Url) -> Result<Vec<String>, MirrorError> {
    let textarea = selector("textarea")?;

    html.select(&selector("table.main")?)
        .enumerate()
        .map(|(index, block)| {
            block
                .select(&textarea)
                .next()
                .map(|area| normalize_newlines(&area.text().collect::<String>()))
                .ok_or_else(|| MirrorError::Markup {
                    url: url.to_string(),
                    message: format!("post {} has no text area", index + 1),
                })
        })
        .collect()
}

fn preview(text: &str) -> String {
    text.chars()
        .take(PREVIEW_CHARS)
        .collect::<String>()
        .replace('\n', " ")
}

/// Turns thread pages into documents
pub struct PostParser<S> {
    source: S,
    pattern: HeaderPattern,
    offset: FixedOffset,
    observer: Arc<dyn CrawlObserver>,
}

impl<S: PageSource> PostParser<S> {
    /// Creates a parser reading naive times at `utc_offset_hours`
    pub fn new(
        source: S,
        utc_offset_hours: i32,
        observer: Arc<dyn CrawlObserver>,
    ) -> Result<Self, MirrorError> {
        let offset = utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                MirrorError::Config(crate::ConfigError::Validation(format!(
                    "utc offset {} hours is out of range",
                    utc_offset_hours
                )))
            })?;

        Ok(Self {
            source,
            pattern: HeaderPattern::new()?,
            offset,
            observer,
        })
    }

    /// Fetches a thread and builds its document
    ///
    /// Never fails: an unreachable page, a malformed block or an empty thread
    /// is reported to the observer and yields `None`. A thread whose headers
    /// cannot be read still yields the sentinel document.
    pub fn parse(&self, url: &Url) -> Option<Document> {
        let blocks = match self
            .source
            .fetch(url)
            .and_then(|html| post_blocks(&html, url))
        {
            Ok(blocks) => blocks,
            Err(e) => {
                self.observer.thread_skipped(url.as_str(), &e.to_string());
                return None;
            }
        };

        if blocks.is_empty() {
            self.observer
                .thread_skipped(url.as_str(), "thread page has no posts");
            return None;
        }

        Some(self.build_document(url.as_str(), &blocks))
    }

    /// Assembles the document for a non-empty list of post texts
    pub fn build_document(&self, url: &str, blocks: &[String]) -> Document {
        let content = blocks.join("\n");
        let (first, last) = match (blocks.first(), blocks.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Document::sentinel(url, content),
        };

        match extract_metadata(&self.pattern, first, last, self.offset) {
            Some(meta) => {
                self.observer
                    .document_parsed(url, &preview(content.get(meta.header_end..).unwrap_or("")));

                Document {
                    title: meta.title,
                    creator: meta.creator,
                    create_time: meta.create_time,
                    update_time: meta.update_time,
                    url: url.to_string(),
                    content,
                }
            }
            None => {
                self.observer.metadata_unparsed(url, &preview(&content));
                Document::sentinel(url, content)
            }
        }
    }
}
