//! Crawler module for the forum mirror
//!
//! This module contains the crawl side of the pipeline, including:
//! - HTTP fetching with bounded retry and legacy charset decoding
//! - The board directory and paginated thread list crawlers
//! - Thread page parsing into documents
//! - Overall run coordination

mod coordinator;
mod directory;
mod fetcher;
mod markup;
mod post;
mod site;
mod thread_list;

#[cfg(test)]
pub(crate) mod fixtures;

pub use coordinator::{Mirror, RunSummary};
pub use directory::{parse_directory, BoardDirectoryCrawler};
pub use fetcher::{
    build_http_client, charset_from_content_type, decode_body, resolve_encoding, HttpFetcher,
    PageSource,
};
pub use markup::{drop_chars, NEXT_PAGE_TEXT};
pub use post::{
    extract_metadata, normalize_newlines, parse_header, parse_timestamp, post_blocks,
    HeaderPattern, PostHeader, PostParser, ThreadMeta,
};
pub use site::SiteUrls;
pub use thread_list::{ThreadListCrawler, ThreadUrls};
