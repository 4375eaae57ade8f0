//! Lily-Mirror: an offline mirror for a legacy web forum
//!
//! This crate crawls the public boards of a LilyBBS-style forum, parses every
//! thread into a [`storage::Document`], and keeps a local SQLite copy up to
//! date, tolerating the site's broken encodings and malformed markup.

pub mod config;
pub mod crawler;
pub mod observer;
pub mod storage;

use thiserror::Error;

/// Main error type for Lily-Mirror operations
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch failed for {url} after {attempts} attempt(s): {message}")]
    FetchFailed {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("Unexpected markup at {url}: {message}")]
    Markup { url: String, message: String },

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Lily-Mirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Mirror, RunSummary};
pub use observer::{CrawlObserver, TracingObserver};
pub use storage::{Board, Document, SqliteStorage, Storage};
