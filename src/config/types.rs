use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Lily-Mirror
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub fetch: FetchConfig,
    pub storage: StorageConfig,
}

/// Where the forum lives and how its pages are encoded
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Root of the forum; list and entry URLs are built relative to it
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Path of the board directory page, relative to `base-url`
    #[serde(rename = "entry-path")]
    pub entry_path: String,

    /// Encoding used when a response declares no (or an unknown) charset
    #[serde(rename = "default-encoding")]
    pub default_encoding: String,

    /// UTC offset of the timestamps printed in post headers
    #[serde(rename = "utc-offset-hours")]
    pub utc_offset_hours: i32,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "http://bbs.nju.edu.cn/".to_string(),
            entry_path: "bbsall".to_string(),
            default_encoding: "gb18030".to_string(),
            utc_offset_hours: 8,
        }
    }
}

/// HTTP client behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Total attempts for a page before it is reported as failed
    #[serde(rename = "retry-limit")]
    pub retry_limit: u32,

    /// Fixed delay between attempts (milliseconds)
    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("lily-mirror/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
            retry_limit: 16,
            retry_delay_ms: 500,
        }
    }
}

/// Persistence behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Successful upserts between two commits
    #[serde(rename = "commit-batch-size")]
    pub commit_batch_size: usize,

    /// Consecutive failed upserts that abort a board
    #[serde(rename = "failure-threshold")]
    pub failure_threshold: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: "lilybbs.db".to_string(),
            commit_batch_size: 64,
            failure_threshold: 8,
        }
    }
}
