//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the mirror, including:
//! - Building the blocking HTTP client
//! - Bounded retry with a fixed delay for connection-level failures
//! - Charset resolution and lenient decoding of legacy encodings
//! - Tolerant HTML parsing

use crate::config::{FetchConfig, SiteConfig};
use crate::observer::CrawlObserver;
use crate::MirrorError;
use encoding_rs::{Encoding, GB18030};
use reqwest::blocking::{Client, Response};
use reqwest::header::CONTENT_TYPE;
use scraper::Html;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use url::Url;

/// Anything that can turn a URL into a parsed HTML document
///
/// The crawlers only depend on this trait, so they can run against fixtures.
pub trait PageSource {
    /// Fetches and parses one page
    ///
    /// # Returns
    ///
    /// * `Ok(Html)` - The decoded, parsed page
    /// * `Err(MirrorError::FetchFailed)` - The page could not be retrieved
    fn fetch(&self, url: &Url) -> Result<Html, MirrorError>;
}

impl<S: PageSource + ?Sized> PageSource for &S {
    fn fetch(&self, url: &Url) -> Result<Html, MirrorError> {
        (**self).fetch(url)
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetch configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(config.timeout())
        .connect_timeout(config.timeout())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Blocking page fetcher for the forum
pub struct HttpFetcher {
    client: Client,
    retry_limit: u32,
    retry_delay: Duration,
    default_encoding: &'static Encoding,
    observer: Arc<dyn CrawlObserver>,
}

impl HttpFetcher {
    /// Creates a fetcher from the site and fetch configuration
    pub fn new(
        site: &SiteConfig,
        fetch: &FetchConfig,
        observer: Arc<dyn CrawlObserver>,
    ) -> Result<Self, MirrorError> {
        let default_encoding = Encoding::for_label(site.default_encoding.as_bytes())
            .map(substitute_superset)
            .unwrap_or(GB18030);

        Ok(Self {
            client: build_http_client(fetch)?,
            retry_limit: fetch.retry_limit.max(1),
            retry_delay: fetch.retry_delay(),
            default_encoding,
            observer,
        })
    }

    /// Sends the GET, retrying connection-level failures
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | Connect error / timeout / send error | Retry after the fixed delay, up to `retry-limit` attempts |
    /// | Non-success HTTP status | Immediate failure |
    /// | Body read error | Immediate failure |
    fn get_with_retry(&self, url: &Url) -> Result<(Response, u32), MirrorError> {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.client.get(url.clone()).send() {
                Ok(response) => return Ok((response, attempt)),
                Err(e) if is_transient(&e) && attempt < self.retry_limit => {
                    self.observer
                        .fetch_retry(url.as_str(), attempt, &e.to_string());
                    thread::sleep(self.retry_delay);
                }
                Err(e) => {
                    return Err(MirrorError::FetchFailed {
                        url: url.to_string(),
                        attempts: attempt,
                        message: e.to_string(),
                    })
                }
            }
        }
    }

    fn fetch_inner(&self, url: &Url) -> Result<Html, MirrorError> {
        let (response, attempts) = self.get_with_retry(url)?;
        let failed = |message: String| MirrorError::FetchFailed {
            url: url.to_string(),
            attempts,
            message,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(failed(format!("HTTP {}", status)));
        }

        let charset = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_from_content_type)
            .map(str::to_string);

        let body = response
            .bytes()
            .map_err(|e| failed(format!("Failed to read body: {}", e)))?;

        let encoding = resolve_encoding(charset.as_deref(), self.default_encoding);
        let text = decode_body(&body, encoding);

        Ok(Html::parse_document(&text))
    }
}

impl PageSource for HttpFetcher {
    /// Failures are returned, not reported; the requesting crawler reports them
    fn fetch(&self, url: &Url) -> Result<Html, MirrorError> {
        self.fetch_inner(url)
    }
}

fn is_transient(error: &reqwest::Error) -> bool {
    error.is_connect() || error.is_timeout() || error.is_request()
}

/// Extracts the `charset` parameter of a Content-Type header value
pub fn charset_from_content_type(content_type: &str) -> Option<&str> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("charset") {
            let value = value.trim().trim_matches('"').trim();
            (!value.is_empty()).then_some(value)
        } else {
            None
        }
    })
}

/// Picks the encoding for a declared charset label
///
/// An unknown or missing label falls back to `default`. GB2312 is
/// substituted with GB18030: the site declares GB2312 but serves characters
/// outside it.
pub fn resolve_encoding(label: Option<&str>, default: &'static Encoding) -> &'static Encoding {
    let declared = label.and_then(|label| {
        if label.trim().eq_ignore_ascii_case("gb2312") {
            Some(GB18030)
        } else {
            Encoding::for_label(label.trim().as_bytes())
        }
    });

    substitute_superset(declared.unwrap_or(default))
}

/// GBK and its GB2312 subset decode as GB18030
fn substitute_superset(encoding: &'static Encoding) -> &'static Encoding {
    if encoding == encoding_rs::GBK {
        GB18030
    } else {
        encoding
    }
}

/// Decodes a body, replacing malformed sequences instead of failing
pub fn decode_body(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::recording::RecordingObserver;
    use crate::observer::NullObserver;
    use std::net::TcpListener;

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(&FetchConfig::default());
        assert!(client.is_ok());
    }

    #[test]
    fn test_charset_from_content_type() {
        assert_eq!(
            charset_from_content_type("text/html; charset=gb2312"),
            Some("gb2312")
        );
        assert_eq!(
            charset_from_content_type("text/html;Charset=\"UTF-8\""),
            Some("UTF-8")
        );
        assert_eq!(charset_from_content_type("text/html"), None);
        assert_eq!(charset_from_content_type("text/html; charset="), None);
    }

    #[test]
    fn test_gb2312_is_substituted() {
        assert_eq!(resolve_encoding(Some("gb2312"), encoding_rs::UTF_8), GB18030);
        assert_eq!(resolve_encoding(Some("GB2312"), encoding_rs::UTF_8), GB18030);
        assert_eq!(resolve_encoding(Some("gbk"), encoding_rs::UTF_8), GB18030);
    }

    #[test]
    fn test_declared_and_default_encodings() {
        assert_eq!(
            resolve_encoding(Some("utf-8"), GB18030),
            encoding_rs::UTF_8
        );
        assert_eq!(resolve_encoding(None, encoding_rs::UTF_8), encoding_rs::UTF_8);
        assert_eq!(
            resolve_encoding(Some("no-such-charset"), encoding_rs::UTF_8),
            encoding_rs::UTF_8
        );
    }

    #[test]
    fn test_decode_gb18030_text() {
        let (bytes, _, _) = GB18030.encode("发信人: 小百合");
        assert_eq!(decode_body(&bytes, GB18030), "发信人: 小百合");
    }

    #[test]
    fn test_decode_outside_gb2312_needs_superset() {
        // U+9555 is in GB18030 but not GB2312
        let (bytes, _, _) = GB18030.encode("镕");
        let encoding = resolve_encoding(Some("gb2312"), encoding_rs::UTF_8);
        assert_eq!(decode_body(&bytes, encoding), "镕");
    }

    #[test]
    fn test_decode_never_fails() {
        let garbage: Vec<u8> = (0u8..=255).chain([0x81, 0x30, 0xff, 0xfe]).collect();
        for encoding in [GB18030, encoding_rs::UTF_8, encoding_rs::SHIFT_JIS] {
            let text = decode_body(&garbage, encoding);
            assert!(!text.is_empty());
        }

        let text = decode_body(&[b'o', b'k', 0xff], encoding_rs::UTF_8);
        assert_eq!(text, "ok\u{FFFD}");
    }

    #[test]
    fn test_unreachable_host_fails_after_retry_limit() {
        // Bind then drop a listener so the port refuses connections
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let url = Url::parse(&format!("http://127.0.0.1:{}/bbsall", port)).unwrap();

        let fetch = FetchConfig {
            retry_limit: 3,
            retry_delay_ms: 1,
            timeout_secs: 2,
            ..FetchConfig::default()
        };
        let observer = Arc::new(RecordingObserver::default());
        let fetcher = HttpFetcher::new(&SiteConfig::default(), &fetch, observer.clone()).unwrap();

        let result = fetcher.fetch(&url);

        assert!(matches!(
            result,
            Err(MirrorError::FetchFailed { attempts: 3, .. })
        ));
        assert_eq!(observer.count("retry:"), 2);
        assert_eq!(observer.events().len(), 2);
    }

    #[test]
    fn test_default_encoding_from_config() {
        let site = SiteConfig {
            default_encoding: "gb2312".to_string(),
            ..SiteConfig::default()
        };
        let fetcher =
            HttpFetcher::new(&site, &FetchConfig::default(), Arc::new(NullObserver)).unwrap();
        assert_eq!(fetcher.default_encoding, GB18030);
    }
}
