//! URL layout of the forum

use crate::config::SiteConfig;
use crate::MirrorError;
use url::Url;

/// Builds the URLs of the forum's fixed pages
#[derive(Debug, Clone)]
pub struct SiteUrls {
    base: Url,
    entry_path: String,
}

impl SiteUrls {
    pub fn new(config: &SiteConfig) -> Result<Self, MirrorError> {
        Ok(Self {
            base: Url::parse(&config.base_url)?,
            entry_path: config.entry_path.clone(),
        })
    }

    /// The board directory page
    pub fn entry(&self) -> Result<Url, MirrorError> {
        Ok(self.base.join(&self.entry_path)?)
    }

    /// A board's thread list, starting at row `start`
    pub fn thread_list(&self, board: &str, start: u32) -> Result<Url, MirrorError> {
        let mut url = self.base.join("bbstdoc")?;
        url.query_pairs_mut()
            .append_pair("board", board)
            .append_pair("start", &start.to_string());
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_site_urls() {
        let urls = SiteUrls::new(&SiteConfig::default()).unwrap();
        assert_eq!(urls.entry().unwrap().as_str(), "http://bbs.nju.edu.cn/bbsall");
        assert_eq!(
            urls.thread_list("Pictures", 40).unwrap().as_str(),
            "http://bbs.nju.edu.cn/bbstdoc?board=Pictures&start=40"
        );
    }

    #[test]
    fn test_base_with_path() {
        let config = SiteConfig {
            base_url: "http://127.0.0.1:8080/mirror/".to_string(),
            ..SiteConfig::default()
        };
        let urls = SiteUrls::new(&config).unwrap();
        assert_eq!(
            urls.thread_list("tech", 0).unwrap().as_str(),
            "http://127.0.0.1:8080/mirror/bbstdoc?board=tech&start=0"
        );
    }
}
