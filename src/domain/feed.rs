use serde::{Deserialize, Serialize};

use super::item::Item;

/// Transient in-memory status of a feed, cleared at the start of every reload.
/// Never persisted to the cache.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FeedStatus {
    #[default]
    ToBeDownloaded,
    DuringDownload,
    Success,
    Error(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feed {
    pub rss_url: String,
    pub link: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub pub_date: Option<i64>,
    pub language: Option<String>,
    pub is_rtl: bool,
    pub tags: Vec<String>,
    pub order: i64,
    #[serde(skip)]
    pub items: Vec<Item>,
    #[serde(skip)]
    pub status: FeedStatus,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl Feed {
    pub fn new(rss_url: impl Into<String>) -> Self {
        Self {
            rss_url: rss_url.into(),
            link: None,
            title: None,
            description: None,
            pub_date: None,
            language: None,
            is_rtl: false,
            tags: Vec::new(),
            order: 0,
            items: Vec::new(),
            status: FeedStatus::ToBeDownloaded,
            etag: None,
            last_modified: None,
        }
    }

    pub fn is_query_feed(&self) -> bool {
        self.rss_url.starts_with("query:")
    }

    /// The first tag beginning with `~` overrides the displayed title.
    pub fn display_title(&self) -> &str {
        for tag in &self.tags {
            if let Some(stripped) = tag.strip_prefix('~') {
                return stripped;
            }
        }
        self.title.as_deref().unwrap_or(&self.rss_url)
    }

    pub fn unread_item_count(&self) -> usize {
        self.items.iter().filter(|i| i.unread && !i.deleted).count()
    }

    pub fn article_count(&self) -> usize {
        self.items.iter().filter(|i| !i.deleted).count()
    }

    /// Most recent item's pub_date, used by the `lastupdated` sort criterion.
    pub fn last_updated(&self) -> Option<i64> {
        self.items.iter().filter(|i| !i.deleted).filter_map(|i| i.pub_date).max()
    }

    pub fn first_tag(&self) -> Option<&str> {
        self.tags.first().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_title_prefers_tilde_tag() {
        let mut feed = Feed::new("https://example.com/feed.xml");
        feed.title = Some("Raw Title".into());
        feed.tags = vec!["news".into(), "~Pretty Name".into()];
        assert_eq!(feed.display_title(), "Pretty Name");
    }

    #[test]
    fn display_title_falls_back_to_title_then_url() {
        let mut feed = Feed::new("https://example.com/feed.xml");
        assert_eq!(feed.display_title(), "https://example.com/feed.xml");
        feed.title = Some("Real Title".into());
        assert_eq!(feed.display_title(), "Real Title");
    }

    #[test]
    fn query_feed_detection() {
        assert!(Feed::new("query:unread:unread = \"yes\"").is_query_feed());
        assert!(!Feed::new("https://example.com/feed.xml").is_query_feed());
    }

    #[test]
    fn unread_and_article_counts_ignore_deleted() {
        let mut feed = Feed::new("https://example.com/feed.xml");
        let mut a = Item::new("https://example.com/feed.xml", "g1");
        a.unread = true;
        let mut b = Item::new("https://example.com/feed.xml", "g2");
        b.unread = true;
        b.deleted = true;
        feed.items = vec![a, b];
        assert_eq!(feed.article_count(), 1);
        assert_eq!(feed.unread_item_count(), 1);
    }
}
