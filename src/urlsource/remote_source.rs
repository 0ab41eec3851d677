use std::collections::HashMap;
use std::sync::Arc;

use crate::app::Result;
use crate::remote::RemoteApi;
use crate::urlsource::{UrlSet, UrlSource};

const SPECIAL_FEEDS: &[(&str, &str)] = &[("starred", "Starred"), ("shared", "Shared")];

/// Delegates to a configured Remote API for the subscribed url list.
/// Read-only: `write()` is the trait's no-op default.
pub struct RemoteUrlSource {
    remote: Arc<dyn RemoteApi + Send + Sync>,
    include_special_feeds: bool,
}

impl RemoteUrlSource {
    pub fn new(remote: Arc<dyn RemoteApi + Send + Sync>, include_special_feeds: bool) -> Self {
        Self { remote, include_special_feeds }
    }
}

impl UrlSource for RemoteUrlSource {
    fn load(&mut self) -> Result<UrlSet> {
        // async trait method called from a sync context: this provider is
        // always driven from within the controller's async runtime.
        futures::executor::block_on(self.load_async())
    }
}

impl RemoteUrlSource {
    async fn load_async(&self) -> Result<UrlSet> {
        let mut urls = Vec::new();
        let mut tags_by_url = HashMap::new();

        if self.include_special_feeds {
            for (id, label) in SPECIAL_FEEDS {
                let url = format!("special:{id}");
                urls.push(url.clone());
                tags_by_url.insert(url, vec![label.to_string()]);
            }
        }

        for subscription in self.remote.list_subscriptions().await? {
            if !subscription.tags.is_empty() {
                tags_by_url.insert(subscription.rss_url.clone(), subscription.tags);
            }
            urls.push(subscription.rss_url);
        }

        Ok(UrlSet { urls, tags_by_url })
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::app::Error;
    use crate::remote::Subscription;

    struct StubRemote(Vec<Subscription>);

    #[async_trait]
    impl RemoteApi for StubRemote {
        async fn authenticate(&self) -> Result<()> {
            Ok(())
        }
        async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
            Ok(self.0.clone())
        }
        async fn mark_all_read(&self, _rss_url: &str) -> Result<()> {
            Ok(())
        }
        async fn mark_article_read(&self, _rss_url: &str, _guid: &str, _read: bool) -> Result<()> {
            Ok(())
        }
        async fn update_article_flags(&self, _rss_url: &str, _guid: &str, _flags: &str) -> Result<()> {
            Ok(())
        }
        async fn fetch_feed(&self, rss_url: &str) -> Result<Vec<u8>> {
            Err(Error::Other(format!("no fetch_feed for {rss_url}")))
        }
    }

    #[test]
    fn lists_subscriptions_without_special_feeds() {
        let remote = Arc::new(StubRemote(vec![Subscription {
            rss_url: "https://example.com/feed#1".into(),
            title: Some("Example".into()),
            tags: vec!["News".into()],
        }]));
        let mut source = RemoteUrlSource::new(remote, false);
        let urls = source.load().unwrap();
        assert_eq!(urls.urls, vec!["https://example.com/feed#1"]);
        assert_eq!(urls.tags_for("https://example.com/feed#1"), &["News"]);
    }

    #[test]
    fn prepends_special_feeds_when_enabled() {
        let remote = Arc::new(StubRemote(vec![]));
        let mut source = RemoteUrlSource::new(remote, true);
        let urls = source.load().unwrap();
        assert_eq!(urls.urls, vec!["special:starred", "special:shared"]);
    }
}
