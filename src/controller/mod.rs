pub mod lock;

pub use lock::ProcessLock;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::app::Result;
use crate::container::{FeedContainer, SortCriterion};
use crate::domain::{Feed, FeedStatus};
use crate::fetcher::{Acquirer, FetchResult};
use crate::normalizer::Normalizer;
use crate::remote::RemoteApi;
use crate::store::{CatchupScope, IgnoreRule, Store};

#[derive(Debug, Clone)]
pub struct ReloadConfig {
    pub reload_threads: usize,
    pub max_items: Option<usize>,
    /// url globs whose matching feeds force `unread=true` on content change.
    pub reset_unread_on_update: Vec<String>,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self { reload_threads: 1, max_items: None, reset_unread_on_update: Vec::new() }
    }
}

/// Orchestrates reload, catchup, and replay against the Feed Cache and
/// Feed Container. Holds the process-wide lock for its entire lifetime.
pub struct Controller<S: Store + Send + Sync + 'static> {
    store: Arc<S>,
    container: Arc<FeedContainer>,
    acquirer: Arc<Acquirer>,
    normalizer: Normalizer,
    remote: Option<Arc<dyn RemoteApi + Send + Sync>>,
    ignores: Arc<Vec<IgnoreRule>>,
    stop_flag: Arc<AtomicBool>,
    _lock: ProcessLock,
}

impl<S: Store + Send + Sync + 'static> Controller<S> {
    pub fn new(
        store: Arc<S>,
        container: Arc<FeedContainer>,
        acquirer: Acquirer,
        normalizer: Normalizer,
        remote: Option<Arc<dyn RemoteApi + Send + Sync>>,
        ignores: Vec<IgnoreRule>,
    ) -> Result<Self> {
        let lock = ProcessLock::acquire()?;
        Ok(Self {
            store,
            container,
            acquirer: Arc::new(acquirer),
            normalizer,
            remote,
            ignores: Arc::new(ignores),
            stop_flag: Arc::new(AtomicBool::new(false)),
            _lock: lock,
        })
    }

    /// An atomic flag checked between feeds and between transport retries;
    /// setting it to `true` cooperatively cancels an in-progress `reload`.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop_flag.clone()
    }

    pub fn container(&self) -> &Arc<FeedContainer> {
        &self.container
    }

    /// Reorders `query:` feeds' materialized items after a reload.
    pub fn refresh_query_feeds(&self, item_order: SortCriterion) {
        self.container.populate_query_feeds(item_order);
    }

    /// Downloads and refreshes one feed (`url = Some`) or all non-query
    /// feeds concurrently, bounded by `config.reload_threads`. Returns the
    /// new-item count (or error) per feed, in completion order.
    pub async fn reload(&self, url: Option<&str>, config: &ReloadConfig) -> Vec<(String, Result<usize>)> {
        let targets: Vec<Feed> = match url {
            Some(u) => self.container.get_by_url(u).into_iter().collect(),
            None => (0..self.container.count()).filter_map(|i| self.container.get_by_index(i)).collect(),
        };

        let semaphore = Arc::new(Semaphore::new(config.reload_threads.max(1)));
        let mut handles = Vec::new();

        for feed in targets {
            if feed.is_query_feed() {
                continue;
            }
            if self.stop_flag.load(Ordering::SeqCst) {
                break;
            }

            let semaphore = semaphore.clone();
            let acquirer = self.acquirer.clone();
            let normalizer = self.normalizer.clone();
            let store = self.store.clone();
            let container = self.container.clone();
            let ignores = self.ignores.clone();
            let max_items = config.max_items;
            let reset_unread_on_update = config.reset_unread_on_update.clone();
            let stop_flag = self.stop_flag.clone();

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire().await.expect("semaphore closed");
                if stop_flag.load(Ordering::SeqCst) {
                    return (feed.rss_url.clone(), Ok(0));
                }
                let result = reload_one(&feed, &acquirer, &normalizer, &store, &ignores, max_items, &reset_unread_on_update)
                    .await;

                match &result {
                    Ok(count) => {
                        if let Ok(refreshed) = store.internalize(&feed.rss_url, &ignores, max_items) {
                            let mut updated = refreshed;
                            updated.tags = feed.tags.clone();
                            updated.order = feed.order;
                            updated.status = FeedStatus::Success;
                            container.set_all(replace_feed(&container, updated));
                        }
                        info!("controller: {} new items from {}", count, feed.rss_url);
                    }
                    Err(e) => {
                        let mut failed = feed.clone();
                        failed.status = FeedStatus::Error(e.to_string());
                        container.set_all(replace_feed(&container, failed));
                        warn!("controller: reload of {} failed: {e}", feed.rss_url);
                    }
                }

                (feed.rss_url.clone(), result)
            });

            handles.push(handle);
        }

        let mut results = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => error!("controller: reload task join error: {e}"),
            }
        }
        results
    }

    /// Applies to both cache and container, then — when a remote backend
    /// is configured — notifies it and waits for its ack before returning.
    pub async fn catchup_all(&self, scope: CatchupScope) -> Result<()> {
        self.store.catchup_all(scope.clone())?;
        match &scope {
            CatchupScope::All => {
                for i in 0..self.container.count() {
                    self.container.mark_all_feed_items_read(i);
                }
            }
            CatchupScope::Feed(url) => {
                if let Some(index) = (0..self.container.count()).find(|&i| self.container.get_by_index(i).map(|f| f.rss_url == *url).unwrap_or(false))
                {
                    self.container.mark_all_feed_items_read(index);
                }
            }
        }

        if let Some(remote) = &self.remote {
            let urls: Vec<String> = match &scope {
                CatchupScope::All => (0..self.container.count()).filter_map(|i| self.container.get_by_index(i)).map(|f| f.rss_url).collect(),
                CatchupScope::Feed(url) => vec![url.clone()],
            };
            for url in urls {
                if let Err(e) = remote.mark_all_read(&url).await {
                    warn!("controller: remote mark_all_read failed for {url}: {e}");
                }
            }
        }

        Ok(())
    }

    /// Applies a read-state change to the cache, then — when an online
    /// remote backend is configured — replays it there; a failed replay is
    /// logged and left for a subsequent reload to retry.
    pub async fn mark_article_read(&self, feed_url: &str, guid: &str, read: bool) -> Result<()> {
        let mut item = crate::domain::Item::new(feed_url, guid);
        item.unread = !read;
        self.store.update_item_unread_and_enqueued(&item)?;

        if let Some(remote) = &self.remote {
            if let Err(e) = remote.mark_article_read(feed_url, guid, read).await {
                warn!("controller: remote mark_article_read failed for {guid}: {e}, will retry on next reload");
            }
        }
        Ok(())
    }

    pub fn enqueue_url(&self, feed_url: &str, guid: &str) -> Result<()> {
        let mut item = crate::domain::Item::new(feed_url, guid);
        item.enqueued = true;
        self.store.update_item_unread_and_enqueued(&item)
    }
}

async fn reload_one<S: Store>(
    feed: &Feed,
    acquirer: &Acquirer,
    normalizer: &Normalizer,
    store: &S,
    ignores: &[IgnoreRule],
    max_items: Option<usize>,
    reset_unread_on_update: &[String],
) -> Result<usize> {
    let result = acquirer.acquire(&feed.rss_url, feed.etag.as_deref(), feed.last_modified.as_deref(), false).await?;

    let (body, etag, last_modified) = match result {
        FetchResult::NotModified => return Ok(0),
        FetchResult::Content { body, etag, last_modified } => (body, etag, last_modified),
    };

    let applicable_ignores: Vec<IgnoreRule> = ignores
        .iter()
        .filter(|rule| glob_matches(&rule.feed_url_glob, &feed.rss_url))
        .map(|rule| IgnoreRule { feed_url_glob: rule.feed_url_glob.clone(), expr: rule.expr.clone() })
        .collect();

    let mut parsed = normalizer.normalize(&feed.rss_url, &body, &applicable_ignores)?;
    parsed.tags = feed.tags.clone();
    parsed.order = feed.order;
    parsed.etag = etag.or_else(|| feed.etag.clone());
    parsed.last_modified = last_modified.or_else(|| feed.last_modified.clone());

    let reset_unread = reset_unread_on_update.iter().any(|glob| glob_matches(glob, &feed.rss_url));
    let new_count = parsed.items.len();
    store.externalize(&parsed, reset_unread, max_items)?;
    store.update_last_modified(&feed.rss_url, parsed.last_modified.as_deref(), parsed.etag.as_deref())?;

    Ok(new_count)
}

fn replace_feed(container: &FeedContainer, updated: Feed) -> Vec<Feed> {
    let mut feeds = Vec::with_capacity(container.count());
    for i in 0..container.count() {
        match container.get_by_index(i) {
            Some(f) if f.rss_url == updated.rss_url => feeds.push(updated.clone()),
            Some(f) => feeds.push(f),
            None => {}
        }
    }
    feeds
}

fn glob_matches(pattern: &str, url: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    let mut regex_str = String::from("^");
    for part in pattern.split('*') {
        regex_str.push_str(&regex::escape(part));
        regex_str.push_str(".*");
    }
    regex_str.truncate(regex_str.len() - 2);
    regex_str.push('$');
    regex::Regex::new(&regex_str).map(|re| re.is_match(url)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matches_wildcard_prefix() {
        assert!(glob_matches("https://example.com/*", "https://example.com/feed.xml"));
        assert!(!glob_matches("https://example.com/*", "https://other.com/feed.xml"));
        assert!(glob_matches("*", "anything"));
    }
}
