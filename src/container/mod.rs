use std::cmp::Ordering;
use std::sync::Mutex;

use tracing::warn;

use crate::domain::Feed;
use crate::filter::{self, eval};

/// Which field to order feeds by; each has an ascending and descending
/// direction. `None` preserves `Feed::order` (the Url Source's own order).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    None,
    FirstTag,
    Title,
    ArticleCount,
    UnreadArticleCount,
    LastUpdated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy)]
pub struct SortCriterion {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortCriterion {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }
}

/// In-memory ordered collection of feeds, shared across the process behind
/// a single mutex. All accessors return owned copies so no caller holds a
/// handle across a later mutation.
pub struct FeedContainer {
    feeds: Mutex<Vec<Feed>>,
}

impl Default for FeedContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedContainer {
    pub fn new() -> Self {
        Self { feeds: Mutex::new(Vec::new()) }
    }

    pub fn add(&self, feed: Feed) {
        self.feeds.lock().expect("feed container lock poisoned").push(feed);
    }

    pub fn set_all(&self, feeds: Vec<Feed>) {
        *self.feeds.lock().expect("feed container lock poisoned") = feeds;
    }

    pub fn get_by_index(&self, index: usize) -> Option<Feed> {
        self.feeds.lock().expect("feed container lock poisoned").get(index).cloned()
    }

    pub fn get_by_url(&self, rss_url: &str) -> Option<Feed> {
        self.feeds.lock().expect("feed container lock poisoned").iter().find(|f| f.rss_url == rss_url).cloned()
    }

    pub fn count(&self) -> usize {
        self.feeds.lock().expect("feed container lock poisoned").len()
    }

    pub fn unread_feed_count(&self) -> usize {
        self.feeds.lock().expect("feed container lock poisoned").iter().filter(|f| f.unread_item_count() > 0).count()
    }

    pub fn unread_item_count(&self) -> usize {
        self.feeds.lock().expect("feed container lock poisoned").iter().map(|f| f.unread_item_count()).sum()
    }

    pub fn mark_all_feed_items_read(&self, index: usize) {
        if let Some(feed) = self.feeds.lock().expect("feed container lock poisoned").get_mut(index) {
            for item in &mut feed.items {
                item.unread = false;
            }
        }
    }

    /// Clears transient reload status; with `all` false, only feeds
    /// currently mid-download are reset (used after an interrupted reload).
    pub fn reset_status(&self, all: bool) {
        for feed in self.feeds.lock().expect("feed container lock poisoned").iter_mut() {
            if all || feed.status == crate::domain::FeedStatus::DuringDownload {
                feed.status = crate::domain::FeedStatus::ToBeDownloaded;
            }
        }
    }

    pub fn clear_items(&self, all: bool) {
        for feed in self.feeds.lock().expect("feed container lock poisoned").iter_mut() {
            if all || !feed.is_query_feed() {
                feed.items.clear();
            }
        }
    }

    pub fn get_feed_count_per_tag(&self, tag: &str) -> usize {
        self.feeds
            .lock()
            .expect("feed container lock poisoned")
            .iter()
            .filter(|f| f.tags.iter().any(|t| t == tag))
            .count()
    }

    /// For each feed whose `rss_url` is `query:<name>:<predicate>`, evaluate
    /// `<predicate>` against every item of every other (non-query) feed and
    /// set that feed's items to the matches, ordered by `item_order`.
    pub fn populate_query_feeds(&self, item_order: SortCriterion) {
        let mut feeds = self.feeds.lock().expect("feed container lock poisoned");

        let source_items: Vec<_> = feeds
            .iter()
            .filter(|f| !f.is_query_feed())
            .flat_map(|f| f.items.iter().cloned())
            .collect();

        for feed in feeds.iter_mut() {
            let Some(predicate) = feed.rss_url.strip_prefix("query:").and_then(|rest| rest.split_once(':')) else {
                continue;
            };
            let (_, expr_src) = predicate;
            let expr = match filter::parse(expr_src) {
                Ok(expr) => expr,
                Err(e) => {
                    warn!("container: query feed {} has invalid predicate: {e}", feed.rss_url);
                    continue;
                }
            };

            let mut matches: Vec<_> = source_items
                .iter()
                .filter(|item| eval(&expr, *item).unwrap_or(false))
                .cloned()
                .collect();
            sort_items(&mut matches, item_order);
            feed.items = matches;
        }
    }

    pub fn sort(&self, criterion: SortCriterion) {
        let mut feeds = self.feeds.lock().expect("feed container lock poisoned");
        feeds.sort_by(|a, b| compare_feeds(a, b, criterion));
    }

    /// First feed with an unread item strictly after `from_index`, wrapping
    /// around to the start of the container.
    pub fn next_unread_feed(&self, from_index: usize) -> Option<usize> {
        let feeds = self.feeds.lock().expect("feed container lock poisoned");
        if feeds.is_empty() {
            return None;
        }
        let n = feeds.len();
        (1..=n)
            .map(|offset| (from_index + offset) % n)
            .find(|&index| feeds[index].unread_item_count() > 0)
    }
}

fn sort_items(items: &mut [crate::domain::Item], criterion: SortCriterion) {
    items.sort_by(|a, b| {
        let ordering = match criterion.key {
            SortKey::None | SortKey::LastUpdated => a.pub_date.cmp(&b.pub_date),
            SortKey::Title => a.title.cmp(&b.title),
            _ => a.pub_date.cmp(&b.pub_date),
        };
        apply_direction(ordering, criterion.direction)
    });
}

fn apply_direction(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

fn compare_feeds(a: &Feed, b: &Feed, criterion: SortCriterion) -> Ordering {
    let ordering = match criterion.key {
        SortKey::None => a.order.cmp(&b.order),
        SortKey::FirstTag => match (a.first_tag(), b.first_tag()) {
            (Some(x), Some(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        SortKey::Title => a.display_title().to_lowercase().cmp(&b.display_title().to_lowercase()),
        SortKey::ArticleCount => a.article_count().cmp(&b.article_count()),
        SortKey::UnreadArticleCount => a.unread_item_count().cmp(&b.unread_item_count()),
        SortKey::LastUpdated => a.last_updated().cmp(&b.last_updated()),
    };
    // `firsttag` with no tags always sorts last, even under `desc` — the
    // "goes last" rule is about absence of a tag, not sort direction.
    if criterion.key == SortKey::FirstTag && (a.first_tag().is_none() || b.first_tag().is_none()) {
        return ordering;
    }
    apply_direction(ordering, criterion.direction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Item;

    fn feed_with(rss_url: &str, title: &str, order: i64) -> Feed {
        let mut feed = Feed::new(rss_url);
        feed.title = Some(title.to_string());
        feed.order = order;
        feed
    }

    #[test]
    fn counts_and_lookups() {
        let container = FeedContainer::new();
        container.add(feed_with("https://a.example", "A", 0));
        container.add(feed_with("https://b.example", "B", 1));

        assert_eq!(container.count(), 2);
        assert_eq!(container.get_by_url("https://b.example").unwrap().title, Some("B".into()));
        assert!(container.get_by_url("https://missing").is_none());
        assert_eq!(container.get_by_index(0).unwrap().title, Some("A".into()));
    }

    #[test]
    fn sorts_by_title_ascending() {
        let container = FeedContainer::new();
        container.add(feed_with("https://a.example", "Zebra", 0));
        container.add(feed_with("https://b.example", "apple", 1));
        container.sort(SortCriterion::new(SortKey::Title, SortDirection::Asc));

        let feeds: Vec<_> = (0..2).map(|i| container.get_by_index(i).unwrap().title.unwrap()).collect();
        assert_eq!(feeds, vec!["apple", "Zebra"]);
    }

    #[test]
    fn firsttag_sort_puts_untagged_feeds_last_regardless_of_direction() {
        let container = FeedContainer::new();
        let mut tagged = feed_with("https://a.example", "Tagged", 0);
        tagged.tags = vec!["news".into()];
        container.add(tagged);
        container.add(feed_with("https://b.example", "Untagged", 1));

        container.sort(SortCriterion::new(SortKey::FirstTag, SortDirection::Desc));
        assert_eq!(container.get_by_index(1).unwrap().title, Some("Untagged".into()));
    }

    #[test]
    fn next_unread_feed_wraps_around() {
        let container = FeedContainer::new();
        let mut read_feed = feed_with("https://a.example", "Read", 0);
        read_feed.items.push(Item { unread: false, ..Item::new("https://a.example", "1") });
        container.add(read_feed);

        let mut unread_feed = feed_with("https://b.example", "Unread", 1);
        unread_feed.items.push(Item::new("https://b.example", "1"));
        container.add(unread_feed);

        assert_eq!(container.next_unread_feed(0), Some(1));
        assert_eq!(container.next_unread_feed(1), Some(1));
    }

    #[test]
    fn populate_query_feeds_collects_matches_from_other_feeds() {
        let container = FeedContainer::new();
        let mut source = feed_with("https://a.example", "Source", 0);
        source.items.push(Item { title: Some("Rust release".into()), ..Item::new("https://a.example", "1") });
        source.items.push(Item { title: Some("Other news".into()), ..Item::new("https://a.example", "2") });
        container.add(source);

        container.add(feed_with(r#"query:rust:title =~ "Rust""#, "Rust query", 1));
        container.populate_query_feeds(SortCriterion::new(SortKey::LastUpdated, SortDirection::Desc));

        let query_feed = container.get_by_index(1).unwrap();
        assert_eq!(query_feed.items.len(), 1);
        assert_eq!(query_feed.items[0].title, Some("Rust release".into()));
    }
}
