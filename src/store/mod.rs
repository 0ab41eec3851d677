pub mod sqlite;

use crate::app::Result;
use crate::domain::{Feed, Item};
use crate::filter::Expr;

pub use sqlite::SqliteStore;

/// A per-feed ignore rule: items of feeds whose `rss_url` matches
/// `feed_url_glob` are dropped from `internalize` when `expr` evaluates true.
pub struct IgnoreRule {
    pub feed_url_glob: String,
    pub expr: Expr,
}

#[derive(Debug, Clone)]
pub enum CatchupScope {
    All,
    Feed(String),
}

/// The persistent item cache described in the Feed Cache component: a
/// single relational store that deduplicates items by `guid`, preserves
/// user-mutable state across reloads, and enforces retention policy.
pub trait Store {
    /// Upsert `feed`'s header and items (oldest first). Query-prefixed feeds
    /// are never persisted. `max_items`, when set, truncates the in-memory
    /// feed before writing (flagged items are exempt from the cap).
    fn externalize(&self, feed: &Feed, reset_unread: bool, max_items: Option<usize>) -> Result<()>;

    /// Load a feed's header and non-deleted items, newest first, with
    /// `ignores` applied and `max_items` enforced (flagged items preserved
    /// beyond the cap).
    fn internalize(&self, rss_url: &str, ignores: &[IgnoreRule], max_items: Option<usize>) -> Result<Feed>;

    fn fetch_last_modified(&self, rss_url: &str) -> Result<(Option<String>, Option<String>)>;
    fn update_last_modified(&self, rss_url: &str, last_modified: Option<&str>, etag: Option<&str>) -> Result<()>;

    fn mark_item_deleted(&self, feed_url: &str, guid: &str, deleted: bool) -> Result<()>;
    fn remove_old_deleted_items(&self, rss_url: &str, live_guids: &[String]) -> Result<()>;

    fn catchup_all(&self, scope: CatchupScope) -> Result<()>;

    fn update_item_unread_and_enqueued(&self, item: &Item) -> Result<()>;
    fn update_item_flags(&self, item: &Item) -> Result<()>;

    fn clean_old_articles(&self, keep_articles_days: i64) -> Result<()>;
    fn cleanup_cache(&self, live_feeds: &[String], delete_read_items: bool) -> Result<()>;

    fn search(&self, query: &str, feed_url: Option<&str>) -> Result<Vec<Item>>;
}
