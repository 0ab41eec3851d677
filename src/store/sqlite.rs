use std::path::Path;
use std::sync::Mutex;

use regex::{escape as regex_escape, Regex};
use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};
use tracing::{debug, warn};

use crate::app::{Error, Result};
use crate::domain::{Feed, FeedStatus, Item};
use crate::filter::eval;
use crate::store::{CatchupScope, IgnoreRule, Store};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_connection()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn: Mutex::new(conn) };
        store.init_connection()?;
        Ok(store)
    }

    fn init_connection(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!("../../migrations/001-initial/up.sql"))]);

        let mut conn = self.lock()?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA synchronous = OFF;
             PRAGMA case_sensitive_like = OFF;",
        )?;
        migrations
            .to_latest(&mut conn)
            .map_err(|e| Error::Other(format!("cache: migration failed: {e}")))?;
        debug!("cache: schema migrated to latest");
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::Other(format!("cache: poisoned mutex: {e}")))
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<Item> {
        Ok(Item {
            id: row.get(0)?,
            guid: row.get(1)?,
            title: row.get(2)?,
            author: row.get(3)?,
            link: row.get(4)?,
            feed_url: row.get(5)?,
            pub_date: row.get(6)?,
            description: row.get(7)?,
            unread: row.get::<_, i64>(8)? != 0,
            enclosure_url: row.get(9)?,
            enclosure_type: row.get(10)?,
            enqueued: row.get::<_, i64>(11)? != 0,
            flags: row.get(12)?,
            base_url: row.get(13)?,
            deleted: row.get::<_, i64>(14)? != 0,
            override_unread: false,
        })
    }

    const ITEM_COLUMNS: &'static str =
        "id, guid, title, author, url, feed_url, pub_date, content, unread, enclosure_url, enclosure_type, enqueued, flags, base_url, deleted";
}

impl Store for SqliteStore {
    fn externalize(&self, feed: &Feed, reset_unread: bool, max_items: Option<usize>) -> Result<()> {
        if feed.is_query_feed() {
            return Ok(());
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO rss_feed (rss_url, url, title, is_rtl)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(rss_url) DO UPDATE SET
                url = excluded.url, title = excluded.title, is_rtl = excluded.is_rtl",
            params![feed.rss_url, feed.link, feed.title, feed.is_rtl as i64],
        )?;

        for item in cap_items(&feed.items, max_items) {
            let existing: Option<(i64, Option<String>, String, i64)> = tx
                .query_row(
                    "SELECT unread, content, flags, enqueued FROM rss_item WHERE feed_url = ?1 AND guid = ?2",
                    params![item.feed_url, item.guid],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
                )
                .optional()?;

            let unread = match &existing {
                None => item.unread,
                Some((cached_unread, cached_content, _, _)) => {
                    if item.override_unread {
                        item.unread
                    } else if reset_unread && cached_content.as_deref() != item.description.as_deref() {
                        true
                    } else {
                        *cached_unread != 0
                    }
                }
            };
            let flags = existing.as_ref().map(|(_, _, f, _)| f.clone()).unwrap_or_default();
            let enqueued = existing.as_ref().map(|(_, _, _, e)| *e != 0).unwrap_or(false);

            tx.execute(
                "INSERT INTO rss_item (guid, title, author, url, feed_url, pub_date, content, unread, enclosure_url, enclosure_type, enqueued, flags, base_url, deleted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 0)
                 ON CONFLICT(feed_url, guid) DO UPDATE SET
                    title = excluded.title, author = excluded.author, url = excluded.url,
                    pub_date = excluded.pub_date, content = excluded.content, unread = excluded.unread,
                    enclosure_url = excluded.enclosure_url, enclosure_type = excluded.enclosure_type,
                    base_url = excluded.base_url, deleted = 0",
                params![
                    item.guid,
                    item.title,
                    item.author,
                    item.link,
                    item.feed_url,
                    item.pub_date,
                    item.description,
                    unread as i64,
                    item.enclosure_url,
                    item.enclosure_type,
                    enqueued as i64,
                    flags,
                    item.base_url,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn internalize(&self, rss_url: &str, ignores: &[IgnoreRule], max_items: Option<usize>) -> Result<Feed> {
        let conn = self.lock()?;
        let mut feed = conn
            .query_row(
                "SELECT rss_url, url, title, is_rtl, last_modified, etag
                 FROM rss_feed WHERE rss_url = ?1",
                params![rss_url],
                |row| {
                    Ok(Feed {
                        rss_url: row.get(0)?,
                        link: row.get(1)?,
                        title: row.get(2)?,
                        description: None,
                        pub_date: None,
                        language: None,
                        is_rtl: row.get::<_, i64>(3)? != 0,
                        tags: Vec::new(),
                        order: 0,
                        items: Vec::new(),
                        status: FeedStatus::Success,
                        last_modified: row.get(4)?,
                        etag: row.get(5)?,
                    })
                },
            )
            .optional()?
            .ok_or_else(|| Error::FeedNotFound(rss_url.to_string()))?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM rss_item WHERE feed_url = ?1 AND deleted = 0 ORDER BY pub_date DESC, id DESC",
            Self::ITEM_COLUMNS
        ))?;
        let items = stmt
            .query_map(params![rss_url], Self::row_to_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);

        let applicable: Vec<&IgnoreRule> = ignores
            .iter()
            .filter(|rule| glob_match(&rule.feed_url_glob, rss_url))
            .collect();

        let filtered: Vec<Item> = items
            .into_iter()
            .filter(|item| {
                for rule in &applicable {
                    match eval(&rule.expr, item) {
                        Ok(true) => return false,
                        Ok(false) => continue,
                        Err(e) => {
                            warn!("filter: ignore rule evaluation failed for {}: {e}", item.guid);
                            continue;
                        }
                    }
                }
                true
            })
            .collect();

        feed.items = cap_items(&filtered, max_items).into_iter().cloned().collect();
        Ok(feed)
    }

    fn fetch_last_modified(&self, rss_url: &str) -> Result<(Option<String>, Option<String>)> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT last_modified, etag FROM rss_feed WHERE rss_url = ?1",
                params![rss_url],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;
        Ok(row.unwrap_or((None, None)))
    }

    fn update_last_modified(&self, rss_url: &str, last_modified: Option<&str>, etag: Option<&str>) -> Result<()> {
        if last_modified.is_none() && etag.is_none() {
            return Ok(());
        }
        let conn = self.lock()?;
        conn.execute(
            "UPDATE rss_feed SET last_modified = COALESCE(?2, last_modified), etag = COALESCE(?3, etag) WHERE rss_url = ?1",
            params![rss_url, last_modified, etag],
        )?;
        Ok(())
    }

    fn mark_item_deleted(&self, feed_url: &str, guid: &str, deleted: bool) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE rss_item SET deleted = ?3 WHERE feed_url = ?1 AND guid = ?2",
            params![feed_url, guid, deleted as i64],
        )?;
        Ok(())
    }

    fn remove_old_deleted_items(&self, rss_url: &str, live_guids: &[String]) -> Result<()> {
        if live_guids.is_empty() {
            return Ok(());
        }
        let conn = self.lock()?;
        let placeholders = std::iter::repeat("?").take(live_guids.len()).collect::<Vec<_>>().join(",");
        let sql = format!(
            "DELETE FROM rss_item WHERE feed_url = ? AND deleted = 1 AND guid NOT IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut bind_params: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(live_guids.len() + 1);
        bind_params.push(&rss_url);
        for g in live_guids {
            bind_params.push(g);
        }
        stmt.execute(bind_params.as_slice())?;
        Ok(())
    }

    fn catchup_all(&self, scope: CatchupScope) -> Result<()> {
        let conn = self.lock()?;
        match scope {
            CatchupScope::All => {
                conn.execute("UPDATE rss_item SET unread = 0 WHERE deleted = 0", [])?;
            }
            CatchupScope::Feed(rss_url) => {
                conn.execute(
                    "UPDATE rss_item SET unread = 0 WHERE feed_url = ?1 AND deleted = 0",
                    params![rss_url],
                )?;
            }
        }
        Ok(())
    }

    fn update_item_unread_and_enqueued(&self, item: &Item) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE rss_item SET unread = ?3, enqueued = ?4 WHERE feed_url = ?1 AND guid = ?2",
            params![item.feed_url, item.guid, item.unread as i64, item.enqueued as i64],
        )?;
        Ok(())
    }

    fn update_item_flags(&self, item: &Item) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE rss_item SET flags = ?3 WHERE feed_url = ?1 AND guid = ?2",
            params![item.feed_url, item.guid, item.flags],
        )?;
        Ok(())
    }

    fn clean_old_articles(&self, keep_articles_days: i64) -> Result<()> {
        if keep_articles_days <= 0 {
            return Ok(());
        }
        let cutoff = chrono::Utc::now().timestamp() - keep_articles_days * 86_400;
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM rss_item WHERE pub_date IS NOT NULL AND pub_date < ?1 AND flags = ''",
            params![cutoff],
        )?;
        debug!("cache: clean_old_articles removed {deleted} rows older than {keep_articles_days} days");
        Ok(())
    }

    fn cleanup_cache(&self, live_feeds: &[String], delete_read_items: bool) -> Result<()> {
        let conn = self.lock()?;
        if !live_feeds.is_empty() {
            let placeholders = std::iter::repeat("?").take(live_feeds.len()).collect::<Vec<_>>().join(",");
            let sql = format!("DELETE FROM rss_feed WHERE rss_url NOT IN ({placeholders})");
            let mut stmt = conn.prepare(&sql)?;
            let bind_params: Vec<&dyn rusqlite::ToSql> =
                live_feeds.iter().map(|s| s as &dyn rusqlite::ToSql).collect();
            stmt.execute(bind_params.as_slice())?;
        }
        if delete_read_items {
            conn.execute("DELETE FROM rss_item WHERE unread = 0 AND flags = ''", [])?;
        }
        Ok(())
    }

    fn search(&self, query: &str, feed_url: Option<&str>) -> Result<Vec<Item>> {
        let conn = self.lock()?;
        let pattern = format!("%{query}%");
        let sql = if feed_url.is_some() {
            format!(
                "SELECT {} FROM rss_item WHERE deleted = 0 AND feed_url = ?2 AND (title LIKE ?1 OR content LIKE ?1) ORDER BY pub_date DESC, id DESC",
                Self::ITEM_COLUMNS
            )
        } else {
            format!(
                "SELECT {} FROM rss_item WHERE deleted = 0 AND (title LIKE ?1 OR content LIKE ?1) ORDER BY pub_date DESC, id DESC",
                Self::ITEM_COLUMNS
            )
        };
        let mut stmt = conn.prepare(&sql)?;
        let items = if let Some(url) = feed_url {
            stmt.query_map(params![pattern, url], Self::row_to_item)?.collect::<rusqlite::Result<Vec<_>>>()?
        } else {
            stmt.query_map(params![pattern], Self::row_to_item)?.collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(items)
    }
}

/// Truncates `items` to `max_items`, dropping the oldest non-flagged items
/// first; flagged items are kept regardless of position. `items` is assumed
/// already ordered oldest-first.
fn cap_items(items: &[Item], max_items: Option<usize>) -> Vec<&Item> {
    let Some(max) = max_items else { return items.iter().collect() };
    if max == 0 {
        return items.iter().collect();
    }
    let mut kept = 0usize;
    let mut result: Vec<&Item> = Vec::with_capacity(items.len());
    for item in items.iter().rev() {
        if !item.flags.is_empty() {
            result.push(item);
        } else if kept < max {
            kept += 1;
            result.push(item);
        }
    }
    result.reverse();
    result
}

/// Translates a simple `*`-wildcard glob (the only wildcard the url-glob
/// syntax in the urls file uses) into an anchored regex match.
fn glob_match(pattern: &str, text: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    let mut regex_str = String::from("^");
    for part in pattern.split('*') {
        regex_str.push_str(&regex_escape(part));
        regex_str.push_str(".*");
    }
    regex_str.truncate(regex_str.len() - 2);
    regex_str.push('$');
    Regex::new(&regex_str).map(|re| re.is_match(text)).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Item;

    fn sample_feed(url: &str) -> Feed {
        Feed::new(url)
    }

    #[test]
    fn externalize_then_internalize_round_trips_header_and_items() {
        let store = SqliteStore::in_memory().unwrap();
        let mut feed = sample_feed("https://example.com/feed.xml");
        feed.title = Some("Example".into());
        feed.items.push(Item::new("https://example.com/feed.xml", "g1"));
        feed.items.push(Item::new("https://example.com/feed.xml", "g2"));

        store.externalize(&feed, false, None).unwrap();
        let loaded = store.internalize("https://example.com/feed.xml", &[], None).unwrap();

        assert_eq!(loaded.title, Some("Example".into()));
        assert_eq!(loaded.items.len(), 2);
    }

    #[test]
    fn query_feeds_are_never_persisted() {
        let store = SqliteStore::in_memory().unwrap();
        let feed = sample_feed("query:unread:unread = \"yes\"");
        store.externalize(&feed, false, None).unwrap();
        let err = store.internalize("query:unread:unread = \"yes\"", &[], None).unwrap_err();
        assert!(matches!(err, Error::FeedNotFound(_)));
    }

    #[test]
    fn cached_unread_state_survives_reparse_without_override() {
        let store = SqliteStore::in_memory().unwrap();
        let mut feed = sample_feed("https://example.com/feed.xml");
        let mut item = Item::new("https://example.com/feed.xml", "g1");
        item.unread = true;
        feed.items.push(item);
        store.externalize(&feed, false, None).unwrap();

        store.catchup_all(CatchupScope::Feed("https://example.com/feed.xml".into())).unwrap();

        // Reparse without override_unread: cached (now read) state should win.
        let mut feed2 = sample_feed("https://example.com/feed.xml");
        let mut item2 = Item::new("https://example.com/feed.xml", "g1");
        item2.unread = true;
        feed2.items.push(item2);
        store.externalize(&feed2, false, None).unwrap();

        let loaded = store.internalize("https://example.com/feed.xml", &[], None).unwrap();
        assert!(!loaded.items[0].unread);
    }

    #[test]
    fn override_unread_wins_over_cached_state() {
        let store = SqliteStore::in_memory().unwrap();
        let mut feed = sample_feed("https://example.com/feed.xml");
        feed.items.push(Item::new("https://example.com/feed.xml", "g1"));
        store.externalize(&feed, false, None).unwrap();
        store.catchup_all(CatchupScope::All).unwrap();

        let mut feed2 = sample_feed("https://example.com/feed.xml");
        let mut item2 = Item::new("https://example.com/feed.xml", "g1");
        item2.unread = true;
        item2.override_unread = true;
        feed2.items.push(item2);
        store.externalize(&feed2, false, None).unwrap();

        let loaded = store.internalize("https://example.com/feed.xml", &[], None).unwrap();
        assert!(loaded.items[0].unread);
    }

    #[test]
    fn max_items_cap_exempts_flagged_items() {
        let store = SqliteStore::in_memory().unwrap();
        let mut feed = sample_feed("https://example.com/feed.xml");
        for i in 0..5 {
            let mut item = Item::new("https://example.com/feed.xml", format!("g{i}"));
            if i == 0 {
                item.set_flag('f');
            }
            feed.items.push(item);
        }
        store.externalize(&feed, false, Some(2)).unwrap();
        let loaded = store.internalize("https://example.com/feed.xml", &[], None).unwrap();
        // 2 newest (g3, g4) plus the flagged g0 survive the cap.
        assert_eq!(loaded.items.len(), 3);
        assert!(loaded.items.iter().any(|i| i.guid == "g0"));
    }

    #[test]
    fn mark_deleted_hides_item_from_internalize() {
        let store = SqliteStore::in_memory().unwrap();
        let mut feed = sample_feed("https://example.com/feed.xml");
        feed.items.push(Item::new("https://example.com/feed.xml", "g1"));
        store.externalize(&feed, false, None).unwrap();

        store.mark_item_deleted("https://example.com/feed.xml", "g1", true).unwrap();
        let loaded = store.internalize("https://example.com/feed.xml", &[], None).unwrap();
        assert!(loaded.items.is_empty());
    }

    #[test]
    fn remove_old_deleted_items_is_noop_on_empty_live_set() {
        let store = SqliteStore::in_memory().unwrap();
        let mut feed = sample_feed("https://example.com/feed.xml");
        feed.items.push(Item::new("https://example.com/feed.xml", "g1"));
        store.externalize(&feed, false, None).unwrap();
        store.mark_item_deleted("https://example.com/feed.xml", "g1", true).unwrap();

        store.remove_old_deleted_items("https://example.com/feed.xml", &[]).unwrap();

        // Still present (tombstoned) because live_guids was empty.
        let conn = store.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM rss_item WHERE guid = 'g1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn search_matches_title_and_content_case_insensitively() {
        let store = SqliteStore::in_memory().unwrap();
        let mut feed = sample_feed("https://example.com/feed.xml");
        let mut item = Item::new("https://example.com/feed.xml", "g1");
        item.title = Some("Rust News Today".into());
        feed.items.push(item);
        store.externalize(&feed, false, None).unwrap();

        let results = store.search("rust", None).unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn glob_match_supports_wildcard() {
        assert!(glob_match("https://example.com/*", "https://example.com/feed.xml"));
        assert!(!glob_match("https://other.com/*", "https://example.com/feed.xml"));
        assert!(glob_match("*", "anything"));
    }

    #[test]
    fn clean_old_articles_is_noop_when_disabled() {
        let store = SqliteStore::in_memory().unwrap();
        let mut feed = sample_feed("https://example.com/feed.xml");
        let mut item = Item::new("https://example.com/feed.xml", "g1");
        item.pub_date = Some(0);
        feed.items.push(item);
        store.externalize(&feed, false, None).unwrap();

        store.clean_old_articles(0).unwrap();
        let loaded = store.internalize("https://example.com/feed.xml", &[], None).unwrap();
        assert_eq!(loaded.items.len(), 1);
    }
}
