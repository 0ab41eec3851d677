use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::filter::Record;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub guid: String,
    pub title: Option<String>,
    pub author: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub pub_date: Option<i64>,
    pub base_url: Option<String>,
    pub enclosure_url: Option<String>,
    pub enclosure_type: Option<String>,
    pub unread: bool,
    pub enqueued: bool,
    pub flags: String,
    pub feed_url: String,
    pub deleted: bool,
    #[serde(skip)]
    pub override_unread: bool,
}

impl Item {
    pub fn new(feed_url: impl Into<String>, guid: impl Into<String>) -> Self {
        Self {
            id: 0,
            guid: guid.into(),
            title: None,
            author: None,
            link: None,
            description: None,
            pub_date: None,
            base_url: None,
            enclosure_url: None,
            enclosure_type: None,
            unread: true,
            enqueued: false,
            flags: String::new(),
            feed_url: feed_url.into(),
            deleted: false,
            override_unread: false,
        }
    }

    /// Stable id synthesized for items whose dialect parser produced an
    /// empty guid, so repeated reloads of the same content at the same
    /// position in the feed keep deduplicating to the same item.
    pub fn synthesize_guid(feed_url: &str, position: usize, title: Option<&str>, link: Option<&str>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(feed_url.as_bytes());
        hasher.update(position.to_le_bytes());
        hasher.update(title.unwrap_or("").as_bytes());
        hasher.update(link.unwrap_or("").as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("(no title)")
    }

    pub fn has_enclosure(&self) -> bool {
        self.enclosure_url.is_some()
    }

    pub fn has_flag(&self, flag: char) -> bool {
        self.flags.contains(flag)
    }

    /// Sets a flag, keeping `flags` sorted and deduplicated per the
    /// `rss_item.flags` invariant.
    pub fn set_flag(&mut self, flag: char) {
        if !flag.is_ascii_alphabetic() {
            return;
        }
        if self.has_flag(flag) {
            return;
        }
        self.flags.push(flag);
        self.flags = sort_flags(&self.flags);
    }

    pub fn unset_flag(&mut self, flag: char) {
        self.flags = self.flags.chars().filter(|&c| c != flag).collect();
    }

    pub fn set_flags(&mut self, flags: &str) {
        self.flags = sort_flags(flags);
    }
}

impl Record for Item {
    fn has_attribute(&self, name: &str) -> bool {
        matches!(
            name,
            "title" | "author" | "link" | "guid" | "description" | "unread" | "flags" | "enclosure_url"
                | "enclosure_type" | "feed_url" | "base_url" | "pub_date" | "age"
        )
    }

    fn get_attribute(&self, name: &str) -> String {
        match name {
            "title" => self.title.clone().unwrap_or_default(),
            "author" => self.author.clone().unwrap_or_default(),
            "link" => self.link.clone().unwrap_or_default(),
            "guid" => self.guid.clone(),
            "description" => self.description.clone().unwrap_or_default(),
            "unread" => if self.unread { "yes".into() } else { "no".into() },
            "flags" => self.flags.clone(),
            "enclosure_url" => self.enclosure_url.clone().unwrap_or_default(),
            "enclosure_type" => self.enclosure_type.clone().unwrap_or_default(),
            "feed_url" => self.feed_url.clone(),
            "base_url" => self.base_url.clone().unwrap_or_default(),
            "pub_date" => self.pub_date.map(|d| d.to_string()).unwrap_or_default(),
            "age" => self
                .pub_date
                .map(|d| ((chrono::Utc::now().timestamp() - d) / 86_400).to_string())
                .unwrap_or_default(),
            _ => String::new(),
        }
    }
}

/// Sorts and deduplicates a flag string, dropping any non-alphabetic bytes.
pub fn sort_flags(flags: &str) -> String {
    let mut chars: Vec<char> = flags.chars().filter(|c| c.is_ascii_alphabetic()).collect();
    chars.sort_unstable();
    chars.dedup();
    chars.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesize_guid_is_deterministic() {
        let a = Item::synthesize_guid("https://example.com/feed.xml", 0, Some("t"), Some("l"));
        let b = Item::synthesize_guid("https://example.com/feed.xml", 0, Some("t"), Some("l"));
        assert_eq!(a, b);
    }

    #[test]
    fn synthesize_guid_differs_by_position() {
        let a = Item::synthesize_guid("https://example.com/feed.xml", 0, Some("t"), Some("l"));
        let b = Item::synthesize_guid("https://example.com/feed.xml", 1, Some("t"), Some("l"));
        assert_ne!(a, b);
    }

    #[test]
    fn set_flag_keeps_sorted_and_deduped() {
        let mut item = Item::new("https://example.com/feed.xml", "g1");
        item.set_flag('z');
        item.set_flag('a');
        item.set_flag('z');
        assert_eq!(item.flags, "az");
    }

    #[test]
    fn set_flag_rejects_non_alphabetic() {
        let mut item = Item::new("https://example.com/feed.xml", "g1");
        item.set_flag('1');
        assert_eq!(item.flags, "");
    }

    #[test]
    fn unset_flag_removes_single_char() {
        let mut item = Item::new("https://example.com/feed.xml", "g1");
        item.set_flags("abz");
        item.unset_flag('b');
        assert_eq!(item.flags, "az");
    }

    #[test]
    fn sort_flags_dedups_and_sorts() {
        assert_eq!(sort_flags("zazb1"), "abz");
    }

    #[test]
    fn display_title_defaults_when_missing() {
        let item = Item::new("https://example.com/feed.xml", "g1");
        assert_eq!(item.display_title(), "(no title)");
    }

    #[test]
    fn record_exposes_unread_as_yes_no() {
        let mut item = Item::new("https://example.com/feed.xml", "g1");
        item.unread = true;
        assert_eq!(Record::get_attribute(&item, "unread"), "yes");
        item.unread = false;
        assert_eq!(Record::get_attribute(&item, "unread"), "no");
    }

    #[test]
    fn record_reports_missing_attribute_as_unavailable() {
        let item = Item::new("https://example.com/feed.xml", "g1");
        assert!(!Record::has_attribute(&item, "nonsense"));
    }
}
