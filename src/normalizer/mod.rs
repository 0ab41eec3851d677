use feed_rs::parser;
use html_escape::decode_html_entities;
use tracing::warn;

use crate::app::{Error, Result};
use crate::domain::{Feed, Item};
use crate::filter::eval;
use crate::store::IgnoreRule;

const RTL_LANGUAGE_PREFIXES: &[&str] = &["ar", "fa", "ur", "ps", "syr", "dv", "he", "yi"];

/// Turns raw acquired bytes into a neutral `Feed`. `feed-rs` handles dialect
/// detection and the bulk of RSS 0.9x/1.0/2.0 and Atom 0.3/1.0 parsing,
/// including Dublin Core and Media RSS extensions; this module covers what
/// feed-rs leaves to the caller: guid derivation order, ignore-rule
/// filtering, and right-to-left inference.
#[derive(Clone, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, feed_url: &str, body: &[u8], ignores: &[IgnoreRule]) -> Result<Feed> {
        let parsed = parser::parse(body).map_err(|e| Error::Parse(e.to_string()))?;

        let mut feed = Feed::new(feed_url);
        feed.title = parsed.title.map(|t| decode_html_entities(&t.content).to_string());
        feed.description = parsed.description.map(|d| decode_html_entities(&d.content).to_string());
        feed.link = parsed.links.first().map(|l| l.href.clone());
        feed.language = parsed.language.clone();
        feed.is_rtl = parsed.language.as_deref().map(is_rtl_language).unwrap_or(false);
        feed.pub_date = parsed.published.or(parsed.updated).map(|dt| dt.timestamp());

        let applicable: Vec<&IgnoreRule> =
            ignores.iter().filter(|rule| glob_match_feed(&rule.feed_url_glob, feed_url)).collect();

        let mut items = Vec::with_capacity(parsed.entries.len());
        for (position, entry) in parsed.entries.into_iter().enumerate() {
            let link = entry.links.first().map(|l| l.href.clone());
            let title = entry.title.as_ref().map(|t| decode_html_entities(&t.content).to_string());
            let pub_date = entry.published.or(entry.updated).map(|dt| dt.timestamp());

            let guid = derive_guid(&entry.id, link.as_deref(), pub_date, title.as_deref());
            let guid = if guid.is_empty() {
                Item::synthesize_guid(feed_url, position, title.as_deref(), link.as_deref())
            } else {
                guid
            };

            let mut item = Item::new(feed_url, guid);
            item.title = title;
            item.link = link;
            item.description = entry
                .content
                .and_then(|c| c.body)
                .or_else(|| entry.summary.map(|s| s.content))
                .map(|b| decode_html_entities(&b).to_string());
            item.author = entry.authors.first().map(|a| a.name.clone());
            item.pub_date = pub_date;
            // feed-rs resolves relative URLs against xml:base internally, so
            // links are already absolute; base_url just records provenance.
            item.base_url = Some(feed_url.to_string());

            if let Some(media) = entry.media.first().and_then(|m| m.content.first()) {
                item.enclosure_url = media.url.as_ref().map(|u| u.to_string());
                item.enclosure_type = media.content_type.as_ref().map(|m| m.to_string());
            }

            let dropped = applicable.iter().any(|rule| match eval(&rule.expr, &item) {
                Ok(matched) => matched,
                Err(e) => {
                    warn!("fetch: ignore rule evaluation failed for {}: {e}", item.guid);
                    false
                }
            });
            if !dropped {
                items.push(item);
            }
        }

        feed.items = items;
        Ok(feed)
    }
}

/// First non-empty of: native id, link+pubDate, link, title. An empty
/// result here is resolved by the caller via `Item::synthesize_guid`.
fn derive_guid(native_id: &str, link: Option<&str>, pub_date: Option<i64>, title: Option<&str>) -> String {
    if !native_id.is_empty() {
        return native_id.to_string();
    }
    if let (Some(link), Some(pub_date)) = (link, pub_date) {
        return format!("{link}{pub_date}");
    }
    if let Some(link) = link {
        return link.to_string();
    }
    title.unwrap_or_default().to_string()
}

fn is_rtl_language(lang: &str) -> bool {
    RTL_LANGUAGE_PREFIXES.iter().any(|prefix| lang.eq_ignore_ascii_case(prefix) || lang.to_ascii_lowercase().starts_with(&format!("{prefix}-")))
}

fn glob_match_feed(pattern: &str, url: &str) -> bool {
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
    use crate::filter::parse as parse_filter;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test Feed</title>
    <description>A test feed</description>
    <language>en-us</language>
    <item>
      <title>Test Item 1</title>
      <link>https://example.com/item1</link>
      <guid>item-1</guid>
      <pubDate>Mon, 01 Jan 2024 00:00:00 GMT</pubDate>
      <description>This is item 1</description>
    </item>
    <item>
      <title>Test Item 2</title>
      <link>https://example.com/item2</link>
      <description>This is item 2</description>
    </item>
  </channel>
</rss>"#;

    const ATOM_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom Test Feed</title>
  <subtitle>An Atom test feed</subtitle>
  <entry>
    <title>Atom Entry 1</title>
    <link href="https://example.com/atom1"/>
    <id>atom-entry-1</id>
    <updated>2024-01-01T00:00:00Z</updated>
    <summary>This is Atom entry 1</summary>
  </entry>
</feed>"#;

    const RTL_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Arabic Feed</title>
    <language>ar</language>
  </channel>
</rss>"#;

    #[test]
    fn parses_rss_feed_and_items() {
        let normalizer = Normalizer::new();
        let feed = normalizer.normalize("https://example.com/feed.xml", RSS_SAMPLE.as_bytes(), &[]).unwrap();

        assert_eq!(feed.title, Some("Test Feed".into()));
        assert_eq!(feed.items.len(), 2);
        assert_eq!(feed.items[0].title, Some("Test Item 1".into()));
        assert_eq!(feed.items[0].guid, "item-1");
    }

    #[test]
    fn parses_atom_feed_and_items() {
        let normalizer = Normalizer::new();
        let feed = normalizer.normalize("https://example.com/feed.atom", ATOM_SAMPLE.as_bytes(), &[]).unwrap();

        assert_eq!(feed.title, Some("Atom Test Feed".into()));
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].guid, "atom-entry-1");
    }

    #[test]
    fn falls_back_to_link_when_guid_missing() {
        let normalizer = Normalizer::new();
        let feed = normalizer.normalize("https://example.com/feed.xml", RSS_SAMPLE.as_bytes(), &[]).unwrap();
        // Second item has no <guid>, no pubDate: falls back to link.
        assert_eq!(feed.items[1].guid, "https://example.com/item2");
    }

    #[test]
    fn item_ids_are_deterministic_across_reparse() {
        let normalizer = Normalizer::new();
        let feed1 = normalizer.normalize("https://example.com/feed.xml", RSS_SAMPLE.as_bytes(), &[]).unwrap();
        let feed2 = normalizer.normalize("https://example.com/feed.xml", RSS_SAMPLE.as_bytes(), &[]).unwrap();
        assert_eq!(feed1.items[0].guid, feed2.items[0].guid);
    }

    #[test]
    fn infers_rtl_from_language_prefix() {
        let normalizer = Normalizer::new();
        let feed = normalizer.normalize("https://example.com/feed.xml", RTL_SAMPLE.as_bytes(), &[]).unwrap();
        assert!(feed.is_rtl);
    }

    #[test]
    fn ignore_rule_drops_matching_items() {
        let normalizer = Normalizer::new();
        let expr = parse_filter(r#"title = "Test Item 1""#).unwrap();
        let rule = IgnoreRule { feed_url_glob: "*".into(), expr };
        let feed = normalizer
            .normalize("https://example.com/feed.xml", RSS_SAMPLE.as_bytes(), std::slice::from_ref(&rule))
            .unwrap();
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].title, Some("Test Item 2".into()));
    }
}
