use std::collections::HashMap;

use serde::Deserialize;
use tracing::warn;

use crate::app::Result;
use crate::urlsource::{UrlSet, UrlSource};

/// Reads one or more OPML documents (space-separated paths) and walks
/// `<outline>` elements recursively. A leaf outline's `text`/`title`
/// becomes a tag; the chain of ancestor group titles becomes a "/"-joined
/// hierarchical tag path, with the immediate parent's label used as the
/// feed's first tag. Read-only: `write()` is the trait's no-op default.
pub struct OpmlUrlSource {
    paths: Vec<String>,
}

impl OpmlUrlSource {
    pub fn new(source: &str) -> Self {
        Self { paths: source.split_whitespace().map(String::from).collect() }
    }
}

impl UrlSource for OpmlUrlSource {
    fn load(&mut self) -> Result<UrlSet> {
        let mut urls = Vec::new();
        let mut tags_by_url = HashMap::new();

        for path in &self.paths {
            let contents = match std::fs::read_to_string(path) {
                Ok(contents) => contents,
                Err(e) => {
                    warn!("urlsource: skipping OPML source {path}: {e}");
                    continue;
                }
            };
            let document: Opml = match quick_xml::de::from_str(&contents) {
                Ok(document) => document,
                Err(e) => {
                    warn!("urlsource: skipping malformed OPML source {path}: {e}");
                    continue;
                }
            };

            for outline in &document.body.outline {
                walk(outline, &[], &mut urls, &mut tags_by_url);
            }
        }

        Ok(UrlSet { urls, tags_by_url })
    }
}

fn walk(outline: &Outline, ancestors: &[String], urls: &mut Vec<String>, tags_by_url: &mut HashMap<String, Vec<String>>) {
    let label = outline.text.clone().or_else(|| outline.title.clone());

    if let Some(raw_url) = outline.xml_url.clone().or_else(|| outline.url.clone()) {
        let url = rewrite_url(&raw_url, outline.filtercmd.as_deref());
        let mut tags: Vec<String> = ancestors.to_vec();
        if let Some(label) = &label {
            tags.push(label.clone());
        }
        urls.push(url.clone());
        if !tags.is_empty() {
            tags_by_url.insert(url, tags);
        }
        return;
    }

    let mut child_ancestors = ancestors.to_vec();
    if let Some(label) = label {
        child_ancestors.push(label);
    }
    for child in &outline.outline {
        walk(child, &child_ancestors, urls, tags_by_url);
    }
}

fn rewrite_url(raw_url: &str, filtercmd: Option<&str>) -> String {
    if let Some(cmd) = filtercmd {
        return format!("filter:{cmd}:{raw_url}");
    }
    if let Some(cmd) = raw_url.strip_prefix('|') {
        return format!("exec:{cmd}");
    }
    raw_url.to_string()
}

#[derive(Debug, Deserialize, Default)]
struct Opml {
    body: Body,
}

#[derive(Debug, Deserialize, Default)]
struct Body {
    #[serde(default, rename = "outline")]
    outline: Vec<Outline>,
}

#[derive(Debug, Deserialize, Default)]
struct Outline {
    #[serde(rename = "@text")]
    text: Option<String>,
    #[serde(rename = "@title")]
    title: Option<String>,
    #[serde(rename = "@xmlUrl")]
    xml_url: Option<String>,
    #[serde(rename = "@url")]
    url: Option<String>,
    #[serde(rename = "@filtercmd")]
    filtercmd: Option<String>,
    #[serde(default, rename = "outline")]
    outline: Vec<Outline>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const FLAT_OPML: &str = r#"<?xml version="1.0"?>
<opml version="2.0">
  <head><title>Subscriptions</title></head>
  <body>
    <outline text="News" xmlUrl="https://news.example/feed"/>
  </body>
</opml>"#;

    const NESTED_OPML: &str = r#"<?xml version="1.0"?>
<opml version="2.0">
  <head><title>Subscriptions</title></head>
  <body>
    <outline text="Tech">
      <outline text="Rust Blog" xmlUrl="https://blog.rust-lang.org/feed.xml"/>
    </outline>
  </body>
</opml>"#;

    const FILTERCMD_OPML: &str = r#"<?xml version="1.0"?>
<opml version="2.0">
  <body>
    <outline text="Filtered" xmlUrl="https://example.com/feed" filtercmd="sanitize.sh"/>
  </body>
</opml>"#;

    fn write_opml(contents: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subs.opml");
        std::fs::write(&path, contents).unwrap();
        let path_str = path.to_string_lossy().to_string();
        (dir, path_str)
    }

    #[test]
    fn loads_flat_outline() {
        let (_dir, path) = write_opml(FLAT_OPML);
        let mut source = OpmlUrlSource::new(&path);
        let urls = source.load().unwrap();
        assert_eq!(urls.urls, vec!["https://news.example/feed"]);
        assert_eq!(urls.tags_for("https://news.example/feed"), &["News"]);
    }

    #[test]
    fn builds_hierarchical_tag_path_from_nesting() {
        let (_dir, path) = write_opml(NESTED_OPML);
        let mut source = OpmlUrlSource::new(&path);
        let urls = source.load().unwrap();
        assert_eq!(urls.urls, vec!["https://blog.rust-lang.org/feed.xml"]);
        assert_eq!(urls.tags_for("https://blog.rust-lang.org/feed.xml"), &["Tech", "Rust Blog"]);
    }

    #[test]
    fn filtercmd_attribute_rewrites_url() {
        let (_dir, path) = write_opml(FILTERCMD_OPML);
        let mut source = OpmlUrlSource::new(&path);
        let urls = source.load().unwrap();
        assert_eq!(urls.urls, vec!["filter:sanitize.sh:https://example.com/feed"]);
    }

    #[test]
    fn missing_source_is_skipped_not_fatal() {
        let mut source = OpmlUrlSource::new("/nonexistent/subs.opml");
        let urls = source.load().unwrap();
        assert!(urls.urls.is_empty());
    }
}
