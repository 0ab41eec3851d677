use std::collections::HashMap;
use std::path::PathBuf;

use crate::app::{Error, Result};
use crate::urlsource::{UrlSet, UrlSource};

/// One url per line; `#`-prefixed lines are comments; whitespace-separated
/// tokens after the url are tags. A token containing whitespace must be
/// double-quoted, with `\"`, `\\`, and control-letter escapes (`\n`, `\t`)
/// recognized inside the quotes.
pub struct FileUrlSource {
    path: PathBuf,
}

impl FileUrlSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl UrlSource for FileUrlSource {
    fn load(&mut self) -> Result<UrlSet> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(UrlSet::default()),
            Err(e) => return Err(e.into()),
        };

        let mut urls = Vec::new();
        let mut tags_by_url = HashMap::new();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let tokens = tokenize(line)?;
            let Some((url, tags)) = tokens.split_first() else { continue };
            urls.push(url.clone());
            if !tags.is_empty() {
                tags_by_url.insert(url.clone(), tags.to_vec());
            }
        }

        Ok(UrlSet { urls, tags_by_url })
    }

    fn write(&self, urls: &UrlSet) -> Result<()> {
        let mut out = String::new();
        for url in &urls.urls {
            out.push_str(url);
            for tag in urls.tags_for(url) {
                out.push(' ');
                out.push_str(&quote_if_needed(tag));
            }
            out.push('\n');
        }
        std::fs::write(&self.path, out)?;
        Ok(())
    }
}

fn quote_if_needed(token: &str) -> String {
    if !token.chars().any(char::is_whitespace) {
        return token.to_string();
    }
    let mut quoted = String::from("\"");
    for c in token.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

fn tokenize(line: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    while chars.peek().is_some() {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut token = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some('\\') => match chars.next() {
                        Some('"') => token.push('"'),
                        Some('\\') => token.push('\\'),
                        Some('n') => token.push('\n'),
                        Some('t') => token.push('\t'),
                        Some(other) => token.push(other),
                        None => return Err(Error::Config("unterminated escape in url file".into())),
                    },
                    Some(c) => token.push(c),
                    None => return Err(Error::Config("unterminated quoted token in url file".into())),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
        }
        tokens.push(token);
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_urls_with_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls");
        std::fs::write(&path, "https://a.example/feed tech news\n# a comment\nhttps://b.example/feed\n").unwrap();

        let mut source = FileUrlSource::new(&path);
        let urls = source.load().unwrap();

        assert_eq!(urls.urls, vec!["https://a.example/feed", "https://b.example/feed"]);
        assert_eq!(urls.tags_for("https://a.example/feed"), &["tech", "news"]);
        assert!(urls.tags_for("https://b.example/feed").is_empty());
    }

    #[test]
    fn quoted_tag_with_space_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls");
        std::fs::write(&path, "https://a.example/feed \"my tag\"\n").unwrap();

        let mut source = FileUrlSource::new(&path);
        let urls = source.load().unwrap();
        assert_eq!(urls.tags_for("https://a.example/feed"), &["my tag"]);
    }

    #[test]
    fn missing_file_yields_empty_set() {
        let mut source = FileUrlSource::new("/nonexistent/path/urls");
        let urls = source.load().unwrap();
        assert!(urls.urls.is_empty());
    }

    #[test]
    fn write_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("urls");

        let mut set = UrlSet::default();
        set.urls.push("https://a.example/feed".into());
        set.tags_by_url.insert("https://a.example/feed".into(), vec!["needs quoting here".into()]);

        let source = FileUrlSource::new(&path);
        source.write(&set).unwrap();

        let mut reload = FileUrlSource::new(&path);
        let reloaded = reload.load().unwrap();
        assert_eq!(reloaded.tags_for("https://a.example/feed"), &["needs quoting here"]);
    }
}
