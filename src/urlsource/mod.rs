pub mod file;
pub mod opml;
pub mod remote_source;

pub use file::FileUrlSource;
pub use opml::OpmlUrlSource;
pub use remote_source::RemoteUrlSource;

use std::collections::{BTreeSet, HashMap};

use crate::app::Result;

/// The urls and tags a provider produced. `tags_by_url` preserves provider
/// order; the first tag of each entry doubles as the feed's display group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlSet {
    pub urls: Vec<String>,
    pub tags_by_url: HashMap<String, Vec<String>>,
}

impl UrlSet {
    pub fn tags_for(&self, url: &str) -> &[String] {
        self.tags_by_url.get(url).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn all_tags(&self) -> BTreeSet<String> {
        self.tags_by_url.values().flatten().cloned().collect()
    }
}

/// Where feed urls come from. At most one provider is active per process,
/// chosen by configuration. `write()` only has an effect for the file
/// provider; OPML and remote providers are read-only.
pub trait UrlSource {
    fn load(&mut self) -> Result<UrlSet>;

    fn write(&self, _urls: &UrlSet) -> Result<()> {
        Ok(())
    }
}
