pub mod credentials;
pub mod greader;
pub mod miniflux;

pub use credentials::Credentials;
pub use greader::GReaderCloneApi;
pub use miniflux::MinifluxApi;

use async_trait::async_trait;

use crate::app::{Error, Result};

/// A subscription as reported by a remote aggregator: its feed url in the
/// aggregator's own identifier scheme, display title, and tags/folders.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub rss_url: String,
    pub title: Option<String>,
    pub tags: Vec<String>,
}

/// Abstract interface to an external aggregator backend. Capabilities are
/// polymorphic: a backend that cannot serve standard feed XML overrides
/// `fetch_feed`; one with no read/flag sync leaves those as no-ops.
#[async_trait]
pub trait RemoteApi {
    async fn authenticate(&self) -> Result<()>;

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>>;

    async fn mark_all_read(&self, rss_url: &str) -> Result<()>;

    async fn mark_article_read(&self, rss_url: &str, guid: &str, read: bool) -> Result<()>;

    async fn update_article_flags(&self, rss_url: &str, guid: &str, flags: &str) -> Result<()>;

    /// Fetches a feed's content for backends whose feeds are not served as
    /// ordinary, independently-fetchable XML/JSON documents. Default
    /// implementation reports the capability as unsupported.
    async fn fetch_feed(&self, rss_url: &str) -> Result<Vec<u8>> {
        Err(Error::Other(format!("remote: backend does not support fetch_feed for {rss_url}")))
    }
}
