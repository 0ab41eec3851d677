use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{Error, Result};
use crate::config::{Config, RemoteBackend};
use crate::container::FeedContainer;
use crate::controller::Controller;
use crate::fetcher::Acquirer;
use crate::normalizer::Normalizer;
use crate::remote::{GReaderCloneApi, MinifluxApi, RemoteApi};
use crate::store::sqlite::SqliteStore;
use crate::store::IgnoreRule;
use crate::urlsource::{FileUrlSource, OpmlUrlSource, RemoteUrlSource, UrlSet, UrlSource};

/// Wires together the library's components for a single process run:
/// cache, url source, acquisition, and the controller that orchestrates
/// them. Built once at startup from a loaded [`Config`].
pub struct AppContext {
    pub store: Arc<SqliteStore>,
    pub container: Arc<FeedContainer>,
    pub controller: Controller<SqliteStore>,
    pub remote: Option<Arc<dyn RemoteApi + Send + Sync>>,
    pub config: Config,
}

impl AppContext {
    pub fn new(db_path: Option<PathBuf>, config: Config) -> Result<Self> {
        let db_path = match db_path {
            Some(p) => p,
            None => Self::default_db_path()?,
        };
        let store = Arc::new(SqliteStore::new(&db_path)?);
        Self::build(store, config)
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Self::build(store, config)
    }

    fn build(store: Arc<SqliteStore>, config: Config) -> Result<Self> {
        let remote = Self::build_remote(&config)?;

        let http = crate::fetcher::http_fetcher::HttpFetcher::with_config(config.transport.to_fetcher_config());
        let acquirer = match &remote {
            Some(r) => Acquirer::with_remote(http, r.clone()),
            None => Acquirer::new(http),
        };

        let url_set = Self::load_urls(&config, remote.clone())?;
        let container = Arc::new(FeedContainer::new());
        for (index, url) in url_set.urls.iter().enumerate() {
            let mut feed = store.internalize(url, &[], non_zero(config.cache.max_items)).unwrap_or_else(|_| crate::domain::Feed::new(url));
            feed.tags = url_set.tags_for(url).to_vec();
            feed.order = index as i64;
            container.add(feed);
        }

        let normalizer = Normalizer::new();
        let controller = Controller::new(store.clone(), container.clone(), acquirer, normalizer, remote.clone(), Vec::<IgnoreRule>::new())?;

        Ok(Self { store, container, controller, remote, config })
    }

    fn build_remote(config: &Config) -> Result<Option<Arc<dyn RemoteApi + Send + Sync>>> {
        let credentials = config.remote.credentials();
        let base_url = config.remote.base_url.clone().unwrap_or_default();
        let client = reqwest::Client::builder().timeout(config.transport.to_fetcher_config().timeout).build()?;

        let remote: Option<Arc<dyn RemoteApi + Send + Sync>> = match config.remote.backend {
            RemoteBackend::None => None,
            RemoteBackend::Miniflux => Some(Arc::new(MinifluxApi::new(client, base_url, credentials))),
            RemoteBackend::Greader => Some(Arc::new(GReaderCloneApi::new(client, base_url, credentials))),
        };
        Ok(remote)
    }

    fn load_urls(config: &Config, remote: Option<Arc<dyn RemoteApi + Send + Sync>>) -> Result<UrlSet> {
        if let Some(path) = &config.urls_file {
            return FileUrlSource::new(path).load();
        }
        if let Some(opml) = &config.opml_sources {
            return OpmlUrlSource::new(opml).load();
        }
        if let Some(remote) = remote {
            return RemoteUrlSource::new(remote, config.remote.include_special_feeds).load();
        }
        Ok(UrlSet::default())
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().ok_or_else(|| Error::Config("Could not find data directory".into()))?;
        let app_dir = data_dir.join("tributary");
        std::fs::create_dir_all(&app_dir)?;
        Ok(app_dir.join("tributary.db"))
    }
}

fn non_zero(n: usize) -> Option<usize> {
    if n == 0 {
        None
    } else {
        Some(n)
    }
}

