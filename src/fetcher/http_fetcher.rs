use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH};
use reqwest::{Client, Proxy, StatusCode};
use tracing::{debug, warn};

use crate::app::{Error, Result};
use crate::fetcher::{FetchResult, Fetcher};

#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub proxy_url: Option<String>,
    pub download_retries: u32,
    pub max_redirects: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("tributary/{}", env!("CARGO_PKG_VERSION")),
            proxy_url: None,
            download_retries: 0,
            max_redirects: 10,
        }
    }
}

pub struct HttpFetcher {
    client: Client,
    config: TransportConfig,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::with_config(TransportConfig::default())
    }

    pub fn with_config(config: TransportConfig) -> Self {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .user_agent(config.user_agent.clone());

        if let Some(proxy_url) = &config.proxy_url {
            match Proxy::all(proxy_url) {
                Ok(proxy) => builder = builder.proxy(proxy),
                Err(e) => warn!("fetch: invalid proxy url {proxy_url}: {e}"),
            }
        }

        let client = builder.build().expect("fetch: failed to build HTTP client");
        Self { client, config }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, etag: Option<&str>, last_modified: Option<&str>) -> Result<FetchResult> {
        let mut headers = HeaderMap::new();
        if let Some(etag) = etag {
            if let Ok(value) = HeaderValue::from_str(etag) {
                headers.insert(IF_NONE_MATCH, value);
            }
        }
        if let Some(last_modified) = last_modified {
            if let Ok(value) = HeaderValue::from_str(last_modified) {
                headers.insert(IF_MODIFIED_SINCE, value);
            }
        }

        let mut attempt = 0;
        loop {
            match self.try_fetch(url, &headers).await {
                Ok(result) => return Ok(result),
                Err(e) if attempt < self.config.download_retries => {
                    attempt += 1;
                    warn!("fetch: retry {attempt}/{} for {url}: {e}", self.config.download_retries);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl HttpFetcher {
    async fn try_fetch(&self, url: &str, headers: &HeaderMap) -> Result<FetchResult> {
        let response = self.client.get(url).headers(headers.clone()).send().await?;

        if response.status() == StatusCode::NOT_MODIFIED {
            debug!("fetch: {url} not modified");
            return Ok(FetchResult::NotModified);
        }

        let response = response.error_for_status().map_err(Error::Transport)?;

        let etag = response.headers().get("etag").and_then(|v| v.to_str().ok()).map(String::from);
        let last_modified =
            response.headers().get("last-modified").and_then(|v| v.to_str().ok()).map(String::from);

        let body = response.bytes().await?.to_vec();

        Ok(FetchResult::Content { body, etag, last_modified })
    }
}
