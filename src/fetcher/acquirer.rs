use std::process::Stdio;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::app::{Error, Result};
use crate::fetcher::http_fetcher::HttpFetcher;
use crate::fetcher::{FetchResult, Fetcher};
use crate::remote::RemoteApi;

/// Scheme dispatch for feed acquisition. `http(s)://` goes through the
/// retrying/redirecting `HttpFetcher`; the rest are resolved locally or
/// handed to a configured remote backend.
pub struct Acquirer {
    http: HttpFetcher,
    remote: Option<Arc<dyn RemoteApi + Send + Sync>>,
}

impl Acquirer {
    pub fn new(http: HttpFetcher) -> Self {
        Self { http, remote: None }
    }

    pub fn with_remote(http: HttpFetcher, remote: Arc<dyn RemoteApi + Send + Sync>) -> Self {
        Self { http, remote: Some(remote) }
    }

    /// `api_backed` routes through the configured Remote API regardless of
    /// the url's own scheme, matching spec.md's "identified by url prefix
    /// or a mode flag" wording — the Controller decides which applies.
    pub async fn acquire(
        &self,
        url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
        api_backed: bool,
    ) -> Result<FetchResult> {
        if api_backed {
            let remote = self
                .remote
                .as_ref()
                .ok_or_else(|| Error::Config(format!("no remote backend configured for {url}")))?;
            let body = remote.fetch_feed(url).await?;
            return Ok(FetchResult::Content { body, etag: None, last_modified: None });
        }

        if let Some(path) = url.strip_prefix("file://") {
            let body = tokio::fs::read(path).await?;
            return Ok(FetchResult::Content { body, etag: None, last_modified: None });
        }

        if let Some(cmd) = url.strip_prefix("exec:") {
            let body = run_shell(cmd, None).await?;
            return Ok(FetchResult::Content { body, etag: None, last_modified: None });
        }

        if let Some(rest) = url.strip_prefix("filter:") {
            let (cmd, inner_url) = rest
                .split_once(':')
                .ok_or_else(|| Error::Other(format!("fetch: malformed filter url: {url}")))?;
            let inner = Box::pin(self.acquire(inner_url, None, None, false)).await?;
            let body = match inner {
                FetchResult::Content { body, .. } => body,
                FetchResult::NotModified => return Ok(FetchResult::NotModified),
            };
            let filtered = run_shell(cmd, Some(body)).await?;
            return Ok(FetchResult::Content { body: filtered, etag: None, last_modified: None });
        }

        if url.starts_with("http://") || url.starts_with("https://") {
            return self.http.fetch(url, etag, last_modified).await;
        }

        Err(Error::Other(format!("fetch: unsupported url scheme: {url}")))
    }
}

/// Runs `cmd` via `/bin/sh -c`, optionally piping `stdin` to it, and
/// returns its stdout. Used by `exec:` and `filter:` acquisition.
async fn run_shell(cmd: &str, stdin: Option<Vec<u8>>) -> Result<Vec<u8>> {
    let mut command = Command::new("/bin/sh");
    command.arg("-c").arg(cmd).stdout(Stdio::piped()).stderr(Stdio::null());
    if stdin.is_some() {
        command.stdin(Stdio::piped());
    }

    let mut child = command.spawn()?;

    if let Some(data) = stdin {
        if let Some(mut sin) = child.stdin.take() {
            sin.write_all(&data).await?;
        }
    }

    let output = child.wait_with_output().await?;
    if !output.status.success() {
        return Err(Error::Other(format!("fetch: command `{cmd}` exited with {}", output.status)));
    }
    Ok(output.stdout)
}
