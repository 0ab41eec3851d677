use async_trait::async_trait;
use reqwest::Client;
use tokio::sync::RwLock;

use crate::app::{Error, Result};
use crate::remote::{Credentials, RemoteApi, Subscription};

/// The Google Reader API clone surface shared by FreshRSS, ownCloud News,
/// and Tiny Tiny RSS: `ClientLogin` auth producing a `SID` token, then
/// `/reader/api/0/...` endpoints carrying it as a query parameter.
pub struct GReaderCloneApi {
    client: Client,
    base_url: String,
    credentials: Credentials,
    sid: RwLock<Option<String>>,
}

impl GReaderCloneApi {
    pub fn new(client: Client, base_url: impl Into<String>, credentials: Credentials) -> Self {
        Self { client, base_url: base_url.into(), credentials, sid: RwLock::new(None) }
    }

    async fn sid(&self) -> Result<String> {
        if let Some(sid) = self.sid.read().await.clone() {
            return Ok(sid);
        }
        self.authenticate().await?;
        self.sid.read().await.clone().ok_or_else(|| Error::Auth("remote: authentication did not yield a SID".into()))
    }

    fn login_url(&self) -> String {
        format!("{}/accounts/ClientLogin", self.base_url.trim_end_matches('/'))
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/reader/api/0/{path}", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl RemoteApi for GReaderCloneApi {
    async fn authenticate(&self) -> Result<()> {
        let (user, password) = self.credentials.resolve()?;
        let response = self
            .client
            .post(self.login_url())
            .form(&[("Email", user.as_str()), ("Passwd", password.as_str())])
            .send()
            .await?
            .error_for_status()
            .map_err(Error::Transport)?;

        let body = response.text().await?;
        let sid = body
            .lines()
            .find_map(|line| line.strip_prefix("SID="))
            .ok_or_else(|| Error::Auth("remote: ClientLogin response missing SID".into()))?
            .to_string();

        *self.sid.write().await = Some(sid);
        Ok(())
    }

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        let sid = self.sid().await?;
        let response = self
            .client
            .get(self.api_url("subscription/list"))
            .query(&[("output", "json"), ("ck", "tributary")])
            .header("Authorization", format!("GoogleLogin auth={sid}"))
            .send()
            .await?
            .error_for_status()
            .map_err(Error::Transport)?;

        let parsed: SubscriptionList = response.json().await?;
        Ok(parsed
            .subscriptions
            .into_iter()
            .map(|s| Subscription {
                rss_url: s.id,
                title: Some(s.title),
                tags: s.categories.into_iter().map(|c| c.label).collect(),
            })
            .collect())
    }

    async fn mark_all_read(&self, rss_url: &str) -> Result<()> {
        let sid = self.sid().await?;
        self.client
            .post(self.api_url("mark-all-as-read"))
            .header("Authorization", format!("GoogleLogin auth={sid}"))
            .form(&[("s", rss_url)])
            .send()
            .await?
            .error_for_status()
            .map_err(Error::Transport)?;
        Ok(())
    }

    async fn mark_article_read(&self, rss_url: &str, guid: &str, read: bool) -> Result<()> {
        let sid = self.sid().await?;
        let tag_field = if read { "a" } else { "r" };
        self.client
            .post(self.api_url("edit-tag"))
            .header("Authorization", format!("GoogleLogin auth={sid}"))
            .form(&[("i", guid), ("s", rss_url), (tag_field, "user/-/state/com.google/read")])
            .send()
            .await?
            .error_for_status()
            .map_err(Error::Transport)?;
        Ok(())
    }

    async fn update_article_flags(&self, rss_url: &str, guid: &str, flags: &str) -> Result<()> {
        let sid = self.sid().await?;
        let tag_field = if flags.contains('s') { "a" } else { "r" };
        self.client
            .post(self.api_url("edit-tag"))
            .header("Authorization", format!("GoogleLogin auth={sid}"))
            .form(&[("i", guid), ("s", rss_url), (tag_field, "user/-/state/com.google/starred")])
            .send()
            .await?
            .error_for_status()
            .map_err(Error::Transport)?;
        Ok(())
    }
}

#[derive(Debug, serde::Deserialize)]
struct SubscriptionList {
    subscriptions: Vec<GReaderSubscription>,
}

#[derive(Debug, serde::Deserialize)]
struct GReaderSubscription {
    id: String,
    title: String,
    #[serde(default)]
    categories: Vec<GReaderCategory>,
}

#[derive(Debug, serde::Deserialize)]
struct GReaderCategory {
    label: String,
}
