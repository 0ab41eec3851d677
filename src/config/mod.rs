//! Configuration for the core library: cache policy, transport policy,
//! reload concurrency, and remote-backend selection.
//!
//! Read from `~/.config/tributary/config.toml` at startup. If the file
//! doesn't exist, a default configuration with comments is created.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Cache retention and update-reset policy (Feed Cache ambient settings).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 0 disables the cap.
    pub max_items: usize,
    /// 0 disables time-based pruning.
    pub keep_articles_days: i64,
    pub cleanup_on_quit: bool,
    pub delete_read_items_on_cleanup: bool,
    /// url globs: feeds matching one force `unread=true` on content change.
    pub reset_unread_on_update: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_items: 0,
            keep_articles_days: 0,
            cleanup_on_quit: false,
            delete_read_items_on_cleanup: false,
            reset_unread_on_update: Vec::new(),
        }
    }
}

/// HTTP transport policy shared by every acquisition over `http(s)://`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub timeout_secs: u64,
    pub user_agent: Option<String>,
    pub proxy_url: Option<String>,
    pub download_retries: u32,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { timeout_secs: 30, user_agent: None, proxy_url: None, download_retries: 0 }
    }
}

impl TransportConfig {
    pub fn to_fetcher_config(&self) -> crate::fetcher::TransportConfig {
        let default = crate::fetcher::TransportConfig::default();
        crate::fetcher::TransportConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            user_agent: self.user_agent.clone().unwrap_or(default.user_agent),
            proxy_url: self.proxy_url.clone(),
            download_retries: self.download_retries,
            max_redirects: default.max_redirects,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RemoteBackend {
    None,
    Miniflux,
    Greader,
}

impl Default for RemoteBackend {
    fn default() -> Self {
        RemoteBackend::None
    }
}

/// Remote-aggregator backend selection and credential resolution inputs.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RemoteConfig {
    pub backend: RemoteBackend,
    pub base_url: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub password_file: Option<String>,
    pub password_command: Option<String>,
    pub include_special_feeds: bool,
}

impl RemoteConfig {
    pub fn credentials(&self) -> crate::remote::Credentials {
        crate::remote::Credentials {
            user: self.user.clone(),
            password: self.password.clone(),
            password_file: self.password_file.clone(),
            password_command: self.password_command.clone(),
        }
    }
}

/// Main configuration struct.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub transport: TransportConfig,
    pub remote: RemoteConfig,
    /// Degree of parallelism for `Controller::reload`; capped by the
    /// process at a sane ceiling regardless of the configured value.
    pub reload_threads: usize,
    /// Path to the urls file, OPML source(s), or `None` to use the remote
    /// backend exclusively as the Url Source.
    pub urls_file: Option<PathBuf>,
    pub opml_sources: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            transport: TransportConfig::default(),
            remote: RemoteConfig::default(),
            reload_threads: 1,
            urls_file: None,
            opml_sources: None,
        }
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Io { path: config_path.clone(), source: e })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse { path: config_path, source: e })?;

        Ok(config)
    }

    /// Get the default config file path: `~/.config/tributary/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("tributary").join("config.toml"))
    }

    fn create_default_config(path: &PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io { path: parent.to_path_buf(), source: e })?;
        }

        let default_config = Self::default_config_content();

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io { path: path.clone(), source: e })?;

        file.write_all(default_config.as_bytes()).map_err(|e| ConfigError::Io { path: path.clone(), source: e })?;

        Ok(())
    }

    fn default_config_content() -> String {
        r##"# tributary configuration
#
# `urls_file` and `opml_sources` are mutually exclusive Url Source
# providers; when neither is set and `remote.backend` isn't `none`, the
# remote backend's subscription list is the Url Source.

urls_file = "~/.config/tributary/urls"
# opml_sources = "~/feeds.opml /shared/more-feeds.opml"
reload_threads = 1

[cache]
# 0 disables each of these caps.
max_items = 0
keep_articles_days = 0
cleanup_on_quit = false
delete_read_items_on_cleanup = false
reset_unread_on_update = []

[transport]
timeout_secs = 30
# user_agent = "tributary/0.1.0"
# proxy_url = "socks5://127.0.0.1:9050"
download_retries = 0

[remote]
backend = "none"
# base_url = "https://miniflux.example.com"
# user = "alice"
# password_file = "~/.config/tributary/password"
include_special_feeds = false
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
}
