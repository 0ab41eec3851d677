use thiserror::Error;

use crate::filter::{MatchError, ParseError};

#[derive(Error, Debug)]
pub enum Error {
    #[error("cache: database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("fetch: transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("fetch: parse error: {0}")]
    Parse(String),

    #[error("filter: {0}")]
    FilterParse(#[from] ParseError),

    #[error("filter: {0}")]
    FilterEval(#[from] MatchError),

    #[error("urlsource: invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("remote: authentication failed: {0}")]
    Auth(String),

    #[error("config: {0}")]
    Config(String),

    #[error("controller: lock held by another process (pid {0})")]
    Lock(u32),

    #[error("cache: feed not found: {0}")]
    FeedNotFound(String),

    #[error("cache: item not found: {0}")]
    ItemNotFound(String),

    #[error("opml: {0}")]
    Opml(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
