//! # tributary
//!
//! The core of a terminal-first RSS/Atom aggregator: acquisition and
//! parsing, a persistent item cache, a filter-expression language, and an
//! in-memory feed/item container. No UI is built here; [`cli`] is a thin
//! driver over the library.
//!
//! ## Pipeline
//!
//! ```text
//! urlsource → fetcher (Acquirer) → normalizer → store (Feed Cache)
//!                                                   │
//!                                                   ▼
//!                                              container (FeedContainer)
//! ```
//!
//! - [`urlsource`]: where feed urls come from (file, OPML, remote backend)
//! - [`fetcher`]: scheme-dispatching acquisition (http(s), file, exec, filter, remote)
//! - [`normalizer`]: turns acquired bytes into a neutral [`domain::Feed`]
//! - [`filter`]: the filter-expression language (parser + evaluator)
//! - [`store`]: the persistent item cache (SQLite)
//! - [`remote`]: abstract interface to external aggregator backends
//! - [`container`]: in-memory ordered collection of feeds
//! - [`controller`]: orchestrates reload, catchup, and cache maintenance
//! - [`app`]: application context and error types
//! - [`cli`]: command-line interface definitions

pub mod app;
pub mod cli;
pub mod config;
pub mod container;
pub mod controller;
pub mod domain;
pub mod fetcher;
pub mod filter;
pub mod normalizer;
pub mod remote;
pub mod store;
pub mod urlsource;

/// Headless-browser article scraping. No counterpart in the acquisition
/// pipeline this crate implements; retained only until the final trim.
pub mod scraper;
