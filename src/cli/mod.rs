pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tributary")]
#[command(about = "Core of a terminal-first RSS/Atom aggregator", long_about = None)]
pub struct Cli {
    /// Overrides the configured degree of reload parallelism
    #[arg(short = 'j', long, global = true)]
    pub reload_threads: Option<usize>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new feed url, with optional tags
    Add {
        url: String,
        tags: Vec<String>,
    },
    /// Remove a feed url
    Remove {
        url: String,
    },
    /// Import feed urls from an OPML document
    Import {
        path: std::path::PathBuf,
    },
    /// Reload one feed, or all feeds if none is given
    Update {
        url: Option<String>,
    },
    /// List feeds or items
    List {
        #[arg(long)]
        items: bool,
    },
    /// Search item title and content
    Search {
        query: String,
        #[arg(long)]
        feed: Option<String>,
    },
    /// Mark items read, scoped to a feed or globally
    Catchup {
        url: Option<String>,
    },
}
