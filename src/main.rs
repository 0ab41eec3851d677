use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tributary::app::AppContext;
use tributary::cli::{commands, Cli, Commands};
use tributary::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::debug!("Failed to load config: {}. Using defaults.", e);
        Config::default()
    });
    if let Some(threads) = cli.reload_threads {
        config.reload_threads = threads;
    }

    let ctx = AppContext::new(None, config)?;

    match cli.command {
        Commands::Add { url, tags } => {
            commands::add_feed(&ctx, &url, tags).await?;
        }
        Commands::Remove { url } => {
            commands::remove_feed(&ctx, &url)?;
        }
        Commands::Import { path } => {
            commands::import_opml(&ctx, &path)?;
        }
        Commands::Update { url } => {
            commands::update_feeds(&ctx, url.as_deref()).await?;
        }
        Commands::List { items } => {
            if items {
                commands::list_items(&ctx)?;
            } else {
                commands::list_feeds(&ctx)?;
            }
        }
        Commands::Search { query, feed } => {
            commands::search_items(&ctx, &query, feed.as_deref())?;
        }
        Commands::Catchup { url } => {
            commands::catchup(&ctx, url.as_deref()).await?;
        }
    }

    Ok(())
}
