use crate::app::{AppContext, Result};
use crate::container::{SortCriterion, SortDirection, SortKey};
use crate::controller::ReloadConfig;
use crate::domain::Feed;
use crate::store::CatchupScope;
use crate::urlsource::{FileUrlSource, OpmlUrlSource, UrlSource};

pub async fn add_feed(ctx: &AppContext, url: &str, tags: Vec<String>) -> Result<()> {
    if ctx.container.get_by_url(url).is_some() {
        println!("Feed already tracked: {url}");
        return Ok(());
    }

    let mut feed = Feed::new(url);
    feed.tags = tags;
    feed.order = ctx.container.count() as i64;
    ctx.container.add(feed);
    persist_urls(ctx)?;

    let results = ctx.controller.reload(Some(url), &reload_config(ctx)).await;
    report_reload(&results);
    Ok(())
}

pub fn remove_feed(ctx: &AppContext, url: &str) -> Result<()> {
    if ctx.container.get_by_url(url).is_none() {
        println!("No such feed: {url}");
        return Ok(());
    }

    let remaining: Vec<Feed> =
        (0..ctx.container.count()).filter_map(|i| ctx.container.get_by_index(i)).filter(|f| f.rss_url != url).collect();
    ctx.container.set_all(remaining);
    persist_urls(ctx)?;

    println!("Removed feed: {url}");
    Ok(())
}

pub fn import_opml(ctx: &AppContext, path: &std::path::Path) -> Result<()> {
    let mut source = OpmlUrlSource::new(&path.to_string_lossy());
    let imported = source.load()?;

    let mut added = 0;
    for url in &imported.urls {
        if ctx.container.get_by_url(url).is_some() {
            continue;
        }
        let mut feed = Feed::new(url);
        feed.tags = imported.tags_for(url).to_vec();
        feed.order = ctx.container.count() as i64;
        ctx.container.add(feed);
        added += 1;
    }
    persist_urls(ctx)?;

    println!("Imported {added} new feeds from {}", path.display());
    Ok(())
}

pub async fn update_feeds(ctx: &AppContext, url: Option<&str>) -> Result<()> {
    if ctx.container.count() == 0 {
        println!("No feeds to update");
        return Ok(());
    }

    let results = ctx.controller.reload(url, &reload_config(ctx)).await;
    report_reload(&results);
    ctx.controller.refresh_query_feeds(SortCriterion::new(SortKey::LastUpdated, SortDirection::Desc));
    Ok(())
}

fn report_reload(results: &[(String, Result<usize>)]) {
    let mut total_new = 0;
    let mut errors = 0;
    for (url, result) in results {
        match result {
            Ok(count) => {
                total_new += count;
                if *count > 0 {
                    println!("  {count} new items from {url}");
                }
            }
            Err(e) => {
                errors += 1;
                eprintln!("  error updating {url}: {e}");
            }
        }
    }
    println!("Update complete: {total_new} new items, {errors} errors");
}

pub fn list_feeds(ctx: &AppContext) -> Result<()> {
    if ctx.container.count() == 0 {
        println!("No feeds");
        return Ok(());
    }

    for i in 0..ctx.container.count() {
        let Some(feed) = ctx.container.get_by_index(i) else { continue };
        println!("{} ({} unread)\n  {}", feed.display_title(), feed.unread_item_count(), feed.rss_url);
    }
    Ok(())
}

pub fn list_items(ctx: &AppContext) -> Result<()> {
    let mut any = false;
    for i in 0..ctx.container.count() {
        let Some(feed) = ctx.container.get_by_index(i) else { continue };
        for item in &feed.items {
            any = true;
            let marker = if item.unread { "*" } else { " " };
            let date = item.pub_date.map(|d| d.to_string()).unwrap_or_else(|| "          ".to_string());
            println!("{marker} {date} {}", item.display_title());
        }
    }
    if !any {
        println!("No items");
    }
    Ok(())
}

pub fn search_items(ctx: &AppContext, query: &str, feed: Option<&str>) -> Result<()> {
    let items = ctx.store.search(query, feed)?;
    if items.is_empty() {
        println!("No matches for {query:?}");
        return Ok(());
    }
    for item in items {
        println!("{} ({})", item.display_title(), item.feed_url);
    }
    Ok(())
}

pub async fn catchup(ctx: &AppContext, url: Option<&str>) -> Result<()> {
    let scope = match url {
        Some(url) => CatchupScope::Feed(url.to_string()),
        None => CatchupScope::All,
    };
    ctx.controller.catchup_all(scope).await?;
    println!("Marked read: {}", url.unwrap_or("all feeds"));
    Ok(())
}

fn reload_config(ctx: &AppContext) -> ReloadConfig {
    ReloadConfig {
        reload_threads: ctx.config.reload_threads.max(1),
        max_items: if ctx.config.cache.max_items == 0 { None } else { Some(ctx.config.cache.max_items) },
        reset_unread_on_update: ctx.config.cache.reset_unread_on_update.clone(),
    }
}

fn persist_urls(ctx: &AppContext) -> Result<()> {
    let Some(path) = &ctx.config.urls_file else { return Ok(()) };

    let mut set = crate::urlsource::UrlSet::default();
    for i in 0..ctx.container.count() {
        let Some(feed) = ctx.container.get_by_index(i) else { continue };
        set.urls.push(feed.rss_url.clone());
        if !feed.tags.is_empty() {
            set.tags_by_url.insert(feed.rss_url.clone(), feed.tags.clone());
        }
    }
    FileUrlSource::new(path).write(&set)
}
