//! Fan-out synchronization of subscribed feeds.
//!
//! Every feed is an independent fetch-and-merge job. A failing job reports
//! its error in its own [`SyncOutcome`] and never affects its siblings.

use futures::stream::{self, Stream, StreamExt};
use std::time::Duration;
use thiserror::Error;

use super::fetcher::{fetch, FetchError};
use crate::config::SyncConfig;
use crate::storage::{Database, DatabaseError, Feed};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

/// Result of syncing one feed: new entry count or the failure
#[derive(Debug)]
pub struct SyncOutcome {
    pub feed_id: i64,
    pub result: Result<usize, SyncError>,
}

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    pub timeout: Duration,
    pub concurrency: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            concurrency: 10,
        }
    }
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            concurrency: config.concurrency.max(1),
        }
    }
}

/// Fetch one feed and merge its entries.
///
/// The merge is a single transaction of insert-if-absent rows keyed on the
/// entry link, so on any failure the stored entries stay as they were.
pub async fn sync_one(db: &Database, client: &reqwest::Client, feed: &Feed, timeout: Duration) -> SyncOutcome {
    let result = fetch_and_merge(db, client, feed, timeout).await;

    match &result {
        Ok(inserted) => {
            tracing::debug!(feed_id = feed.id, url = %feed.url, inserted, "Feed synced");
        }
        Err(e) => {
            tracing::warn!(feed_id = feed.id, url = %feed.url, error = %e, "Feed sync failed");
        }
    }

    SyncOutcome {
        feed_id: feed.id,
        result,
    }
}

async fn fetch_and_merge(
    db: &Database,
    client: &reqwest::Client,
    feed: &Feed,
    timeout: Duration,
) -> Result<usize, SyncError> {
    let parsed = fetch(client, &feed.url, timeout).await?;
    let inserted = db.save_entries(feed.id, &parsed.entries).await?;
    Ok(inserted)
}

/// Sync many feeds with bounded concurrency.
///
/// Yields one outcome per feed, in completion order.
pub fn sync_all(
    db: Database,
    client: reqwest::Client,
    feeds: Vec<Feed>,
    options: SyncOptions,
) -> impl Stream<Item = SyncOutcome> {
    stream::iter(feeds)
        .map(move |feed| {
            let db = db.clone();
            let client = client.clone();
            async move { sync_one(&db, &client, &feed, options.timeout).await }
        })
        .buffer_unordered(options.concurrency.max(1))
}

/// Subscribe to a URL: fetch it, store the feed with its advertised title
/// and description, then merge the first batch of entries.
///
/// Nothing is stored when the fetch fails. Returns the feed id.
pub async fn add_feed_from_url(
    db: &Database,
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<i64, SyncError> {
    let parsed = fetch(client, url, timeout).await?;
    let title = parsed.title.as_deref().unwrap_or(url);
    let description = parsed.description.as_deref().unwrap_or_default();

    let feed_id = db.add_feed(url, title, description).await?;
    let inserted = db.save_entries(feed_id, &parsed.entries).await?;

    tracing::info!(feed_id, url = %url, inserted, "Feed added");
    Ok(feed_id)
}
