//! Command dispatch.
//!
//! Each `Command` becomes one spawned task that reports back through the
//! event channel. The loop never awaits any of this work itself.

use crate::app::{App, AppEvent, Command};
use crate::feed::{self, opml, SyncOptions};
use crate::ordering::{open_feed, ReorderPlan};
use crate::picker::list_dir;
use crate::render::render_entry;
use crate::storage::{Database, Entry, Feed};
use crate::util::strip_control_chars;
use anyhow::{Context as _, Result};
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::helpers::{send, spawn_task};

/// Spawn the task for one command
pub(super) fn dispatch(app: &App, command: Command, tx: &mpsc::Sender<AppEvent>) {
    let db = app.db.clone();
    let tx_task = tx.clone();

    match command {
        Command::LoadFeeds => spawn_task("load_feeds", tx.clone(), async move {
            let event = match db.list_feeds().await {
                Ok(feeds) => AppEvent::FeedsLoaded(feeds),
                Err(e) => failed("Failed to load feeds", e.into()),
            };
            send(&tx_task, event).await;
        }),

        Command::LoadEntries { feed_id } => spawn_task("load_entries", tx.clone(), async move {
            let event = match open_feed(&db, feed_id).await {
                Ok(snapshot) => AppEvent::EntriesLoaded { feed_id, snapshot },
                Err(e) => failed("Failed to load entries", e.into()),
            };
            send(&tx_task, event).await;
        }),

        Command::RenderEntry { entry, width } => spawn_task("render", tx.clone(), async move {
            render_and_mark_read(&db, entry, width, &tx_task).await;
        }),

        Command::SyncAll => {
            let client = app.http_client.clone();
            let options = app.sync_options;
            spawn_task("sync", tx.clone(), async move {
                run_sync(db, client, options, &tx_task).await;
            });
        }

        Command::RefreshFeed { feed } => {
            let client = app.http_client.clone();
            let timeout = app.sync_options.timeout;
            spawn_task("refresh", tx.clone(), async move {
                let outcome = feed::sync_one(&db, &client, &feed, timeout).await;
                let result = outcome.result.map_err(|e| e.to_string());
                send(
                    &tx_task,
                    AppEvent::FeedRefreshed {
                        feed_id: feed.id,
                        result,
                    },
                )
                .await;
            });
        }

        Command::AddFeed { url } => {
            let client = app.http_client.clone();
            let timeout = app.sync_options.timeout;
            spawn_task("add_feed", tx.clone(), async move {
                let event = match feed::add_feed_from_url(&db, &client, &url, timeout).await {
                    Ok(feed_id) => AppEvent::FeedAdded { feed_id, url },
                    Err(e) => failed("Failed to add feed", e.into()),
                };
                send(&tx_task, event).await;
            });
        }

        Command::ImportOpml { path } => spawn_task("import", tx.clone(), async move {
            let event = match import_opml(&db, &path).await {
                Ok(count) => AppEvent::Imported { count },
                Err(e) => failed("Import failed", e),
            };
            send(&tx_task, event).await;
        }),

        Command::ExportOpml => {
            let path = app.export_path.clone();
            spawn_task("export", tx.clone(), async move {
                let event = match export_opml(&db, &path).await {
                    Ok(count) => AppEvent::Exported { count, path },
                    Err(e) => failed("Export failed", e),
                };
                send(&tx_task, event).await;
            });
        }

        Command::DeleteFeed { feed_id, title } => spawn_task("delete_feed", tx.clone(), async move {
            let event = match db.delete_feed(feed_id).await {
                Ok(()) => {
                    tracing::info!(feed_id, "Feed deleted");
                    AppEvent::FeedDeleted { feed_id, title }
                }
                Err(e) => failed("Failed to delete feed", e.into()),
            };
            send(&tx_task, event).await;
        }),

        Command::Reorder { plan } => spawn_task("reorder", tx.clone(), async move {
            let event = match persist_reorder(&db, &plan).await {
                Ok(()) => AppEvent::Reordered,
                Err(e) => {
                    tracing::error!(feed_id = plan.moved.id, error = %e, "Reorder failed");
                    AppEvent::ReorderFailed {
                        error: format!("Failed to reorder feeds: {}", e),
                    }
                }
            };
            send(&tx_task, event).await;
        }),

        Command::ListDir { dir } => spawn_task("list_dir", tx.clone(), async move {
            let result = list_dir(&dir).await.map_err(|e| e.to_string());
            send(&tx_task, AppEvent::DirListed { dir, result }).await;
        }),

        Command::OpenUrl { url } => spawn_task("open_url", tx.clone(), async move {
            // open::that blocks until the launcher returns
            let opened = tokio::task::spawn_blocking({
                let url = url.clone();
                move || open::that(url)
            })
            .await;
            match opened {
                Ok(Ok(())) => tracing::debug!(url = %url, "Opened in browser"),
                Ok(Err(e)) => {
                    tracing::warn!(url = %url, error = %e, "Failed to open browser");
                    send(
                        &tx_task,
                        AppEvent::Failed {
                            error: format!("Failed to open browser: {}", e),
                        },
                    )
                    .await;
                }
                Err(e) => tracing::warn!(error = %e, "Browser launch task failed"),
            }
        }),
    }
}

/// Log a storage or input failure and build the event that shows it
fn failed(context: &str, error: anyhow::Error) -> AppEvent {
    tracing::error!(error = %error, "{}", context);
    AppEvent::Failed {
        error: format!("{}: {:#}", context, error),
    }
}

async fn render_and_mark_read(db: &Database, entry: Entry, width: u16, tx: &mpsc::Sender<AppEvent>) {
    // already marked in memory; a failed write only loses persistence
    if let Err(e) = db.mark_entry_read(entry.id).await {
        tracing::warn!(entry_id = entry.id, error = %e, "Failed to mark entry read");
    }

    let entry_id = entry.id;
    let title: Arc<str> = Arc::from(strip_control_chars(&entry.title).as_ref());
    match tokio::task::spawn_blocking(move || render_entry(&entry, width)).await {
        Ok(content) => {
            send(
                tx,
                AppEvent::ContentRendered {
                    entry_id,
                    title,
                    width,
                    content,
                },
            )
            .await;
        }
        Err(e) => {
            send(
                tx,
                AppEvent::TaskPanicked {
                    task: "render",
                    error: e.to_string(),
                },
            )
            .await;
        }
    }
}

async fn run_sync(
    db: Database,
    client: reqwest::Client,
    options: SyncOptions,
    tx: &mpsc::Sender<AppEvent>,
) {
    let feeds = match db.list_feeds().await {
        Ok(feeds) => feeds,
        Err(e) => {
            send(tx, failed("Failed to load feeds for sync", e.into())).await;
            return;
        }
    };

    let total = feeds.len();
    send(tx, AppEvent::SyncStarted { feeds: total }).await;

    let mut outcomes = feed::sync_all(db, client, feeds, options);
    let mut failed_count = 0usize;
    while let Some(outcome) = outcomes.next().await {
        if outcome.result.is_err() {
            failed_count += 1;
        }
        send(tx, AppEvent::FeedSynced(outcome)).await;
    }

    tracing::info!(total, failed = failed_count, "Sync finished");
}

async fn import_opml(db: &Database, path: &Path) -> Result<usize> {
    let contents = opml::read_file(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let document = opml::parse_opml(&contents)?;
    let candidates = opml::import_candidates(&opml::flatten(&document.outlines));
    let count = db.add_feeds(&candidates).await?;
    tracing::info!(path = %path.display(), found = candidates.len(), added = count, "OPML imported");
    Ok(count)
}

async fn export_opml(db: &Database, path: &Path) -> Result<usize> {
    let feeds: Vec<Feed> = db.list_feeds().await?;
    let outlines: Vec<opml::Outline> = feeds.iter().map(opml::Outline::from).collect();
    let contents = opml::generate(&outlines)?;
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    opml::write_file(path, &contents).await?;
    tracing::info!(path = %path.display(), count = feeds.len(), "OPML exported");
    Ok(feeds.len())
}

async fn persist_reorder(db: &Database, plan: &ReorderPlan) -> Result<()> {
    db.apply_reorder(plan).await?;
    Ok(())
}
