//! Background task event handling.
//!
//! Results arrive in completion order. Each handler checks that the result
//! still matches what the user is looking at before applying it.

use crate::app::{App, AppEvent, Command, ContentState, Mode};
use crate::feed::SyncOutcome;

/// Apply one event and return the follow-up commands
pub(super) fn handle_app_event(app: &mut App, event: AppEvent) -> Vec<Command> {
    match event {
        AppEvent::FeedsLoaded(feeds) => on_feeds_loaded(app, feeds),

        AppEvent::EntriesLoaded { feed_id, snapshot } => {
            if app.current_feed != Some(feed_id) {
                tracing::debug!(feed_id, "Dropping entries of a feed no longer shown");
                return Vec::new();
            }
            // the watermark moved when the feed was opened
            if let Some(feed) = app.feeds.iter_mut().find(|f| f.id == feed_id) {
                feed.unread_count = 0;
            }
            if app.replace_entries(snapshot) {
                app.render_selected_entry()
            } else {
                Vec::new()
            }
        }

        AppEvent::ContentRendered {
            entry_id,
            title,
            width,
            content,
        } => {
            if app.selected_entry().map(|e| e.entry.id) != Some(entry_id) {
                tracing::debug!(entry_id, "Dropping render of an entry no longer selected");
                return Vec::new();
            }
            let same_entry = app.content.entry_id() == Some(entry_id);
            app.content = ContentState::Rendered {
                entry_id,
                title,
                width,
                content,
            };
            if !same_entry {
                app.scroll_offset = 0;
            }
            app.clamp_scroll();
            Vec::new()
        }

        AppEvent::SyncStarted { feeds } => {
            if feeds == 0 {
                app.set_status("No feeds to sync");
            }
            app.sync_started(feeds);
            Vec::new()
        }

        AppEvent::FeedSynced(outcome) => on_feed_synced(app, outcome),

        AppEvent::FeedRefreshed { feed_id, result } => {
            match result {
                Ok(0) => app.set_status("No new entries"),
                Ok(n) => app.set_status(format!("{} new entries", n)),
                Err(e) => app.set_status(format!("Refresh failed: {}", e)),
            }
            let mut commands = vec![Command::LoadFeeds];
            if app.current_feed == Some(feed_id) {
                commands.push(Command::LoadEntries { feed_id });
            }
            commands
        }

        AppEvent::FeedAdded { feed_id, url } => {
            tracing::debug!(feed_id, url = %url, "Feed added, reloading list");
            app.loading = false;
            app.set_status(format!("Added {}", url));
            vec![Command::LoadFeeds]
        }

        AppEvent::Imported { count } => {
            app.loading = false;
            app.set_status(format!("Imported {} feeds", count));
            let mut commands = vec![Command::LoadFeeds];
            if count > 0 {
                commands.push(Command::SyncAll);
            }
            commands
        }

        AppEvent::Exported { count, path } => {
            tracing::debug!(count, "Export finished");
            app.set_status(format!("Exported to {}", path.display()));
            Vec::new()
        }

        AppEvent::FeedDeleted { feed_id, title } => {
            tracing::debug!(feed_id, "Feed deleted, reloading list");
            app.set_status(format!("Deleted {}", title));
            vec![Command::LoadFeeds]
        }

        AppEvent::Reordered => app.reorder_finished(),

        AppEvent::ReorderFailed { error } => {
            app.reorder_failed();
            app.show_error(error);
            // the optimistic swap is wrong now
            vec![Command::LoadFeeds]
        }

        AppEvent::DirListed { dir, result } => {
            if let Mode::ImportingFeeds { picker } = &mut app.mode {
                if !picker.apply_listing(&dir, result) {
                    tracing::debug!(dir = %dir.display(), "Dropping stale directory listing");
                }
            }
            Vec::new()
        }

        AppEvent::Failed { error } => {
            app.show_error(error);
            Vec::new()
        }

        AppEvent::TaskPanicked { task, error } => {
            app.loading = false;
            app.set_status(format!("Internal error in {}: {}", task, error));
            if task == "reorder" {
                app.reorder_failed();
                return vec![Command::LoadFeeds];
            }
            Vec::new()
        }
    }
}

fn on_feeds_loaded(app: &mut App, feeds: Vec<crate::storage::Feed>) -> Vec<Command> {
    let changed = app.replace_feeds(feeds);
    if app.feeds.is_empty() {
        app.current_feed = None;
        app.entries.clear();
        app.selected_entry = 0;
        if !matches!(app.content, ContentState::Error(_)) {
            app.content = ContentState::Empty;
        }
        return Vec::new();
    }
    if changed {
        app.load_selected_feed()
    } else {
        Vec::new()
    }
}

fn on_feed_synced(app: &mut App, outcome: SyncOutcome) -> Vec<Command> {
    app.sync_progressed();

    if let Err(e) = &outcome.result {
        tracing::warn!(feed_id = outcome.feed_id, error = %e, "Feed sync failed");
        if app.current_feed == Some(outcome.feed_id) {
            app.set_status(format!("Sync failed: {}", e));
        }
    }

    if app.pending_sync == 0 && app.status_message.is_none() {
        app.set_status("Sync complete");
    }

    vec![Command::LoadFeeds]
}
