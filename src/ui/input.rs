//! Key and mouse transitions.
//!
//! Handlers are synchronous: they mutate `App` and return the `Command`s the
//! loop should dispatch. One entry point per input kind.

use crate::app::{App, Command, Mode, Pane};
use crate::keybindings::Action as KbAction;
use crate::ordering::{apply_to_list, plan_reorder, Direction};
use crate::picker::{FilePicker, PickerChoice};
use crate::util::{validate_url, validate_url_for_open};
use crossterm::event::{KeyCode, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::{Position, Rect};

use super::Action;

/// Lines scrolled per mouse wheel notch in the content pane
const WHEEL_LINES: usize = 3;

/// Longest list filter accepted, in chars
const MAX_FILTER_LENGTH: usize = 256;

/// Main key dispatch, routed on the active mode.
pub(super) fn handle_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) -> Action {
    match app.mode {
        Mode::Help { .. } => {
            handle_help_key(app, code);
            Action::Continue(Vec::new())
        }
        Mode::AddingFeed { .. } => Action::Continue(handle_add_feed_key(app, code, modifiers)),
        Mode::ImportingFeeds { .. } => Action::Continue(handle_picker_key(app, code)),
        Mode::Filtering { pane } => Action::Continue(handle_filter_key(app, pane, code, modifiers)),
        Mode::Main { pane } => handle_main_key(app, pane, code, modifiers),
    }
}

fn enter_help(app: &mut App) {
    let previous = std::mem::replace(&mut app.mode, Mode::Main { pane: Pane::Feeds });
    app.mode = Mode::Help {
        previous: Box::new(previous),
    };
}

fn handle_help_key(app: &mut App, code: KeyCode) {
    if matches!(
        code,
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('?') | KeyCode::Backspace
    ) {
        let mode = std::mem::replace(&mut app.mode, Mode::Main { pane: Pane::Feeds });
        if let Mode::Help { previous } = mode {
            app.mode = *previous;
        }
    }
}

fn handle_add_feed_key(app: &mut App, code: KeyCode, modifiers: KeyModifiers) -> Vec<Command> {
    let Mode::AddingFeed { input } = &mut app.mode else {
        return Vec::new();
    };

    match code {
        KeyCode::Esc => {
            app.mode = Mode::Main { pane: Pane::Feeds };
        }
        KeyCode::Enter => {
            let url = input.trim().to_string();
            app.mode = Mode::Main { pane: Pane::Feeds };
            match validate_url(&url) {
                Ok(_) => {
                    app.loading = true;
                    return vec![Command::AddFeed { url }];
                }
                Err(e) => app.show_error(format!("Invalid URL: {}", e)),
            }
        }
        KeyCode::Backspace => {
            input.pop();
        }
        KeyCode::Char(c) if !modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
            input.push(c);
        }
        _ => {}
    }
    Vec::new()
}

fn handle_picker_key(app: &mut App, code: KeyCode) -> Vec<Command> {
    if code == KeyCode::Char('?') {
        enter_help(app);
        return Vec::new();
    }

    let Mode::ImportingFeeds { picker } = &mut app.mode else {
        return Vec::new();
    };

    match code {
        KeyCode::Esc => {
            app.mode = Mode::Main { pane: Pane::Feeds };
        }
        KeyCode::Down | KeyCode::Char('j') => picker.select_next(),
        KeyCode::Up | KeyCode::Char('k') => picker.select_prev(),
        KeyCode::Enter | KeyCode::Char('l') => match picker.choose() {
            Some(PickerChoice::Descend(dir)) => {
                picker.navigate(dir.clone());
                return vec![Command::ListDir { dir }];
            }
            Some(PickerChoice::Select(path)) => {
                app.mode = Mode::Main { pane: Pane::Feeds };
                app.loading = true;
                return vec![Command::ImportOpml { path }];
            }
            None => {}
        },
        KeyCode::Backspace | KeyCode::Char('h') | KeyCode::Left => {
            if let Some(dir) = picker.parent() {
                picker.navigate(dir.clone());
                return vec![Command::ListDir { dir }];
            }
        }
        _ => {}
    }
    Vec::new()
}

/// Every printable key is filter text here, `?` and `q` included. Enter
/// keeps the filter, Esc drops it.
fn handle_filter_key(app: &mut App, pane: Pane, code: KeyCode, modifiers: KeyModifiers) -> Vec<Command> {
    let mut query = app.filter(pane).to_string();
    match code {
        KeyCode::Esc => {
            app.mode = Mode::Main { pane };
            app.set_filter(pane, String::new())
        }
        KeyCode::Enter => {
            app.mode = Mode::Main { pane };
            Vec::new()
        }
        KeyCode::Down => app.step_selection(pane, 1),
        KeyCode::Up => app.step_selection(pane, -1),
        KeyCode::Backspace => {
            query.pop();
            app.set_filter(pane, query)
        }
        KeyCode::Char(c) if !modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) && !c.is_control() => {
            if query.chars().count() >= MAX_FILTER_LENGTH {
                app.set_status(format!("Filter at max length ({} chars)", MAX_FILTER_LENGTH));
                return Vec::new();
            }
            query.push(c);
            app.set_filter(pane, query)
        }
        _ => Vec::new(),
    }
}

fn handle_main_key(app: &mut App, pane: Pane, code: KeyCode, modifiers: KeyModifiers) -> Action {
    let Some(action) = app.keybindings.action_for_key(code, modifiers, pane.context()) else {
        return Action::Continue(Vec::new());
    };

    let commands = match action {
        KbAction::Quit => return Action::Quit,
        KbAction::ShowHelp => {
            enter_help(app);
            Vec::new()
        }
        KbAction::NextPane => {
            app.mode = Mode::Main { pane: pane.next() };
            Vec::new()
        }
        KbAction::PrevPane => {
            app.mode = Mode::Main { pane: pane.prev() };
            Vec::new()
        }
        KbAction::NavDown => move_selection(app, pane, 1),
        KbAction::NavUp => move_selection(app, pane, -1),
        KbAction::ScrollDown => {
            app.scroll_down(1);
            Vec::new()
        }
        KbAction::ScrollUp => {
            app.scroll_up(1);
            Vec::new()
        }
        KbAction::PageDown => {
            app.scroll_down(app.content_height.max(1));
            Vec::new()
        }
        KbAction::PageUp => {
            app.scroll_up(app.content_height.max(1));
            Vec::new()
        }
        KbAction::OpenLink => open_link(app, pane),
        KbAction::SyncAll => vec![Command::SyncAll],
        KbAction::RefreshFeed => match app.current_feed() {
            Some(feed) => vec![Command::RefreshFeed { feed: feed.clone() }],
            None => Vec::new(),
        },
        KbAction::ExportOpml => vec![Command::ExportOpml],
        KbAction::AddFeed => {
            app.mode = Mode::AddingFeed { input: String::new() };
            Vec::new()
        }
        KbAction::ImportOpml => {
            let dir = app.import_dir.clone();
            app.mode = Mode::ImportingFeeds {
                picker: FilePicker::new(dir.clone()),
            };
            vec![Command::ListDir { dir }]
        }
        KbAction::DeleteFeed => match app.selected_feed() {
            Some(feed) => vec![Command::DeleteFeed {
                feed_id: feed.id,
                title: feed.title.clone(),
            }],
            None => Vec::new(),
        },
        KbAction::MoveFeedUp => reorder(app, Direction::Up),
        KbAction::MoveFeedDown => reorder(app, Direction::Down),
        KbAction::StartFilter => {
            if pane.list_slot().is_some() {
                app.mode = Mode::Filtering { pane };
            }
            Vec::new()
        }
        KbAction::ClearFilter => app.set_filter(pane, String::new()),
    };
    Action::Continue(commands)
}

/// Move the selection of a list pane by one visible row, with the selection
/// cascade. In the content pane this scrolls instead.
fn move_selection(app: &mut App, pane: Pane, delta: isize) -> Vec<Command> {
    match pane {
        Pane::Feeds | Pane::Entries => app.step_selection(pane, delta),
        Pane::Content => {
            if delta > 0 {
                app.scroll_down(delta.unsigned_abs());
            } else {
                app.scroll_up(delta.unsigned_abs());
            }
            Vec::new()
        }
    }
}

fn open_link(app: &mut App, pane: Pane) -> Vec<Command> {
    let url = match (app.selected_entry(), pane) {
        (Some(item), _) => item.entry.link.to_string(),
        (None, Pane::Feeds) => match app.selected_feed() {
            Some(feed) => feed.url.clone(),
            None => return Vec::new(),
        },
        (None, _) => return Vec::new(),
    };

    match validate_url_for_open(&url) {
        Ok(_) => vec![Command::OpenUrl { url }],
        Err(e) => {
            app.set_status(format!("Cannot open link: {}", e));
            Vec::new()
        }
    }
}

/// Swap the selected feed with its neighbor in memory, then persist
fn reorder(app: &mut App, direction: Direction) -> Vec<Command> {
    // neighbors on screen are not neighbors in storage
    if !app.filter(Pane::Feeds).is_empty() {
        app.set_status("Clear the filter to reorder feeds");
        return Vec::new();
    }
    let Some(plan) = plan_reorder(&app.feeds, app.selected_feed, direction) else {
        return Vec::new();
    };
    apply_to_list(&mut app.feeds, &plan);
    app.selected_feed = plan.target_index;
    app.queue_reorder(plan)
}

// ============================================================================
// Mouse
// ============================================================================

/// Clicks focus a pane and select the row under the cursor; the wheel
/// scrolls the pane under the pointer.
pub(super) fn handle_mouse(app: &mut App, mouse: MouseEvent) -> Vec<Command> {
    if !matches!(app.mode, Mode::Main { .. }) {
        return Vec::new();
    }
    let Some(areas) = app.pane_areas else {
        return Vec::new();
    };
    let position = Position::new(mouse.column, mouse.row);
    let Some((pane, area)) = Pane::ALL
        .into_iter()
        .zip(areas)
        .find(|(_, area)| area.contains(position))
    else {
        return Vec::new();
    };

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            app.mode = Mode::Main { pane };
            match row_at(app, pane, area, mouse.row) {
                Some(index) if pane == Pane::Feeds => app.select_feed(index),
                Some(index) if pane == Pane::Entries => app.select_entry(index),
                _ => Vec::new(),
            }
        }
        MouseEventKind::ScrollDown => match pane {
            Pane::Content => {
                app.scroll_down(WHEEL_LINES);
                Vec::new()
            }
            _ => move_selection(app, pane, 1),
        },
        MouseEventKind::ScrollUp => match pane {
            Pane::Content => {
                app.scroll_up(WHEEL_LINES);
                Vec::new()
            }
            _ => move_selection(app, pane, -1),
        },
        _ => Vec::new(),
    }
}

/// List index under screen row `row` of a bordered list pane
fn row_at(app: &App, pane: Pane, area: Rect, row: u16) -> Option<usize> {
    let offset = app.list_offsets[pane.list_slot()?];
    let inner_top = area.y.saturating_add(1);
    let inner_bottom = area.bottom().saturating_sub(1);
    if row < inner_top || row >= inner_bottom {
        return None;
    }
    app.visible_rows(pane)
        .get(offset + usize::from(row - inner_top))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{test_app, test_entry, test_feed};
    use crate::app::{AppEvent, ContentState};
    use crate::ordering::FeedSnapshot;
    use crate::ui::events::handle_app_event;
    use crossterm::event::KeyModifiers as M;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn key(app: &mut App, code: KeyCode) -> Vec<Command> {
        key_with(app, code, M::NONE)
    }

    fn key_with(app: &mut App, code: KeyCode, modifiers: KeyModifiers) -> Vec<Command> {
        match handle_key(app, code, modifiers) {
            Action::Continue(commands) => commands,
            Action::Quit => panic!("unexpected quit"),
        }
    }

    async fn app_with_feeds() -> App {
        let mut app = test_app().await;
        app.replace_feeds(vec![test_feed(1, "A"), test_feed(2, "B"), test_feed(3, "C")]);
        app.load_selected_feed();
        app
    }

    #[tokio::test]
    async fn test_quit() {
        let mut app = test_app().await;
        assert!(matches!(handle_key(&mut app, KeyCode::Char('q'), M::NONE), Action::Quit));
    }

    #[tokio::test]
    async fn test_pane_cycling() {
        let mut app = test_app().await;
        key(&mut app, KeyCode::Tab);
        assert_eq!(app.mode, Mode::Main { pane: Pane::Entries });
        key(&mut app, KeyCode::Right);
        assert_eq!(app.mode, Mode::Main { pane: Pane::Content });
        key(&mut app, KeyCode::Tab);
        assert_eq!(app.mode, Mode::Main { pane: Pane::Feeds });
        key(&mut app, KeyCode::BackTab);
        assert_eq!(app.mode, Mode::Main { pane: Pane::Content });
        key(&mut app, KeyCode::Left);
        assert_eq!(app.mode, Mode::Main { pane: Pane::Entries });
    }

    #[tokio::test]
    async fn test_help_returns_to_previous_mode() {
        let mut app = test_app().await;
        app.mode = Mode::Main { pane: Pane::Entries };
        key(&mut app, KeyCode::Char('?'));
        assert!(matches!(app.mode, Mode::Help { .. }));
        // other keys are swallowed
        assert!(matches!(handle_key(&mut app, KeyCode::Char('r'), M::NONE), Action::Continue(c) if c.is_empty()));
        key(&mut app, KeyCode::Backspace);
        assert_eq!(app.mode, Mode::Main { pane: Pane::Entries });
    }

    #[tokio::test]
    async fn test_help_from_picker_and_back() {
        let mut app = test_app().await;
        key(&mut app, KeyCode::Char('i'));
        key(&mut app, KeyCode::Char('?'));
        key(&mut app, KeyCode::Esc);
        assert!(matches!(app.mode, Mode::ImportingFeeds { .. }));
    }

    #[tokio::test]
    async fn test_question_mark_is_text_in_add_feed() {
        let mut app = test_app().await;
        key(&mut app, KeyCode::Char('a'));
        for c in "x?q".chars() {
            key(&mut app, KeyCode::Char(c));
        }
        assert_eq!(app.mode, Mode::AddingFeed { input: "x?q".into() });
        key(&mut app, KeyCode::Backspace);
        assert_eq!(app.mode, Mode::AddingFeed { input: "x?".into() });
        key(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, Mode::Main { pane: Pane::Feeds });
    }

    #[tokio::test]
    async fn test_add_feed_submit() {
        let mut app = test_app().await;
        app.mode = Mode::AddingFeed {
            input: " https://example.com/feed.xml ".into(),
        };
        let commands = key(&mut app, KeyCode::Enter);
        assert_eq!(
            commands,
            vec![Command::AddFeed {
                url: "https://example.com/feed.xml".into()
            }]
        );
        assert!(app.loading);
        assert_eq!(app.mode, Mode::Main { pane: Pane::Feeds });
    }

    #[tokio::test]
    async fn test_add_feed_invalid_url_is_input_error() {
        let mut app = test_app().await;
        app.mode = Mode::AddingFeed {
            input: "not a url".into(),
        };
        assert!(key(&mut app, KeyCode::Enter).is_empty());
        assert!(matches!(&app.content, ContentState::Error(msg) if msg.starts_with("Invalid URL")));
        assert!(!app.loading);
    }

    #[tokio::test]
    async fn test_feed_navigation_cascades() {
        let mut app = app_with_feeds().await;
        assert_eq!(key(&mut app, KeyCode::Char('j')), vec![Command::LoadEntries { feed_id: 2 }]);
        assert_eq!(app.current_feed, Some(2));
        assert_eq!(key(&mut app, KeyCode::Up), vec![Command::LoadEntries { feed_id: 1 }]);
        // top edge
        assert!(key(&mut app, KeyCode::Up).is_empty());
    }

    #[tokio::test]
    async fn test_entry_navigation_renders() {
        let mut app = app_with_feeds().await;
        app.replace_entries(FeedSnapshot {
            entries: vec![test_entry(10, 1, 2), test_entry(11, 1, 1)],
            watermark: 0,
        });
        app.mode = Mode::Main { pane: Pane::Entries };
        let commands = key(&mut app, KeyCode::Down);
        assert!(matches!(commands.as_slice(), [Command::RenderEntry { entry, .. }] if entry.id == 11));
    }

    #[tokio::test]
    async fn test_content_keys_scroll() {
        let mut app = app_with_feeds().await;
        app.mode = Mode::Main { pane: Pane::Content };
        app.content = ContentState::Rendered {
            entry_id: 1,
            title: "t".into(),
            width: 80,
            content: crate::render::RenderedContent::plain(&"x\n".repeat(50)),
        };
        app.content_height = 10;
        key(&mut app, KeyCode::Char('j'));
        assert_eq!(app.scroll_offset, 1);
        key_with(&mut app, KeyCode::Char('d'), M::CONTROL);
        assert_eq!(app.scroll_offset, 11);
        key(&mut app, KeyCode::PageUp);
        assert_eq!(app.scroll_offset, 1);
    }

    #[tokio::test]
    async fn test_reorder_moves_selection_with_feed() {
        let mut app = app_with_feeds().await;
        let commands = key_with(&mut app, KeyCode::Down, M::ALT);
        assert!(matches!(commands.as_slice(), [Command::Reorder { .. }]));
        let ids: Vec<i64> = app.feeds.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![2, 1, 3]);
        assert_eq!(app.selected_feed().unwrap().id, 1);
        // no reload of the same feed
        assert_eq!(app.current_feed, Some(1));
    }

    #[tokio::test]
    async fn test_quick_double_move_waits_for_first_write() {
        let mut app = app_with_feeds().await;
        let first = key_with(&mut app, KeyCode::Down, M::ALT);
        assert!(matches!(first.as_slice(), [Command::Reorder { plan }] if plan.moved.id == 1 && plan.neighbor.id == 2));
        assert!(key_with(&mut app, KeyCode::Down, M::ALT).is_empty());
        let ids: Vec<i64> = app.feeds.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        let next = handle_app_event(&mut app, AppEvent::Reordered);
        assert!(matches!(next.as_slice(), [Command::Reorder { plan }] if plan.moved.id == 1 && plan.neighbor.id == 3));
    }

    #[tokio::test]
    async fn test_filter_typing_is_text_not_commands() {
        let mut app = app_with_feeds().await;
        key(&mut app, KeyCode::Char('/'));
        assert_eq!(app.mode, Mode::Filtering { pane: Pane::Feeds });

        // would be help and quit outside the filter
        key(&mut app, KeyCode::Char('?'));
        key(&mut app, KeyCode::Char('q'));
        assert_eq!(app.mode, Mode::Filtering { pane: Pane::Feeds });
        assert_eq!(app.filter(Pane::Feeds), "?q");
        assert!(app.pane_items(Pane::Feeds).is_empty());

        key(&mut app, KeyCode::Backspace);
        key(&mut app, KeyCode::Backspace);
        assert_eq!(app.filter(Pane::Feeds), "");
        assert_eq!(app.pane_items(Pane::Feeds).len(), 3);
    }

    #[tokio::test]
    async fn test_filter_cascades_then_enter_keeps_it() {
        let mut app = app_with_feeds().await;
        key(&mut app, KeyCode::Char('/'));
        assert_eq!(key(&mut app, KeyCode::Char('c')), vec![Command::LoadEntries { feed_id: 3 }]);

        key(&mut app, KeyCode::Enter);
        assert_eq!(app.mode, Mode::Main { pane: Pane::Feeds });
        assert_eq!(app.filter(Pane::Feeds), "c");
        // only one row left to move over
        assert!(key(&mut app, KeyCode::Char('j')).is_empty());
        assert!(key(&mut app, KeyCode::Char('k')).is_empty());

        key(&mut app, KeyCode::Esc);
        assert_eq!(app.filter(Pane::Feeds), "");
        assert_eq!(app.selected_feed().unwrap().id, 3);
        assert_eq!(key(&mut app, KeyCode::Char('k')), vec![Command::LoadEntries { feed_id: 2 }]);
    }

    #[tokio::test]
    async fn test_filter_length_is_capped() {
        let mut app = app_with_feeds().await;
        app.set_filter(Pane::Feeds, "x".repeat(MAX_FILTER_LENGTH));
        app.mode = Mode::Filtering { pane: Pane::Feeds };

        key(&mut app, KeyCode::Char('y'));

        assert_eq!(app.filter(Pane::Feeds).len(), MAX_FILTER_LENGTH);
        assert_eq!(app.status_text().as_deref(), Some("Filter at max length (256 chars)"));
    }

    #[tokio::test]
    async fn test_esc_while_typing_drops_filter() {
        let mut app = app_with_feeds().await;
        app.mode = Mode::Main { pane: Pane::Entries };
        key(&mut app, KeyCode::Char('/'));
        key(&mut app, KeyCode::Char('x'));
        assert_eq!(app.filter(Pane::Entries), "x");

        key(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, Mode::Main { pane: Pane::Entries });
        assert_eq!(app.filter(Pane::Entries), "");
    }

    #[tokio::test]
    async fn test_no_reorder_while_filtered() {
        let mut app = app_with_feeds().await;
        app.set_filter(Pane::Feeds, "a".into());
        assert!(key_with(&mut app, KeyCode::Down, M::ALT).is_empty());
        assert_eq!(app.status_text().as_deref(), Some("Clear the filter to reorder feeds"));
        let ids: Vec<i64> = app.feeds.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_reorder_at_edge_is_noop() {
        let mut app = app_with_feeds().await;
        assert!(key_with(&mut app, KeyCode::Char('k'), M::ALT).is_empty());
    }

    #[tokio::test]
    async fn test_delete_and_refresh_are_pane_local() {
        let mut app = app_with_feeds().await;
        assert!(matches!(
            key(&mut app, KeyCode::Char('d')).as_slice(),
            [Command::DeleteFeed { feed_id: 1, .. }]
        ));
        assert_eq!(key(&mut app, KeyCode::Char('r')), vec![Command::SyncAll]);

        app.mode = Mode::Main { pane: Pane::Entries };
        assert!(key(&mut app, KeyCode::Char('d')).is_empty());
        assert!(matches!(
            key(&mut app, KeyCode::Char('r')).as_slice(),
            [Command::RefreshFeed { feed }] if feed.id == 1
        ));
    }

    #[tokio::test]
    async fn test_open_link_falls_back_to_feed_url() {
        let mut app = app_with_feeds().await;
        assert_eq!(
            key(&mut app, KeyCode::Char('o')),
            vec![Command::OpenUrl {
                url: "https://feed1.example.com/rss".into()
            }]
        );
        app.mode = Mode::Main { pane: Pane::Entries };
        assert!(key(&mut app, KeyCode::Enter).is_empty());
    }

    #[tokio::test]
    async fn test_open_link_rejects_non_http() {
        let mut app = app_with_feeds().await;
        let mut entry = test_entry(10, 1, 1);
        entry.link = "javascript:alert(1)".into();
        app.replace_entries(FeedSnapshot {
            entries: vec![entry],
            watermark: 0,
        });
        assert!(key(&mut app, KeyCode::Enter).is_empty());
        assert!(app.status_message.is_some());
    }

    #[tokio::test]
    async fn test_import_picker_flow() {
        let mut app = test_app().await;
        assert_eq!(
            key(&mut app, KeyCode::Char('i')),
            vec![Command::ListDir {
                dir: PathBuf::from("/home/reader")
            }]
        );

        let dir = PathBuf::from("/home/reader");
        if let Mode::ImportingFeeds { picker } = &mut app.mode {
            picker.apply_listing(
                &dir,
                Ok(vec![
                    crate::picker::PickerEntry {
                        name: "sub".into(),
                        path: dir.join("sub"),
                        is_dir: true,
                    },
                    crate::picker::PickerEntry {
                        name: "feeds.opml".into(),
                        path: dir.join("feeds.opml"),
                        is_dir: false,
                    },
                ]),
            );
        }

        key(&mut app, KeyCode::Char('j'));
        assert_eq!(
            key(&mut app, KeyCode::Enter),
            vec![Command::ImportOpml {
                path: dir.join("feeds.opml")
            }]
        );
        assert!(app.loading);
        assert_eq!(app.mode, Mode::Main { pane: Pane::Feeds });
    }

    #[tokio::test]
    async fn test_picker_parent_and_cancel() {
        let mut app = test_app().await;
        key(&mut app, KeyCode::Char('i'));
        assert_eq!(
            key(&mut app, KeyCode::Char('h')),
            vec![Command::ListDir { dir: PathBuf::from("/home") }]
        );
        key(&mut app, KeyCode::Esc);
        assert_eq!(app.mode, Mode::Main { pane: Pane::Feeds });
    }

    #[tokio::test]
    async fn test_click_focuses_and_selects() {
        let mut app = app_with_feeds().await;
        app.pane_areas = Some([
            Rect::new(0, 0, 20, 10),
            Rect::new(20, 0, 30, 10),
            Rect::new(50, 0, 30, 10),
        ]);
        let click = MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 5,
            row: 3,
            modifiers: M::NONE,
        };
        // border row 0, rows 1.. are items 0..
        assert_eq!(handle_mouse(&mut app, click), vec![Command::LoadEntries { feed_id: 3 }]);

        let click_content = MouseEvent { column: 60, ..click };
        assert!(handle_mouse(&mut app, click_content).is_empty());
        assert_eq!(app.mode, Mode::Main { pane: Pane::Content });
    }

    #[tokio::test]
    async fn test_click_maps_through_filter() {
        let mut app = app_with_feeds().await;
        app.set_filter(Pane::Feeds, "b".into());
        app.pane_areas = Some([
            Rect::new(0, 0, 20, 10),
            Rect::new(20, 0, 30, 10),
            Rect::new(50, 0, 30, 10),
        ]);
        let click = MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column: 5,
            row: 1,
            modifiers: M::NONE,
        };
        // the first drawn row is B, already selected by the filter
        assert!(handle_mouse(&mut app, click).is_empty());
        assert_eq!(app.selected_feed().unwrap().id, 2);
        assert!(handle_mouse(&mut app, MouseEvent { row: 2, ..click }).is_empty());
    }
}
