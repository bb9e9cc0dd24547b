use crate::app::{App, Mode, Pane, PaneItem};
use crate::util::strip_control_chars;
use std::borrow::Cow;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, ListState},
    Frame,
};

use super::render::pane_block;

/// Render the feed or entry list panel
pub fn render(f: &mut Frame, app: &mut App, pane: Pane, area: Rect) {
    let Some(slot) = pane.list_slot() else {
        return;
    };
    let selected = app.visible_selection(pane);

    let items: Vec<ListItem> = app.pane_items(pane).into_iter().map(list_item).collect();
    let is_empty = items.is_empty();
    let title = list_title(app, pane, items.len());
    let block = pane_block(app, pane, title);

    if is_empty {
        let placeholder = match pane {
            _ if !app.filter(pane).is_empty() => "No matches",
            Pane::Feeds => "No feeds. Press a to add one, i to import.",
            _ => "No entries",
        };
        let list = List::new([ListItem::new(Span::styled(
            placeholder,
            Style::default().fg(Color::DarkGray),
        ))])
        .block(block);
        f.render_widget(list, area);
        app.list_offsets[slot] = 0;
        return;
    }

    let list = List::new(items).block(block).highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    );

    let mut state = ListState::default()
        .with_selected(selected)
        .with_offset(app.list_offsets[slot]);
    f.render_stateful_widget(list, area, &mut state);
    app.list_offsets[slot] = state.offset();
}

/// `Feeds (3)`, or `Feeds (1/3) /rust` while a filter is set
fn list_title(app: &App, pane: Pane, shown: usize) -> String {
    let (name, total) = match pane {
        Pane::Feeds => (Cow::Borrowed("Feeds"), app.feeds.len()),
        _ => match app.current_feed() {
            Some(feed) => (strip_control_chars(&feed.title), app.entries.len()),
            None => return "Entries".to_string(),
        },
    };
    let filter = app.filter(pane);
    let typing = app.mode == Mode::Filtering { pane };
    match (filter.is_empty(), typing) {
        (true, false) => format!("{} ({})", name, total),
        (_, true) => format!("{} ({}/{}) /{}_", name, shown, total, filter),
        (false, false) => format!("{} ({}/{}) /{}", name, shown, total, filter),
    }
}

fn list_item(item: PaneItem<'_>) -> ListItem<'static> {
    match item {
        PaneItem::Feed(feed) => {
            let title = strip_control_chars(&feed.title).into_owned();
            if feed.unread_count > 0 {
                ListItem::new(Line::from(vec![
                    Span::styled(title, Style::default().add_modifier(Modifier::BOLD)),
                    Span::styled(
                        format!(" ({})", feed.unread_count),
                        Style::default().fg(Color::Cyan),
                    ),
                ]))
            } else {
                ListItem::new(Line::from(title))
            }
        }
        PaneItem::Entry(item) => {
            let title = strip_control_chars(&item.entry.title).into_owned();
            let (marker, style) = if item.unread {
                (
                    Span::styled("● ", Style::default().fg(Color::Cyan)),
                    Style::default().add_modifier(Modifier::BOLD),
                )
            } else if item.entry.read {
                (Span::raw("  "), Style::default().fg(Color::DarkGray))
            } else {
                (Span::raw("  "), Style::default())
            };
            ListItem::new(Line::from(vec![marker, Span::styled(title, style)]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{test_app, test_feed};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_title_counts_shown_rows_and_filter() {
        let mut app = test_app().await;
        app.replace_feeds(vec![test_feed(1, "Rust"), test_feed(2, "News"), test_feed(3, "Go")]);
        assert_eq!(list_title(&app, Pane::Feeds, 3), "Feeds (3)");

        app.set_filter(Pane::Feeds, "rust".into());
        assert_eq!(list_title(&app, Pane::Feeds, 1), "Feeds (1/3) /rust");

        app.mode = Mode::Filtering { pane: Pane::Feeds };
        assert_eq!(list_title(&app, Pane::Feeds, 1), "Feeds (1/3) /rust_");
        assert_eq!(list_title(&app, Pane::Entries, 0), "Entries");
    }
}
