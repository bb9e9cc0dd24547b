//! Add-feed prompt and OPML import picker overlays.

use crate::picker::FilePicker;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

use super::help::centered_rect;

fn dialog_block(title: &str) -> Block<'_> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(title)
}

/// Render the add-feed prompt centered on screen.
pub fn render_add_feed(f: &mut Frame, input: &str) {
    let area = f.area();
    let width = 60u16.min(area.width.saturating_sub(4));
    let height = 7u16.min(area.height.saturating_sub(2));
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    let overlay = Rect::new(x, y, width, height);

    if overlay.width < 20 || overlay.height < 5 {
        return;
    }

    f.render_widget(Clear, overlay);

    let text = vec![
        Line::from("Feed URL:"),
        Line::from(""),
        Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Cyan)),
            Span::raw(input.to_string()),
            Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "(Enter) Add  (Esc) Cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    f.render_widget(Paragraph::new(text).block(dialog_block(" Add Feed ")), overlay);
}

/// Render the import file picker.
pub fn render_picker(f: &mut Frame, picker: &FilePicker) {
    let overlay = centered_rect(70, 70, f.area());
    if overlay.width < 20 || overlay.height < 5 {
        return;
    }

    f.render_widget(Clear, overlay);

    let title = format!(" Import OPML: {} ", picker.dir.display());
    let block = dialog_block(&title);
    let dim = Style::default().fg(Color::DarkGray);

    if picker.loading {
        f.render_widget(Paragraph::new(Span::styled("Loading...", dim)).block(block), overlay);
        return;
    }
    if let Some(error) = &picker.error {
        f.render_widget(
            Paragraph::new(Span::styled(format!("Error: {}", error), Style::default().fg(Color::Red)))
                .block(block),
            overlay,
        );
        return;
    }
    if picker.entries.is_empty() {
        f.render_widget(
            Paragraph::new(Span::styled("No .opml or .xml files here", dim)).block(block),
            overlay,
        );
        return;
    }

    let items: Vec<ListItem> = picker
        .entries
        .iter()
        .map(|entry| {
            if entry.is_dir {
                ListItem::new(Span::styled(
                    format!("{}/", entry.name),
                    Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
                ))
            } else {
                ListItem::new(entry.name.clone())
            }
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));
    let mut state = ListState::default().with_selected(Some(picker.selected));
    f.render_stateful_widget(list, overlay, &mut state);
}
