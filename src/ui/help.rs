//! Help overlay: the live keybinding table.
//!
//! Lists every binding grouped by context, including user overrides from the
//! config file. Also shows the fixed keys of the dialogs and the list filter.

use crate::app::App;
use crate::keybindings::Context;
use ratatui::{
    layout::{Constraint, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Row, Table},
    Frame,
};

/// Context display order for the help screen.
const CONTEXT_ORDER: [Context; 4] = [Context::Global, Context::Feeds, Context::Entries, Context::Content];

/// Keys of the add-feed prompt and the import picker, which are not remappable
const DIALOG_KEYS: [(&str, &str); 6] = [
    ("Enter", "Add feed / open directory / import file"),
    ("Esc", "Cancel dialog"),
    ("Enter/Esc", "Keep / drop list filter while typing"),
    ("h/Left/Bksp", "Parent directory (import)"),
    ("j/k", "Move in file list (import)"),
    ("?/q/Esc", "Close help"),
];

/// Render the help overlay on top of the current view.
pub fn render(f: &mut Frame, app: &App) {
    let overlay = centered_rect(80, 80, f.area());
    if overlay.width < 20 || overlay.height < 6 {
        return;
    }

    f.render_widget(Clear, overlay);

    let bindings = app.keybindings.all_bindings();
    let heading = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);

    let mut rows: Vec<Row> = Vec::new();
    for ctx in CONTEXT_ORDER {
        let ctx_bindings: Vec<_> = bindings.iter().filter(|(c, _, _, _)| *c == ctx).collect();
        if ctx_bindings.is_empty() {
            continue;
        }

        rows.push(Row::new(vec![
            Line::from(Span::styled(format!("-- {} --", ctx.label()), heading)),
            Line::from(""),
        ]));
        for (_, key_str, _action, description) in ctx_bindings {
            rows.push(Row::new(vec![format!("  {}", key_str), description.to_string()]));
        }
        rows.push(Row::new(vec![String::new(), String::new()]));
    }

    rows.push(Row::new(vec![
        Line::from(Span::styled("-- Dialogs --", heading)),
        Line::from(""),
    ]));
    for (key, description) in DIALOG_KEYS {
        rows.push(Row::new(vec![format!("  {}", key), description.to_string()]));
    }

    let widths = [Constraint::Length(16), Constraint::Min(20)];
    let table = Table::new(rows, widths)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(" Help (? to close) "),
        )
        .header(
            Row::new(vec!["Key", "Action"])
                .style(
                    Style::default()
                        .add_modifier(Modifier::BOLD)
                        .add_modifier(Modifier::UNDERLINED),
                )
                .bottom_margin(1),
        );

    f.render_widget(table, overlay);
}

/// Create a centered rectangle with the given percentage of the parent area.
pub(super) fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let width = area.width * percent_x / 100;
    let height = area.height * percent_y / 100;
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width, height)
}
