//! Render functions for the TUI.
//!
//! Draws the three panes and the status bar, then the overlay of the active
//! mode on top.

use crate::app::{App, Mode, Pane};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use super::{content, dialogs, help, lists, status};

/// Minimum terminal dimensions required for normal operation.
pub(super) const MIN_WIDTH: u16 = 60;
pub(super) const MIN_HEIGHT: u16 = 10;

/// Bordered block for a pane, highlighted when focused
pub(super) fn pane_block(app: &App, pane: Pane, title: String) -> Block<'static> {
    let border_style = if app.pane() == Some(pane) {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title)
}

/// Main render dispatch function.
pub(super) fn render(f: &mut Frame, app: &mut App) {
    let area = f.area();

    // Guard against zero-width/height to prevent panics
    if area.width < 1 || area.height < 1 {
        return;
    }

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        app.pane_areas = None;
        let msg = if area.height < 3 || area.width < 20 {
            Paragraph::new("Too small")
        } else {
            Paragraph::new(format!(
                "Terminal too small\n\nMinimum: {}x{}\nCurrent: {}x{}",
                MIN_WIDTH, MIN_HEIGHT, area.width, area.height
            ))
            .alignment(Alignment::Center)
        };
        f.render_widget(msg, area);
        return;
    }

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1)])
        .split(area);

    let panes = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(25),
            Constraint::Percentage(30),
            Constraint::Percentage(45),
        ])
        .split(rows[0]);

    app.pane_areas = Some([panes[0], panes[1], panes[2]]);

    lists::render(f, app, Pane::Feeds, panes[0]);
    lists::render(f, app, Pane::Entries, panes[1]);
    content::render(f, app, panes[2]);
    status::render(f, app, rows[1]);

    let app = &*app;
    render_overlay(f, app, &app.mode);
}

fn render_overlay(f: &mut Frame, app: &App, mode: &Mode) {
    match mode {
        Mode::Main { .. } | Mode::Filtering { .. } => {}
        Mode::AddingFeed { input } => dialogs::render_add_feed(f, input),
        Mode::ImportingFeeds { picker } => dialogs::render_picker(f, picker),
        Mode::Help { previous } => {
            render_overlay(f, app, previous);
            help::render(f, app);
        }
    }
}
