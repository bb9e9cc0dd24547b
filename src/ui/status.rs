use crate::app::App;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::Paragraph,
    Frame,
};

const PILL: &str = " lazyrss ";
const HELP_HINT: &str = " ? help ";

/// Render the status bar: name pill, status text, help hint
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    // Status bar needs at least 1 char width to be meaningful
    if area.width < 1 || area.height < 1 {
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(PILL.len() as u16),
            Constraint::Min(0),
            Constraint::Length(HELP_HINT.len() as u16),
        ])
        .split(area);

    let bar = Style::default().bg(Color::DarkGray).fg(Color::White);

    f.render_widget(
        Paragraph::new(Span::styled(
            PILL,
            Style::default()
                .bg(Color::Cyan)
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )),
        chunks[0],
    );

    let text = app
        .status_text()
        .map(|text| format!(" {}", text))
        .unwrap_or_default();
    f.render_widget(Paragraph::new(text).style(bar), chunks[1]);

    f.render_widget(
        Paragraph::new(HELP_HINT).style(bar.add_modifier(Modifier::DIM)),
        chunks[2],
    );
}
