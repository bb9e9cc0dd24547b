use crate::app::{App, ContentState, Pane, MAX_SCROLL};
use crate::render::Hyperlink;
use crate::util::display_width;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Paragraph, Wrap},
    Frame,
};

use super::render::pane_block;

/// Render the content pane
pub fn render(f: &mut Frame, app: &mut App, area: Rect) {
    let title = match &app.content {
        ContentState::Rendered { title, .. } => title.to_string(),
        _ => "Content".to_string(),
    };
    let block = pane_block(app, Pane::Content, title);
    let inner = block.inner(area);

    // the next render request and the scroll clamp use this frame's size
    app.content_width = inner.width;
    app.content_height = usize::from(inner.height);
    app.clamp_scroll();

    let dim = Style::default().fg(Color::DarkGray);
    let paragraph = match &app.content {
        ContentState::Empty => Paragraph::new(Span::styled("No entry selected", dim)),
        ContentState::Loading { .. } => Paragraph::new(Span::styled("Loading...", dim)),
        ContentState::Error(error) => Paragraph::new(Line::from(Span::styled(
            format!("Error: {}", error),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )))
        .wrap(Wrap { trim: false }),
        // lines are already wrapped to the pane width
        ContentState::Rendered { content, .. } => Paragraph::new(Text::from(content.lines.clone()))
            .scroll((app.scroll_offset.min(MAX_SCROLL) as u16, 0)),
    };
    f.render_widget(paragraph.block(block), area);

    if let ContentState::Rendered { content, .. } = &app.content {
        let buffer = f.buffer_mut();
        for link in &content.links {
            draw_hyperlink(buffer, inner, app.scroll_offset, link);
        }
    }
}

/// Overwrite the cells of a visible link with OSC 8 sequences.
///
/// Each sequence carries two columns of text and lands on the first cell of
/// the pair, so terminals that ignore OSC 8 still show the same text.
fn draw_hyperlink(buffer: &mut Buffer, inner: Rect, scroll: usize, link: &Hyperlink) {
    let Some(row) = link.line.checked_sub(scroll) else {
        return;
    };
    if row >= usize::from(inner.height) || link.column >= usize::from(inner.width) {
        return;
    }
    let y = inner.y + row as u16;
    let mut x = inner.x + link.column as u16;
    let right = inner.right();

    let mut chunk = String::new();
    let mut chunk_width = 0;
    for c in link.text.chars() {
        chunk.push(c);
        chunk_width += display_width(c.encode_utf8(&mut [0; 4]));
        if chunk_width >= 2 {
            if x + chunk_width as u16 > right {
                return;
            }
            buffer[(x, y)].set_symbol(&link.wrap(&chunk));
            x += chunk_width as u16;
            chunk.clear();
            chunk_width = 0;
        }
    }
    if !chunk.is_empty() && x + chunk_width as u16 <= right {
        buffer[(x, y)].set_symbol(&link.wrap(&chunk));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(line: usize, column: usize, text: &str) -> Hyperlink {
        Hyperlink {
            line,
            column,
            text: text.to_string(),
            url: "https://x/a".to_string(),
        }
    }

    #[test]
    fn test_link_cells_carry_osc8() {
        let area = Rect::new(0, 0, 20, 3);
        let mut buffer = Buffer::empty(area);
        draw_hyperlink(&mut buffer, area, 0, &link(1, 2, "abcde"));

        assert_eq!(buffer[(2, 1)].symbol(), "\x1b]8;;https://x/a\x1b\\ab\x1b]8;;\x1b\\");
        assert_eq!(buffer[(4, 1)].symbol(), "\x1b]8;;https://x/a\x1b\\cd\x1b]8;;\x1b\\");
        assert_eq!(buffer[(6, 1)].symbol(), "\x1b]8;;https://x/a\x1b\\e\x1b]8;;\x1b\\");
        assert_eq!(buffer[(8, 1)].symbol(), " ");
    }

    #[test]
    fn test_link_above_viewport_skipped() {
        let area = Rect::new(0, 0, 20, 3);
        let mut buffer = Buffer::empty(area);
        draw_hyperlink(&mut buffer, area, 5, &link(1, 0, "ab"));
        draw_hyperlink(&mut buffer, area, 0, &link(3, 0, "ab"));
        assert!(buffer.content().iter().all(|cell| cell.symbol() == " "));
    }

    #[test]
    fn test_link_clipped_at_right_edge() {
        let area = Rect::new(0, 0, 4, 1);
        let mut buffer = Buffer::empty(area);
        draw_hyperlink(&mut buffer, area, 0, &link(0, 1, "abcdef"));
        assert!(buffer[(1, 0)].symbol().contains("ab"));
        assert_eq!(buffer[(3, 0)].symbol(), " ");
    }
}
