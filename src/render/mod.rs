//! Entry rendering for the content pane.
//!
//! HTML bodies go through [`html::html_to_markdown`], then the link pipeline
//! in [`links`], which wraps the generic [`markdown`] renderer.

pub mod html;
pub mod links;
pub mod markdown;

pub use links::{render_links, Hyperlink, RenderedContent};
pub use markdown::{MarkdownRenderer, RenderError, TerminalRenderer};

use chrono::{DateTime, Local};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

use crate::storage::Entry;
use crate::util::{strip_control_chars, truncate_to_width};

const NO_CONTENT: &str = "No content available.";

/// Render an entry with the production renderer
pub fn render_entry(entry: &Entry, width: u16) -> RenderedContent {
    render_entry_with(entry, &TerminalRenderer, width)
}

/// Render an entry as metadata header, description, then content.
///
/// The description is dimmed. Content identical to the description is shown
/// once. With neither, a placeholder notice follows the header.
pub fn render_entry_with(entry: &Entry, renderer: &dyn MarkdownRenderer, width: u16) -> RenderedContent {
    let mut out = meta_header(entry, width);

    let description = body_markdown(&entry.description);
    let content = body_markdown(&entry.content);
    let mut has_body = false;

    if !description.trim().is_empty() {
        let mut rendered = render_links(&description, renderer, width);
        for span in rendered.lines.iter_mut().flat_map(|l| l.spans.iter_mut()) {
            span.style = span.style.add_modifier(Modifier::DIM | Modifier::ITALIC);
        }
        push_section(&mut out, rendered);
        has_body = true;
    }

    if !content.trim().is_empty() && content.trim() != description.trim() {
        push_section(&mut out, render_links(&content, renderer, width));
        has_body = true;
    }

    if !has_body {
        push_section(
            &mut out,
            RenderedContent {
                lines: vec![Line::from(Span::styled(
                    NO_CONTENT,
                    Style::default().fg(Color::DarkGray),
                ))],
                links: Vec::new(),
            },
        );
    }

    out
}

fn body_markdown(raw: &str) -> String {
    let clean = strip_control_chars(raw);
    let markdown = html::html_to_markdown(&clean);
    strip_control_chars(&markdown).into_owned()
}

fn push_section(out: &mut RenderedContent, section: RenderedContent) {
    if section.is_empty() {
        return;
    }
    if !out.is_empty() {
        out.lines.push(Line::default());
    }
    out.append(section);
}

/// Format a unix timestamp as `Mon, 02 Jan 2006 15:04` in local time
pub fn format_timestamp(ts: i64) -> Option<String> {
    DateTime::from_timestamp(ts, 0).map(|utc| {
        utc.with_timezone(&Local)
            .format("%a, %d %b %Y %H:%M")
            .to_string()
    })
}

fn meta_header(entry: &Entry, width: u16) -> RenderedContent {
    let mut out = RenderedContent::default();
    let dim = Style::default().fg(Color::DarkGray);

    if let Some(date) = format_timestamp(entry.published_at) {
        out.lines.push(Line::from(Span::styled(date, dim)));
    }

    let link = strip_control_chars(&entry.link);
    if !link.is_empty() {
        let text = truncate_to_width(&link, usize::from(width)).into_owned();
        out.links.push(Hyperlink {
            line: out.lines.len(),
            column: 0,
            text: text.clone(),
            url: link.into_owned(),
        });
        out.lines.push(Line::from(Span::styled(
            text,
            Style::default()
                .fg(Color::Blue)
                .add_modifier(Modifier::UNDERLINED),
        )));
    }

    out
}
