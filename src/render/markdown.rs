//! Markdown to styled terminal lines.
//!
//! [`TerminalRenderer`] walks `pulldown-cmark` events and word-wraps prose at
//! the requested width. Code blocks are hard-wrapped instead, so indentation
//! survives. Unknown constructs (raw HTML, footnotes, math) are dropped.

use pulldown_cmark::{Event, Options, Parser, Tag};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use thiserror::Error;

use super::links::{PLACEHOLDER_CLOSE, PLACEHOLDER_OPEN};
use crate::util::display_width;

/// Narrowest width the renderer accepts.
pub const MIN_RENDER_WIDTH: u16 = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("Cannot render at width {0}: need at least 8 columns")]
    TooNarrow(u16),
}

/// Something that turns markdown into lines no wider than `width`.
///
/// The link pipeline only relies on this contract, so tests can swap in a
/// renderer that fails on purpose.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, markdown: &str, width: u16) -> Result<Vec<Line<'static>>, RenderError>;
}

/// Production renderer backed by `pulldown-cmark`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalRenderer;

impl MarkdownRenderer for TerminalRenderer {
    fn render(&self, markdown: &str, width: u16) -> Result<Vec<Line<'static>>, RenderError> {
        if width < MIN_RENDER_WIDTH {
            return Err(RenderError::TooNarrow(width));
        }

        let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
        let mut writer = Writer::new(usize::from(width));
        for event in Parser::new_ext(markdown, options) {
            writer.event(event);
        }
        Ok(writer.finish())
    }
}

/// What an `Event::Start` opened, so the matching `Event::End` knows what to undo.
enum Frame {
    Block,
    Heading,
    Quote,
    Code,
    List,
    Item,
    Inline,
    Other,
}

struct Writer {
    width: usize,
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    /// Spans at the front of `spans` that belong to the prefix
    prefix_spans: usize,
    /// Whether the prefix for the current line has been emitted
    started: bool,
    line_width: usize,
    text_width: usize,
    pending_space: bool,
    frames: Vec<Frame>,
    styles: Vec<Style>,
    prefixes: Vec<String>,
    lists: Vec<Option<u64>>,
    pending_bullet: Option<String>,
}

impl Writer {
    fn new(width: usize) -> Self {
        Self {
            width,
            lines: Vec::new(),
            spans: Vec::with_capacity(4),
            prefix_spans: 0,
            started: false,
            line_width: 0,
            text_width: 0,
            pending_space: false,
            frames: Vec::new(),
            styles: Vec::new(),
            prefixes: Vec::new(),
            lists: Vec::new(),
            pending_bullet: None,
        }
    }

    fn style(&self) -> Style {
        self.styles.last().copied().unwrap_or_default()
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(_) => self.end(),
            Event::Text(text) => {
                if matches!(self.frames.last(), Some(Frame::Code)) {
                    self.code_text(&text);
                } else {
                    self.push_words(&text, self.style());
                }
            }
            Event::Code(code) => {
                let style = self.style().patch(Style::default().fg(Color::Yellow));
                self.push_words(&format!("`{}`", code), style);
            }
            Event::SoftBreak => self.pending_space = true,
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(self.width),
                    Style::default().fg(Color::DarkGray),
                )));
                self.blank();
            }
            Event::TaskListMarker(done) => {
                self.push_word(if done { "[x]" } else { "[ ]" }, self.style());
                self.pending_space = true;
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        let frame = match tag {
            Tag::Paragraph => {
                self.flush();
                Frame::Block
            }
            Tag::Heading { .. } => {
                self.flush();
                let style = self
                    .style()
                    .add_modifier(Modifier::BOLD)
                    .fg(Color::Cyan);
                self.styles.push(style);
                Frame::Heading
            }
            Tag::BlockQuote(_) => {
                self.flush();
                self.prefixes.push("│ ".to_string());
                Frame::Quote
            }
            Tag::CodeBlock(_) => {
                self.flush();
                Frame::Code
            }
            Tag::List(first) => {
                self.flush();
                self.lists.push(first);
                Frame::List
            }
            Tag::Item => {
                self.flush();
                let bullet = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let bullet = format!("{}. ", n);
                        *n += 1;
                        bullet
                    }
                    _ => "• ".to_string(),
                };
                self.prefixes.push(" ".repeat(display_width(&bullet)));
                self.pending_bullet = Some(bullet);
                Frame::Item
            }
            Tag::Emphasis => self.inline(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.inline(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => self.inline(Style::default().add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link { .. } => self.inline(Style::default().add_modifier(Modifier::UNDERLINED)),
            Tag::Image { .. } => {
                let style = self.style().patch(Style::default().fg(Color::Blue));
                self.push_word("[img]", style);
                self.pending_space = true;
                self.inline(Style::default().fg(Color::Blue))
            }
            _ => Frame::Other,
        };
        self.frames.push(frame);
    }

    fn inline(&mut self, patch: Style) -> Frame {
        let style = self.style().patch(patch);
        self.styles.push(style);
        Frame::Inline
    }

    fn end(&mut self) {
        match self.frames.pop() {
            Some(Frame::Block) => {
                self.flush();
                self.blank();
            }
            Some(Frame::Heading) => {
                self.styles.pop();
                self.flush();
                self.blank();
            }
            Some(Frame::Quote) => {
                self.flush();
                self.prefixes.pop();
                self.blank();
            }
            Some(Frame::Code) => {
                self.flush();
                self.blank();
            }
            Some(Frame::List) => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            Some(Frame::Item) => {
                self.flush();
                self.prefixes.pop();
                self.pending_bullet = None;
            }
            Some(Frame::Inline) => {
                self.styles.pop();
            }
            Some(Frame::Other) | None => {}
        }
    }

    /// Emit the quote bars, list indentation and bullet for a fresh line
    fn begin_line(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        let bullet = self.pending_bullet.take();
        let indent_end = if bullet.is_some() {
            self.prefixes.len().saturating_sub(1)
        } else {
            self.prefixes.len()
        };
        let indent = self.prefixes[..indent_end].concat();
        if !indent.is_empty() {
            self.line_width += display_width(&indent);
            self.spans
                .push(Span::styled(indent, Style::default().fg(Color::DarkGray)));
        }
        if let Some(bullet) = bullet {
            self.line_width += display_width(&bullet);
            self.spans.push(Span::raw(bullet));
        }
        self.prefix_spans = self.spans.len();
    }

    fn append(&mut self, s: &str, style: Style) {
        let width = display_width(s);
        self.line_width += width;
        self.text_width += width;
        let has_text = self.spans.len() > self.prefix_spans;
        match self.spans.last_mut() {
            Some(last) if has_text && last.style == style => {
                last.content.to_mut().push_str(s);
            }
            _ => self.spans.push(Span::styled(s.to_string(), style)),
        }
    }

    fn push_words(&mut self, text: &str, style: Style) {
        for (i, word) in text.split(' ').enumerate() {
            if i > 0 {
                self.pending_space = true;
            }
            if !word.is_empty() {
                self.push_word(word, style);
            }
        }
    }

    fn push_word(&mut self, word: &str, style: Style) {
        let width = display_width(word);
        let space = usize::from(self.pending_space && self.text_width > 0);
        if self.text_width > 0 && self.line_width + space + width > self.width {
            self.flush();
        }
        self.begin_line();
        if self.pending_space && self.text_width > 0 {
            self.append(" ", style);
        }
        self.pending_space = false;

        if self.line_width + width > self.width {
            self.push_chars(word, style);
        } else {
            self.append(word, style);
        }
    }

    /// Hard-wrap character by character, for words wider than a line and for
    /// code. A link placeholder moves as one unit and is never split.
    fn push_chars(&mut self, text: &str, style: Style) {
        for unit in wrap_units(text) {
            let width = display_width(unit);
            if self.text_width > 0 && self.line_width + width > self.width {
                self.flush();
            }
            self.begin_line();
            self.append(unit, style);
        }
    }

    fn code_text(&mut self, text: &str) {
        let style = Style::default().fg(Color::Yellow);
        for piece in text.split_inclusive('\n') {
            let (body, newline) = match piece.strip_suffix('\n') {
                Some(body) => (body, true),
                None => (piece, false),
            };
            self.begin_line();
            self.push_chars(&body.replace('\t', "    "), style);
            if newline {
                self.break_line();
            }
        }
    }

    fn reset_line(&mut self) {
        self.started = false;
        self.prefix_spans = 0;
        self.line_width = 0;
        self.text_width = 0;
        self.pending_space = false;
    }

    /// End the current line if it holds any text
    fn flush(&mut self) {
        if self.text_width > 0 {
            self.lines.push(Line::from(std::mem::take(&mut self.spans)));
        } else {
            self.spans.clear();
        }
        self.reset_line();
    }

    /// End the current line even when empty (blank lines inside code)
    fn break_line(&mut self) {
        self.begin_line();
        self.lines.push(Line::from(std::mem::take(&mut self.spans)));
        self.reset_line();
    }

    fn blank(&mut self) {
        if self.lines.last().is_some_and(|line| line.width() > 0) {
            self.lines.push(Line::default());
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.lines.last().is_some_and(|line| line.width() == 0) {
            self.lines.pop();
        }
        self.lines
    }
}

/// Single characters, except that a whole `OPEN id CLOSE` placeholder is one unit
/// Characters of `text`, except that a whole placeholder is one item
fn wrap_units(text: &str) -> impl Iterator<Item = &str> {
    let mut rest = text;
    std::iter::from_fn(move || {
        let c = rest.chars().next()?;
        let len = if c == PLACEHOLDER_OPEN {
            rest.find(PLACEHOLDER_CLOSE)
                .map_or(c.len_utf8(), |end| end + PLACEHOLDER_CLOSE.len_utf8())
        } else {
            c.len_utf8()
        };
        let (unit, tail) = rest.split_at(len);
        rest = tail;
        Some(unit)
    })
}
