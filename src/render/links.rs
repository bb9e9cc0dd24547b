//! Hyperlink-preserving rendering.
//!
//! The markdown renderer knows nothing about links, and the content pane
//! cannot show `[text](url)` inline without drowning the prose. So links are
//! swapped for opaque placeholders before rendering and swapped back for
//! styled spans afterwards, with a [`Hyperlink`] record per link so the pane
//! can emit OSC 8 sequences over the right cells.

use std::borrow::Cow;
use std::ops::Range;
use std::sync::OnceLock;

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};
use regex::{Captures, Regex};

use super::markdown::MarkdownRenderer;
use crate::util::{display_width, truncate_to_width};

/// Opens a placeholder. Private use, so it never appears in real prose.
pub const PLACEHOLDER_OPEN: char = '\u{E000}';
/// Closes a placeholder.
pub const PLACEHOLDER_CLOSE: char = '\u{E001}';

fn nested_image_link() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[!\[([^\]]*)\]\([^)]+\)\]\(([^)]+)\)").expect("nested image pattern is valid")
    })
}

fn link_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(!)?\[([^\]]*)\]\(\s*([^\s)]+)(?:\s+["'][^"']*["'])?\s*\)"#)
            .expect("link pattern is valid")
    })
}

/// One link pulled out of the text by [`tokenize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkToken {
    pub text: String,
    pub url: String,
    pub is_image: bool,
}

/// Text with links replaced by placeholders, plus the side table.
///
/// `links[n]` belongs to the placeholder carrying id `n`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokenized {
    pub text: String,
    pub links: Vec<LinkToken>,
}

/// A rendered link and where it sits in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperlink {
    pub line: usize,
    /// Display column of the first cell
    pub column: usize,
    pub text: String,
    pub url: String,
}

impl Hyperlink {
    /// OSC 8 hyperlink: `ESC ]8;;URL ESC \ TEXT ESC ]8;; ESC \`
    pub fn escape_sequence(&self) -> String {
        self.wrap(&self.text)
    }

    /// The same sequence around a piece of the link text, for drawing the
    /// link a few cells at a time
    pub fn wrap(&self, text: &str) -> String {
        let url: String = self.url.chars().filter(|c| !c.is_control()).collect();
        format!("\x1b]8;;{}\x1b\\{}\x1b]8;;\x1b\\", url, text)
    }
}

/// Styled lines ready for the content pane.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedContent {
    pub lines: Vec<Line<'static>>,
    pub links: Vec<Hyperlink>,
}

impl RenderedContent {
    /// Unstyled lines of `text`, no links
    pub fn plain(text: &str) -> Self {
        Self {
            lines: text.lines().map(|l| Line::from(l.to_string())).collect(),
            links: Vec::new(),
        }
    }

    /// Append `other` below, shifting its link rows
    pub fn append(&mut self, other: RenderedContent) {
        let offset = self.lines.len();
        self.links.extend(other.links.into_iter().map(|mut link| {
            link.line += offset;
            link
        }));
        self.lines.extend(other.lines);
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Collapse linked images `[![alt](img)](link)` to `![alt](link)`.
///
/// ```
/// use lazyrss::render::links::normalize;
///
/// assert_eq!(
///     normalize("[![Alt](https://x/img.png)](https://x/page)"),
///     "![Alt](https://x/page)"
/// );
/// ```
pub fn normalize(markdown: &str) -> Cow<'_, str> {
    nested_image_link().replace_all(markdown, "![${1}](${2})")
}

fn placeholder(id: usize) -> String {
    format!("{}{}{}", PLACEHOLDER_OPEN, id, PLACEHOLDER_CLOSE)
}

fn is_sentinel(c: char) -> bool {
    c == PLACEHOLDER_OPEN || c == PLACEHOLDER_CLOSE
}

/// Replace every inline link and image with a numbered placeholder.
///
/// Backslash-escaped constructs (`\[text](url)`) and anything inside code
/// spans or fenced code blocks are left alone. Sentinel characters already
/// present in the input are removed first.
pub fn tokenize(markdown: &str) -> Tokenized {
    let clean: String = markdown.chars().filter(|c| !is_sentinel(*c)).collect();
    let code = code_ranges(&clean);
    let mut links = Vec::new();

    let text = link_pattern()
        .replace_all(&clean, |caps: &Captures<'_>| {
            let start = caps.get(0).map_or(0, |m| m.start());
            if code.iter().any(|range| range.contains(&start)) {
                return caps[0].to_string();
            }
            let escaped = is_escaped(&clean, start);
            let bang = caps.get(1).is_some();
            if escaped && !bang {
                return caps[0].to_string();
            }
            // `\![a](u)` is a literal `!` followed by a plain link
            let is_image = bang && !escaped;
            let label = caps[2].trim();
            let text = match (label.is_empty(), is_image) {
                (false, _) => label.to_string(),
                (true, true) => "Image".to_string(),
                (true, false) => "Link".to_string(),
            };
            let id = links.len();
            links.push(LinkToken {
                text,
                url: caps[3].to_string(),
                is_image,
            });
            if bang && escaped {
                format!("!{}", placeholder(id))
            } else {
                placeholder(id)
            }
        })
        .into_owned();

    Tokenized { text, links }
}

/// An odd run of backslashes before `at` escapes the character there
fn is_escaped(text: &str, at: usize) -> bool {
    let backslashes = text[..at].bytes().rev().take_while(|&b| b == b'\\').count();
    backslashes % 2 == 1
}

/// Byte ranges of fenced code blocks and inline code spans, where link
/// syntax is literal text.
fn code_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    // (start offset, fence char, fence length) of the open block
    let mut fence: Option<(usize, u8, usize)> = None;
    let mut prose_start = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start_matches(' ');
        let indented = line.len() - trimmed.len() > 3;
        let run = if indented { None } else { fence_run(trimmed) };
        match (fence, run) {
            (None, Some((c, n))) => {
                inline_code_spans(text, prose_start..offset, &mut ranges);
                fence = Some((offset, c, n));
            }
            (Some((start, c, n)), Some((rc, rn))) if rc == c && rn >= n && trimmed[rn..].trim().is_empty() => {
                ranges.push(start..offset + line.len());
                fence = None;
                prose_start = offset + line.len();
            }
            _ => {}
        }
        offset += line.len();
    }

    match fence {
        Some((start, _, _)) => ranges.push(start..text.len()),
        None => inline_code_spans(text, prose_start..text.len(), &mut ranges),
    }
    ranges
}

/// Fence character and length when `line` opens or closes a code fence
fn fence_run(line: &str) -> Option<(u8, usize)> {
    let c = *line.as_bytes().first().filter(|&&b| b == b'`' || b == b'~')?;
    let n = line.bytes().take_while(|&b| b == c).count();
    (n >= 3).then_some((c, n))
}

/// Backtick-delimited spans inside `within`; an opening run closes on the
/// next run of the same length. Unclosed runs are literal.
fn inline_code_spans(text: &str, within: Range<usize>, ranges: &mut Vec<Range<usize>>) {
    let bytes = text.as_bytes();
    let backtick_run = |from: usize| from + bytes[from..within.end].iter().take_while(|&&b| b == b'`').count();

    let mut i = within.start;
    while i < within.end {
        if bytes[i] != b'`' {
            i += 1;
            continue;
        }
        let open = i;
        i = backtick_run(open);
        let len = i - open;

        let mut j = i;
        while j < within.end {
            if bytes[j] != b'`' {
                j += 1;
                continue;
            }
            let run_end = backtick_run(j);
            if run_end - j == len {
                ranges.push(open..run_end);
                i = run_end;
                break;
            }
            j = run_end;
        }
    }
}

fn link_style() -> Style {
    Style::default()
        .fg(Color::Blue)
        .add_modifier(Modifier::UNDERLINED)
}

struct Segment {
    text: String,
    style: Style,
    link: Option<usize>,
}

impl Segment {
    fn is_space(&self) -> bool {
        self.link.is_none() && self.text.trim().is_empty()
    }
}

fn push_plain(segments: &mut Vec<Segment>, text: &str, style: Style) {
    let text: String = text.chars().filter(|c| !is_sentinel(*c)).collect();
    if text.is_empty() {
        return;
    }
    if let Some(last) = segments.last_mut() {
        if last.link.is_none() && last.style == style {
            last.text.push_str(&text);
            return;
        }
    }
    segments.push(Segment {
        text,
        style,
        link: None,
    });
}

/// `12\u{E001}rest` -> (12, bytes up to and including the close)
fn parse_placeholder(s: &str) -> Option<(usize, usize)> {
    let end = s.find(PLACEHOLDER_CLOSE)?;
    let digits = &s[..end];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let id = digits.parse().ok()?;
    Some((id, end + PLACEHOLDER_CLOSE.len_utf8()))
}

fn split_line(line: &Line<'_>, links: &[LinkToken]) -> Vec<Segment> {
    let mut segments = Vec::new();
    for span in &line.spans {
        let style = line.style.patch(span.style);
        let mut rest: &str = &span.content;
        while let Some(start) = rest.find(PLACEHOLDER_OPEN) {
            push_plain(&mut segments, &rest[..start], style);
            let after = &rest[start + PLACEHOLDER_OPEN.len_utf8()..];
            match parse_placeholder(after) {
                Some((id, consumed)) if id < links.len() => {
                    let token = &links[id];
                    let text = if token.is_image {
                        format!("[img] {}", token.text)
                    } else {
                        token.text.clone()
                    };
                    segments.push(Segment {
                        text,
                        style: style.patch(link_style()),
                        link: Some(id),
                    });
                    rest = &after[consumed..];
                }
                _ => rest = after,
            }
        }
        push_plain(&mut segments, rest, style);
    }
    segments
}

/// Break plain segments into runs of spaces and runs of non-spaces
fn words(segments: Vec<Segment>) -> Vec<Segment> {
    let mut out = Vec::new();
    for segment in segments {
        if segment.link.is_some() {
            out.push(segment);
            continue;
        }
        let text = segment.text.as_str();
        let mut start = 0;
        let mut prev_space: Option<bool> = None;
        for (i, c) in text.char_indices() {
            let space = c == ' ';
            if prev_space.is_some_and(|p| p != space) {
                out.push(Segment {
                    text: text[start..i].to_string(),
                    style: segment.style,
                    link: None,
                });
                start = i;
            }
            prev_space = Some(space);
        }
        if start < text.len() {
            out.push(Segment {
                text: text[start..].to_string(),
                style: segment.style,
                link: None,
            });
        }
    }
    out
}

fn trim_trailing_space(line: &mut Vec<Segment>) {
    while line.last().is_some_and(Segment::is_space) {
        line.pop();
    }
}

/// Greedy re-wrap where every link is a single unbreakable word
fn reflow(segments: Vec<Segment>, width: usize) -> Vec<Vec<Segment>> {
    let mut out = Vec::new();
    let mut current: Vec<Segment> = Vec::new();
    let mut used = 0;

    for mut piece in words(segments) {
        let piece_width = display_width(&piece.text);
        if used > 0 && used + piece_width > width {
            trim_trailing_space(&mut current);
            out.push(std::mem::take(&mut current));
            used = 0;
        }
        if used == 0 && piece.is_space() {
            continue;
        }
        if piece_width > width {
            piece.text = truncate_to_width(&piece.text, width).into_owned();
        }
        used += display_width(&piece.text);
        current.push(piece);
    }
    trim_trailing_space(&mut current);
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn is_blank(line: &Line<'_>) -> bool {
    line.spans.iter().all(|s| s.content.trim().is_empty())
}

/// Swap placeholders in rendered `lines` back for styled link text.
///
/// Placeholders the renderer dropped are simply absent from the output.
/// Leading and trailing blank lines are trimmed. A line that grows past
/// `width` is re-wrapped without splitting any link.
pub fn rehydrate(lines: Vec<Line<'static>>, links: &[LinkToken], width: u16) -> RenderedContent {
    let width = usize::from(width);
    let first = lines.iter().position(|l| !is_blank(l));
    let last = lines.iter().rposition(|l| !is_blank(l));
    let (Some(first), Some(last)) = (first, last) else {
        return RenderedContent::default();
    };

    let mut out = RenderedContent::default();
    for line in &lines[first..=last] {
        let segments = split_line(line, links);
        let line_width: usize = segments.iter().map(|s| display_width(&s.text)).sum();
        let rows = if line_width > width {
            reflow(segments, width)
        } else {
            vec![segments]
        };

        for row in rows {
            let line_index = out.lines.len();
            let mut column = 0;
            let mut spans = Vec::with_capacity(row.len());
            for segment in row {
                if let Some(id) = segment.link {
                    out.links.push(Hyperlink {
                        line: line_index,
                        column,
                        text: segment.text.clone(),
                        url: links[id].url.clone(),
                    });
                }
                column += display_width(&segment.text);
                match spans.last_mut() {
                    Some(Span { content, style }) if segment.link.is_none() && *style == segment.style => {
                        content.to_mut().push_str(&segment.text);
                    }
                    _ => spans.push(Span::styled(segment.text, segment.style)),
                }
            }
            out.lines.push(Line::from(spans));
        }
    }
    out
}

/// Normalize, tokenize, render and rehydrate `markdown`.
///
/// If the renderer fails the text comes back unstyled, one line per input line.
pub fn render_links(markdown: &str, renderer: &dyn MarkdownRenderer, width: u16) -> RenderedContent {
    let normalized = normalize(markdown);
    let tokenized = tokenize(&normalized);
    match renderer.render(&tokenized.text, width) {
        Ok(lines) => rehydrate(lines, &tokenized.links, width),
        Err(e) => {
            tracing::debug!(error = %e, width, "Markdown render failed, showing plain text");
            RenderedContent::plain(markdown)
        }
    }
}
