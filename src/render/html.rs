//! HTML feed bodies to markdown.
//!
//! `html2text` produces markdown-flavoured text with links as numbered
//! references (`[text][1]` plus a trailing `[1]: url` list). The reference
//! list is folded back into inline `[text](url)` links so the link pipeline
//! can see them.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};

/// Wrap width handed to html2text; the markdown renderer re-wraps anyway
const CONVERT_WIDTH: usize = 200;

fn footnote() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[(\d+)\]:\s*(\S+)\s*$").expect("footnote pattern is valid"))
}

fn reference() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]*)\]\[(\d+)\]").expect("reference pattern is valid"))
}

/// Convert an HTML fragment to markdown with inline links.
pub fn html_to_markdown(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let text = html2text::from_read(html.as_bytes(), CONVERT_WIDTH);
    inline_references(&text)
}

/// Rewrite `[text][n]` using the trailing `[n]: url` lines, which are removed
fn inline_references(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut refs: HashMap<&str, &str> = HashMap::new();
    let mut body_end = lines.len();

    while body_end > 0 {
        let line = lines[body_end - 1];
        if line.trim().is_empty() {
            body_end -= 1;
            continue;
        }
        match footnote().captures(line) {
            Some(caps) => {
                if let (Some(n), Some(url)) = (caps.get(1), caps.get(2)) {
                    refs.insert(n.as_str(), url.as_str());
                }
                body_end -= 1;
            }
            None => break,
        }
    }

    let body = lines[..body_end]
        .iter()
        .map(|line| {
            // horizontal rules come back as a run of box-drawing dashes
            if !line.is_empty() && line.chars().all(|c| c == '─') {
                "***"
            } else {
                line
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    reference()
        .replace_all(&body, |caps: &Captures<'_>| match refs.get(&caps[2]) {
            Some(url) => format!("[{}]({})", &caps[1], url),
            None => caps[0].to_string(),
        })
        .into_owned()
}
