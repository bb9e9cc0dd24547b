use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

use crate::storage::{Feed, NewFeed};
use crate::util::validate_url;

/// Maximum allowed nesting depth for outline elements.
/// Rejects maliciously deep documents before they exhaust memory.
const MAX_OPML_DEPTH: usize = 50;

/// OPML files larger than this are refused (subscription lists are tiny)
const MAX_OPML_SIZE: u64 = 5 * 1024 * 1024;

const EXPORT_TITLE: &str = "lazyrss feeds";

#[derive(Debug, Error)]
pub enum OpmlError {
    #[error("XML parse error: {0}")]
    Xml(String),

    #[error("OPML I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    #[error("Failed to generate OPML: {0}")]
    Generate(String),
}

/// One `<outline>` element and everything nested under it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outline {
    pub text: String,
    pub title: String,
    pub kind: String,
    pub xml_url: String,
    pub html_url: String,
    pub children: Vec<Outline>,
}

impl Outline {
    pub fn is_feed(&self) -> bool {
        self.kind.eq_ignore_ascii_case("rss") || !self.xml_url.trim().is_empty()
    }

    /// Title, else text, else the feed URL
    pub fn display_title(&self) -> &str {
        [&self.title, &self.text, &self.xml_url]
            .into_iter()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
            .unwrap_or_default()
    }
}

impl From<&Feed> for Outline {
    fn from(feed: &Feed) -> Self {
        Self {
            text: feed.title.to_string(),
            title: feed.title.to_string(),
            kind: "rss".to_string(),
            xml_url: feed.url.clone(),
            html_url: String::new(),
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpmlDocument {
    pub title: Option<String>,
    pub outlines: Vec<Outline>,
}

/// Parse an OPML document into its outline tree.
///
/// quick-xml never expands `<!ENTITY>` declarations, only the five XML
/// builtins, so external entity tricks surface as parse errors.
pub fn parse_opml(content: &str) -> Result<OpmlDocument, OpmlError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut document = OpmlDocument::default();
    // Open outlines, innermost last
    let mut open: Vec<Outline> = Vec::new();
    let mut in_head_title = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"outline" => {
                if open.len() >= MAX_OPML_DEPTH {
                    return Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH));
                }
                open.push(read_outline(&e, &reader)?);
            }
            Ok(Event::Empty(e)) if e.name().as_ref() == b"outline" => {
                let outline = read_outline(&e, &reader)?;
                attach(&mut open, &mut document.outlines, outline);
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"outline" => {
                if let Some(outline) = open.pop() {
                    attach(&mut open, &mut document.outlines, outline);
                }
            }
            Ok(Event::Start(e)) if e.name().as_ref() == b"title" && open.is_empty() => {
                in_head_title = true;
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"title" => {
                in_head_title = false;
            }
            Ok(Event::Text(e)) if in_head_title => {
                let text = e.unescape().map_err(|e| OpmlError::Xml(e.to_string()))?;
                document.title = Some(text.into_owned());
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpmlError::Xml(e.to_string())),
            _ => {}
        }
    }

    // Unclosed outlines at EOF still count
    while let Some(outline) = open.pop() {
        attach(&mut open, &mut document.outlines, outline);
    }

    Ok(document)
}

fn attach(open: &mut [Outline], roots: &mut Vec<Outline>, outline: Outline) {
    match open.last_mut() {
        Some(parent) => parent.children.push(outline),
        None => roots.push(outline),
    }
}

fn read_outline(e: &BytesStart<'_>, reader: &Reader<&[u8]>) -> Result<Outline, OpmlError> {
    let mut outline = Outline::default();

    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed OPML attribute");
                continue;
            }
        };
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|e| OpmlError::Xml(e.to_string()))?
            .into_owned();
        match attr.key.as_ref() {
            b"text" => outline.text = value,
            b"title" => outline.title = value,
            b"type" => outline.kind = value,
            b"xmlUrl" => outline.xml_url = value,
            b"htmlUrl" => outline.html_url = value,
            _ => {}
        }
    }

    Ok(outline)
}

/// Feed outlines in document order, searched at every depth.
///
/// Folder outlines are not returned themselves but their children are.
/// A feed outline that also has children contributes both.
pub fn flatten(outlines: &[Outline]) -> Vec<Outline> {
    fn walk(outlines: &[Outline], out: &mut Vec<Outline>) {
        for outline in outlines {
            if outline.is_feed() {
                out.push(Outline {
                    children: Vec::new(),
                    ..outline.clone()
                });
            }
            walk(&outline.children, out);
        }
    }

    let mut out = Vec::new();
    walk(outlines, &mut out);
    out
}

/// Turn flattened outlines into rows for `Database::add_feeds`.
///
/// Outlines without a usable http(s) `xmlUrl` are skipped with a warning.
pub fn import_candidates(outlines: &[Outline]) -> Vec<NewFeed> {
    outlines
        .iter()
        .filter_map(|outline| {
            let url = outline.xml_url.trim();
            if let Err(e) = validate_url(url) {
                tracing::warn!(url = %url, error = %e, "Skipping OPML outline with invalid feed URL");
                return None;
            }
            Some(NewFeed {
                url: url.to_string(),
                title: outline.display_title().to_string(),
                description: String::new(),
            })
        })
        .collect()
}

/// Serialize outlines as an OPML 2.0 document
pub fn generate(outlines: &[Outline]) -> Result<String, OpmlError> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(fail)?;

    let mut opml = BytesStart::new("opml");
    opml.push_attribute(("version", "2.0"));
    writer.write_event(Event::Start(opml)).map_err(fail)?;

    writer
        .write_event(Event::Start(BytesStart::new("head")))
        .map_err(fail)?;
    writer
        .write_event(Event::Start(BytesStart::new("title")))
        .map_err(fail)?;
    writer
        .write_event(Event::Text(BytesText::new(EXPORT_TITLE)))
        .map_err(fail)?;
    writer
        .write_event(Event::End(BytesEnd::new("title")))
        .map_err(fail)?;
    writer
        .write_event(Event::End(BytesEnd::new("head")))
        .map_err(fail)?;

    writer
        .write_event(Event::Start(BytesStart::new("body")))
        .map_err(fail)?;
    for outline in outlines {
        write_outline(&mut writer, outline)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("body")))
        .map_err(fail)?;
    writer
        .write_event(Event::End(BytesEnd::new("opml")))
        .map_err(fail)?;

    String::from_utf8(writer.into_inner().into_inner()).map_err(fail)
}

fn fail(e: impl std::fmt::Display) -> OpmlError {
    OpmlError::Generate(e.to_string())
}

fn write_outline(writer: &mut Writer<Cursor<Vec<u8>>>, outline: &Outline) -> Result<(), OpmlError> {
    let mut element = BytesStart::new("outline");
    element.push_attribute(("text", outline.text.as_str()));
    for (key, value) in [
        ("title", &outline.title),
        ("type", &outline.kind),
        ("xmlUrl", &outline.xml_url),
        ("htmlUrl", &outline.html_url),
    ] {
        if !value.is_empty() {
            element.push_attribute((key, value.as_str()));
        }
    }

    if outline.children.is_empty() {
        return writer.write_event(Event::Empty(element)).map_err(fail);
    }

    writer.write_event(Event::Start(element)).map_err(fail)?;
    for child in &outline.children {
        write_outline(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("outline")))
        .map_err(fail)
}

pub async fn read_file(path: &Path) -> Result<String, OpmlError> {
    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > MAX_OPML_SIZE {
        return Err(OpmlError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{} is larger than {} bytes", path.display(), MAX_OPML_SIZE),
        )));
    }
    Ok(tokio::fs::read_to_string(path).await?)
}

/// Write `contents` to `path` atomically.
///
/// The parent directory is created if needed. Data goes to a uniquely named
/// sibling temp file, is synced, then renamed over the destination, so the
/// destination is never left half-written.
pub async fn write_file(path: &Path, contents: &str) -> Result<(), OpmlError> {
    use std::time::{SystemTime, UNIX_EPOCH};
    use tokio::io::AsyncWriteExt;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", suffix));

    let result = async {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await?;
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temp_path, path).await
    }
    .await;

    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    Ok(())
}
