use feed_rs::parser;

use crate::storage::NewEntry;

/// A fetched feed, ready to be merged into storage
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub entries: Vec<NewEntry>,
    /// Items dropped because they carried no usable link
    pub skipped: usize,
}

/// Parse RSS/Atom bytes.
///
/// Timestamps fall back from `published` to `updated` to `now`. The entry
/// link is the first `<link>`, else the item id when that id is itself an
/// http(s) URL (common for RSS `<guid isPermaLink>`). Items with neither
/// are skipped since the link is the dedup key.
pub fn parse_feed(bytes: &[u8], now: i64) -> Result<ParsedFeed, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;
    let mut skipped = 0usize;

    let entries = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let link = entry
                .links
                .first()
                .map(|l| l.href.trim().to_string())
                .filter(|href| !href.is_empty())
                .or_else(|| permalink_id(&entry.id));
            let Some(link) = link else {
                skipped += 1;
                return None;
            };

            let published_at = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.timestamp())
                .unwrap_or(now);

            Some(NewEntry {
                title: entry.title.map(|t| t.content).unwrap_or_default(),
                link,
                description: entry.summary.map(|s| s.content).unwrap_or_default(),
                content: entry.content.and_then(|c| c.body).unwrap_or_default(),
                published_at,
            })
        })
        .collect();

    Ok(ParsedFeed {
        title: feed.title.map(|t| t.content).filter(|t| !t.trim().is_empty()),
        description: feed
            .description
            .map(|d| d.content)
            .filter(|d| !d.trim().is_empty()),
        entries,
        skipped,
    })
}

fn permalink_id(id: &str) -> Option<String> {
    let id = id.trim();
    let parsed = url::Url::parse(id).ok()?;
    matches!(parsed.scheme(), "http" | "https").then(|| id.to_string())
}
