use chrono::{DateTime, Utc};
use feed_rs::parser;
use serde::Serialize;

/// A feed as fetched, before any filtering.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawFeed {
    /// Channel title. `None` when the feed omits it or leaves it blank.
    pub title: Option<String>,
    /// Link to the feed's website, if the feed declares one.
    pub link: Option<String>,
    /// Entries in document order.
    pub items: Vec<RawItem>,
}

/// One entry of a [`RawFeed`].
///
/// Only `published` takes part in filtering; the other fields are carried
/// through untouched for rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RawItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub published: Option<DateTime<Utc>>,
}

/// Parses RSS, Atom or JSON Feed bytes into a [`RawFeed`].
///
/// Entry dates use `published`, falling back to `updated` (Atom feeds often
/// carry only the latter). Dates feed-rs cannot parse come through as `None`.
pub fn parse_feed(bytes: &[u8]) -> Result<RawFeed, parser::ParseFeedError> {
    let feed = parser::parse(bytes)?;

    let items = feed
        .entries
        .into_iter()
        .map(|entry| {
            let link = entry.links.first().map(|l| l.href.clone());
            let published = entry.published.or(entry.updated);
            let summary = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body));

            RawItem {
                title: entry.title.map(|t| t.content).and_then(non_blank),
                link,
                summary,
                published,
            }
        })
        .collect();

    Ok(RawFeed {
        title: feed.title.map(|t| t.content).and_then(non_blank),
        link: feed.links.first().map(|l| l.href.clone()),
        items,
    })
}

fn non_blank(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == s.len() {
        Some(s)
    } else {
        Some(trimmed.to_string())
    }
}
