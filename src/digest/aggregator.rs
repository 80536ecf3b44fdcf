use chrono::{DateTime, TimeZone};
use serde::Serialize;

use crate::digest::filter::is_from_yesterday;
use crate::feed::{FetchOutcome, RawFeed, RawItem, Source};

/// A fetched feed cut down to the items published yesterday.
///
/// Never empty: feeds with no qualifying items are dropped by [`aggregate`]
/// instead of being materialized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QualifyingFeed {
    source: Source,
    title: Option<String>,
    link: Option<String>,
    items: Vec<RawItem>,
}

impl QualifyingFeed {
    /// Keeps the items of `feed` that pass the filter, in their original
    /// order. Returns `None` when nothing survives.
    fn from_raw<Tz: TimeZone>(source: Source, feed: RawFeed, now: &DateTime<Tz>) -> Option<Self> {
        let items: Vec<RawItem> = feed
            .items
            .into_iter()
            .filter(|item| is_from_yesterday(item.published.as_ref(), now))
            .collect();

        if items.is_empty() {
            return None;
        }

        Some(Self {
            source,
            title: feed.title,
            link: feed.link,
            items,
        })
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Title used for ordering. A missing title compares as `""`.
    pub fn sort_key(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    pub fn items(&self) -> &[RawItem] {
        &self.items
    }
}

/// Yesterday's feeds, ordered by title.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Digest {
    feeds: Vec<QualifyingFeed>,
}

impl Digest {
    pub fn feeds(&self) -> &[QualifyingFeed] {
        &self.feeds
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    /// Total qualifying items across all feeds.
    pub fn item_count(&self) -> usize {
        self.feeds.iter().map(|f| f.items.len()).sum()
    }
}

impl<'a> IntoIterator for &'a Digest {
    type Item = &'a QualifyingFeed;
    type IntoIter = std::slice::Iter<'a, QualifyingFeed>;

    fn into_iter(self) -> Self::IntoIter {
        self.feeds.iter()
    }
}

/// Builds the digest from one run's fetch outcomes.
///
/// Failed outcomes contribute nothing. Each successful feed keeps only the
/// items published yesterday relative to `now`, and is dropped if none
/// remain. Survivors are sorted by title with a stable sort, so feeds with
/// equal titles stay in the order their outcomes were given, which
/// [`fetch_all`](crate::feed::fetch_all) fixes to source-list order.
///
/// Titles compare byte-wise, which for UTF-8 is code point order:
/// case-sensitive, uppercase before lowercase.
pub fn aggregate<Tz: TimeZone>(outcomes: Vec<FetchOutcome>, now: &DateTime<Tz>) -> Digest {
    let mut feeds: Vec<QualifyingFeed> = outcomes
        .into_iter()
        .filter_map(|outcome| {
            let feed = outcome.result.ok()?;
            QualifyingFeed::from_raw(outcome.source, feed, now)
        })
        .collect();

    feeds.sort_by(|a, b| a.sort_key().cmp(b.sort_key()));

    Digest { feeds }
}
