//! Feed sources: where subscriptions come from and how they are fetched.
//!
//! - [`opml`] - Reads the OPML subscription list into [`Source`]s
//! - [`fetcher`] - Concurrent HTTP retrieval, one outcome per source
//! - [`parser`] - RSS/Atom parsing via `feed-rs`
//!
//! # Example
//!
//! ```ignore
//! use letter::feed::{fetch_all, HttpFeedSource, OpmlSourceList, SourceList};
//!
//! let sources = OpmlSourceList::new("feeds.opml").load().await?;
//! let outcomes = fetch_all(Arc::new(HttpFeedSource::new(client)), &sources).await?;
//! ```

mod fetcher;
mod opml;
mod parser;

use serde::{Serialize, Serializer};
use std::fmt;
use std::future::Future;

pub use fetcher::{
    fetch_all, FeedSource, FetchError, FetchOutcome, HttpFeedSource, DEFAULT_MAX_FEED_SIZE,
    DEFAULT_TIMEOUT,
};
pub use opml::{parse, parse_opml_content, OpmlError, OpmlSourceList, Subscription};
pub use parser::{parse_feed, RawFeed, RawItem};

/// One subscribed feed: its URL and, when the subscription list names it,
/// a display title.
///
/// Serializes as the bare URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Source {
    url: String,
    title: Option<String>,
}

impl Source {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
        }
    }

    /// Attaches the title the subscription list gives this feed.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }
}

impl Serialize for Source {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.url)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

impl From<&str> for Source {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

/// Resolves the list of sources to fetch for one run.
pub trait SourceList: Send + Sync {
    fn load(&self) -> impl Future<Output = Result<Vec<Source>, OpmlError>> + Send;
}

/// A fixed, in-memory list of sources.
impl SourceList for Vec<Source> {
    async fn load(&self) -> Result<Vec<Source>, OpmlError> {
        Ok(self.clone())
    }
}
