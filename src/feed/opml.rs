use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::feed::{Source, SourceList};
use crate::util::validate_url;

/// SEC-003: Maximum allowed nesting depth for OPML outline elements.
/// Prevents stack overflow attacks from maliciously crafted deeply nested OPMLs.
const MAX_OPML_DEPTH: usize = 50;

/// Errors that can occur while reading the subscription list.
#[derive(Debug, Error)]
pub enum OpmlError {
    /// SEC-003: OPML nesting depth exceeds safety limit.
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    /// XML parsing failed.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// File I/O error.
    #[error("Failed to read OPML file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<quick_xml::Error> for OpmlError {
    fn from(e: quick_xml::Error) -> Self {
        OpmlError::XmlParse(e.to_string())
    }
}

/// A feed subscription extracted from an OPML file.
///
/// Represents a single `<outline>` element with an `xmlUrl` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Display title for the feed. Sourced from `title` attribute,
    /// falling back to `text` attribute, then to the XML URL itself.
    pub title: String,
    /// URL of the RSS/Atom feed XML. Validated to be HTTP(S) and not
    /// pointing to localhost or private IP ranges.
    pub xml_url: String,
}

/// Parses an OPML file from disk and extracts feed subscriptions.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the content is not valid
/// XML, or outlines are nested deeper than 50 levels.
///
/// # Security
///
/// - XXE (XML External Entity) attacks are mitigated because `quick-xml` (0.37) does not
///   parse `<!ENTITY>` declarations. Custom entities cause `EscapeError::UnrecognizedEntity`.
/// - URLs are validated to prevent SSRF attacks against localhost and private networks
pub async fn parse(path: &Path) -> Result<Vec<Subscription>, OpmlError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| OpmlError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    parse_opml_content(&content)
}

/// Parses OPML content and extracts feed subscriptions.
///
/// Feeds are returned in document order, from any `<outline>` with an
/// `xmlUrl` attribute regardless of nesting depth. Category outlines
/// (those without `xmlUrl`) are traversed but not returned. A URL listed
/// more than once is kept at its first position only.
pub fn parse_opml_content(content: &str) -> Result<Vec<Subscription>, OpmlError> {
    // SEC-002: quick-xml (0.37) never parses <!ENTITY> declarations from DOCTYPE.
    // `decode_and_unescape_value()` only resolves the 5 XML builtins.
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut feeds = Vec::new();
    let mut seen = HashSet::new();
    let mut buf = Vec::new();
    // SEC-003: Track nesting depth to prevent stack overflow from malicious OPMLs
    let mut depth: usize = 0;

    loop {
        let outline = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"outline" => {
                depth += 1;
                if depth > MAX_OPML_DEPTH {
                    return Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH));
                }
                parse_outline_attributes(&e, &reader)?
            }
            // Self-closing outline doesn't affect depth
            Ok(Event::Empty(e)) if e.name().as_ref() == b"outline" => {
                parse_outline_attributes(&e, &reader)?
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"outline" => {
                depth = depth.saturating_sub(1);
                None
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => None,
        };

        if let Some(feed) = outline {
            if seen.insert(feed.xml_url.clone()) {
                feeds.push(feed);
            } else {
                tracing::debug!(url = %feed.xml_url, "Duplicate subscription ignored");
            }
        }
        buf.clear();
    }

    Ok(feeds)
}

/// Returns `Some(Subscription)` if the outline has a valid `xmlUrl`
/// attribute, `None` for folders and rejected URLs.
fn parse_outline_attributes(
    e: &quick_xml::events::BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<Option<Subscription>, OpmlError> {
    let mut xml_url = None;
    let mut title = None;

    for attr_result in e.attributes() {
        let attr = match attr_result {
            Ok(attr) => attr,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed OPML attribute");
                continue;
            }
        };
        let decoder = reader.decoder();
        match attr.key.as_ref() {
            b"xmlUrl" => xml_url = Some(attr.decode_and_unescape_value(decoder)?.to_string()),
            b"title" => title = Some(attr.decode_and_unescape_value(decoder)?.to_string()),
            b"text" => {
                if title.is_none() {
                    title = Some(attr.decode_and_unescape_value(decoder)?.to_string())
                }
            }
            _ => {}
        }
    }

    let Some(url) = xml_url else {
        return Ok(None);
    };

    match validate_url(&url) {
        Ok(_) => Ok(Some(Subscription {
            title: title.unwrap_or_else(|| url.clone()),
            xml_url: url,
        })),
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Skipping invalid feed URL");
            Ok(None)
        }
    }
}

/// Subscription list backed by an OPML file on disk.
///
/// The file is re-read on every [`SourceList::load`], so edits take effect
/// on the next run without restarting anything.
#[derive(Debug, Clone)]
pub struct OpmlSourceList {
    path: PathBuf,
}

impl OpmlSourceList {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SourceList for OpmlSourceList {
    async fn load(&self) -> Result<Vec<Source>, OpmlError> {
        let subscriptions = parse(&self.path).await?;
        tracing::info!(
            path = %self.path.display(),
            feeds = subscriptions.len(),
            "Loaded subscriptions"
        );
        Ok(subscriptions
            .into_iter()
            .map(|s| Source::new(s.xml_url).with_title(s.title))
            .collect())
    }
}
