use crate::feed::parser::{parse_feed, RawFeed};
use crate::feed::Source;
use futures::stream::StreamExt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinError;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default response body cap.
pub const DEFAULT_MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while fetching a single feed.
///
/// These are always scoped to one source. The fetch stage as a whole never
/// fails because of them; see [`fetch_all`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Body could not be parsed as RSS, Atom or JSON Feed
    #[error("Parse error: {0}")]
    Parse(String),
    /// Response body exceeded the configured size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Outcome of fetching one source.
///
/// `fetch_all` produces exactly one of these per input source.
#[derive(Debug)]
pub struct FetchOutcome {
    /// The source this outcome belongs to
    pub source: Source,
    /// The parsed feed, or the error that stopped it
    pub result: Result<RawFeed, FetchError>,
}

/// Something that can turn a [`Source`] into a [`RawFeed`].
///
/// Implementations are shared across fetch tasks, so they must be
/// `Send + Sync` and their futures `Send`.
pub trait FeedSource: Send + Sync + 'static {
    fn fetch(&self, source: &Source) -> impl Future<Output = Result<RawFeed, FetchError>> + Send;
}

/// Fetches feeds over HTTP(S) with a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFeedSource {
    client: reqwest::Client,
    timeout: Duration,
    max_feed_size: usize,
}

impl HttpFeedSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: DEFAULT_TIMEOUT,
            max_feed_size: DEFAULT_MAX_FEED_SIZE,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_feed_size(mut self, max_feed_size: usize) -> Self {
        self.max_feed_size = max_feed_size;
        self
    }
}

impl HttpFeedSource {
    async fn download(&self, source: &Source) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(source.as_str()).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, self.max_feed_size).await
    }
}

impl FeedSource for HttpFeedSource {
    /// Fetches and parses one feed. A single attempt; any failure is final.
    ///
    /// The timeout covers the whole exchange, headers and body together.
    async fn fetch(&self, source: &Source) -> Result<RawFeed, FetchError> {
        let bytes = tokio::time::timeout(self.timeout, self.download(source))
            .await
            .map_err(|_| FetchError::Timeout)??;

        parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))
    }
}

/// Fetches every source concurrently and waits for all of them to settle.
///
/// One task is spawned per source before any of them is awaited. Each task
/// owns the slot for its source position, so the returned outcomes are in
/// input order regardless of completion order.
///
/// # Errors
///
/// Individual fetch failures are reported inside each [`FetchOutcome`].
/// `Err` is returned only when a fetch task itself could not be joined
/// (it panicked or was cancelled), in which case the whole stage is lost.
pub async fn fetch_all<F: FeedSource>(
    fetcher: Arc<F>,
    sources: &[Source],
) -> Result<Vec<FetchOutcome>, JoinError> {
    let handles: Vec<_> = sources
        .iter()
        .cloned()
        .map(|source| {
            let fetcher = Arc::clone(&fetcher);
            tokio::spawn(async move {
                let started = Instant::now();
                let result = fetcher.fetch(&source).await;
                match &result {
                    Ok(feed) => tracing::debug!(
                        feed = %source,
                        items = feed.items.len(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Fetched feed"
                    ),
                    Err(e) => tracing::debug!(
                        feed = %source,
                        error = %e,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Feed fetch failed"
                    ),
                }
                FetchOutcome { source, result }
            })
        })
        .collect();

    futures::future::join_all(handles)
        .await
        .into_iter()
        .collect()
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}
