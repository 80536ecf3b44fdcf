use chrono::{DateTime, Local, TimeZone};
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinError;

use crate::delivery::{Deliver, DeliveryError};
use crate::digest::aggregator::{aggregate, Digest};
use crate::digest::filter::yesterday;
use crate::feed::{fetch_all, FeedSource, OpmlError, SourceList};

/// Stage-level failures of a run.
///
/// A single feed failing to fetch or parse is not one of these; it only
/// shrinks the digest.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The subscription list could not be read or parsed.
    #[error("Problem reading the subscription list: {0}")]
    SourceList(#[from] OpmlError),
    /// The fetch stage itself broke down (a fetch task panicked or was cancelled).
    #[error("Problem getting feed posts: {0}")]
    FetchAggregation(#[from] JoinError),
    /// The digest was built but could not be delivered.
    #[error("Problem delivering the digest: {0}")]
    Delivery(#[from] DeliveryError),
}

/// How a successful run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A digest was handed to the delivery channel.
    Delivered { feeds: usize, items: usize },
    /// Nothing was published yesterday (or there was nothing to fetch).
    NoContent,
}

/// One run of the daily digest: resolve sources, fetch, aggregate, deliver.
pub struct DigestPipeline<L, F, D> {
    sources: L,
    fetcher: Arc<F>,
    delivery: D,
}

impl<L, F, D> DigestPipeline<L, F, D>
where
    L: SourceList,
    F: FeedSource,
    D: Deliver,
{
    pub fn new(sources: L, fetcher: F, delivery: D) -> Self {
        Self {
            sources,
            fetcher: Arc::new(fetcher),
            delivery,
        }
    }

    /// Runs against the local system clock.
    pub async fn run(&self) -> Result<RunOutcome, PipelineError> {
        self.run_at(&Local::now()).await
    }

    /// Runs with `now` as the reference time for "yesterday".
    ///
    /// Delivery is invoked at most once, and only with a non-empty digest.
    /// Delivery errors are returned as-is, never retried.
    pub async fn run_at<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
    ) -> Result<RunOutcome, PipelineError> {
        let digest = self.build_digest(now).await?;
        if digest.is_empty() {
            return Ok(RunOutcome::NoContent);
        }

        let feeds = digest.len();
        let items = digest.item_count();
        self.delivery.deliver(&digest, now.date_naive()).await?;
        tracing::info!(feeds, items, "Digest delivered");

        Ok(RunOutcome::Delivered { feeds, items })
    }

    /// Resolves sources, fetches them all and aggregates yesterday's items.
    ///
    /// An empty source list short-circuits to an empty digest without any
    /// fetch. Per-source failures are logged and otherwise ignored.
    pub async fn build_digest<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
    ) -> Result<Digest, PipelineError> {
        let sources = self.sources.load().await?;
        if sources.is_empty() {
            tracing::info!("No subscriptions, nothing to fetch");
            return Ok(Digest::default());
        }

        let outcomes = fetch_all(Arc::clone(&self.fetcher), &sources).await?;

        let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
        for outcome in &outcomes {
            if let Err(e) = &outcome.result {
                tracing::warn!(feed = %outcome.source, error = %e, "Skipping feed");
            }
        }

        let digest = aggregate(outcomes, now);
        tracing::info!(
            sources = sources.len(),
            failed,
            feeds = digest.len(),
            items = digest.item_count(),
            day = ?yesterday(now),
            "Aggregated feeds"
        );

        Ok(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{FetchError, RawFeed, RawItem, Source};
    use chrono::{FixedOffset, NaiveDate, Utc};
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2026, 10, 17, 8, 0, 0)
            .unwrap()
    }

    fn dated(title: &str, published: &str) -> RawItem {
        RawItem {
            title: Some(title.to_string()),
            link: None,
            summary: None,
            published: Some(published.parse::<DateTime<Utc>>().unwrap()),
        }
    }

    fn feed(title: &str, items: Vec<RawItem>) -> RawFeed {
        RawFeed {
            title: Some(title.to_string()),
            link: None,
            items,
        }
    }

    /// Serves canned feeds by URL; anything unknown fails with a 404.
    #[derive(Default)]
    struct StubFetcher {
        feeds: HashMap<String, RawFeed>,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn with(mut self, url: &str, feed: RawFeed) -> Self {
            self.feeds.insert(url.to_string(), feed);
            self
        }
    }

    impl FeedSource for StubFetcher {
        async fn fetch(&self, source: &Source) -> Result<RawFeed, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.feeds
                .get(source.as_str())
                .cloned()
                .ok_or(FetchError::HttpStatus(404))
        }
    }

    #[derive(Default)]
    struct RecordingDelivery {
        sent: Mutex<Vec<(Digest, NaiveDate)>>,
    }

    impl Deliver for RecordingDelivery {
        async fn deliver(&self, digest: &Digest, today: NaiveDate) -> Result<(), DeliveryError> {
            self.sent.lock().unwrap().push((digest.clone(), today));
            Ok(())
        }
    }

    struct FailingDelivery;

    impl Deliver for FailingDelivery {
        async fn deliver(&self, _digest: &Digest, _today: NaiveDate) -> Result<(), DeliveryError> {
            Err(DeliveryError::Io(std::io::Error::other("mail server down")))
        }
    }

    struct BrokenList;

    impl SourceList for BrokenList {
        async fn load(&self) -> Result<Vec<Source>, OpmlError> {
            Err(OpmlError::XmlParse("unexpected end of file".to_string()))
        }
    }

    fn sources(urls: &[&str]) -> Vec<Source> {
        urls.iter().map(|u| Source::new(*u)).collect()
    }

    #[tokio::test]
    async fn test_mixed_run_delivers_sorted_digest() {
        let fetcher = StubFetcher::default()
            .with("https://a", feed("Zeta", vec![dated("z", "2026-10-16T09:00:00Z")]))
            .with(
                "https://c",
                feed(
                    "Alpha",
                    vec![
                        dated("yesterday", "2026-10-16T09:00:00Z"),
                        dated("today", "2026-10-17T07:00:00Z"),
                    ],
                ),
            );
        let pipeline = DigestPipeline::new(
            sources(&["https://a", "https://b", "https://c"]),
            fetcher,
            RecordingDelivery::default(),
        );

        let outcome = pipeline.run_at(&now()).await.unwrap();
        assert_eq!(outcome, RunOutcome::Delivered { feeds: 2, items: 2 });

        let sent = pipeline.delivery.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (digest, today) = &sent[0];
        assert_eq!(*today, NaiveDate::from_ymd_opt(2026, 10, 17).unwrap());
        let titles: Vec<_> = digest.feeds().iter().map(|f| f.title()).collect();
        assert_eq!(titles, vec![Some("Alpha"), Some("Zeta")]);
        assert_eq!(digest.feeds()[0].items().len(), 1);
        assert_eq!(digest.feeds()[0].items()[0].title.as_deref(), Some("yesterday"));
    }

    #[tokio::test]
    async fn test_empty_source_list_skips_fetch() {
        let pipeline = DigestPipeline::new(
            Vec::<Source>::new(),
            StubFetcher::default(),
            RecordingDelivery::default(),
        );

        let outcome = pipeline.run_at(&now()).await.unwrap();
        assert_eq!(outcome, RunOutcome::NoContent);
        assert_eq!(pipeline.fetcher.calls.load(Ordering::SeqCst), 0);
        assert!(pipeline.delivery.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_fetches_failing_is_no_content() {
        let pipeline = DigestPipeline::new(
            sources(&["https://a", "https://b"]),
            StubFetcher::default(),
            RecordingDelivery::default(),
        );

        let outcome = pipeline.run_at(&now()).await.unwrap();
        assert_eq!(outcome, RunOutcome::NoContent);
        assert_eq!(pipeline.fetcher.calls.load(Ordering::SeqCst), 2);
        assert!(pipeline.delivery.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nothing_from_yesterday_is_no_content() {
        let fetcher = StubFetcher::default()
            .with("https://a", feed("A", vec![dated("today", "2026-10-17T01:00:00Z")]))
            .with("https://b", feed("B", vec![]));
        let pipeline = DigestPipeline::new(
            sources(&["https://a", "https://b"]),
            fetcher,
            RecordingDelivery::default(),
        );

        assert_eq!(pipeline.run_at(&now()).await.unwrap(), RunOutcome::NoContent);
        assert!(pipeline.delivery.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_source_list_error_is_fatal() {
        let pipeline = DigestPipeline::new(
            BrokenList,
            StubFetcher::default(),
            RecordingDelivery::default(),
        );

        let err = pipeline.run_at(&now()).await.unwrap_err();
        assert!(matches!(err, PipelineError::SourceList(_)));
        assert!(err.to_string().contains("subscription list"));
        assert_eq!(pipeline.fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_delivery_error_propagates() {
        let fetcher = StubFetcher::default()
            .with("https://a", feed("A", vec![dated("x", "2026-10-16T12:00:00Z")]));
        let pipeline = DigestPipeline::new(sources(&["https://a"]), fetcher, FailingDelivery);

        let err = pipeline.run_at(&now()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Delivery(_)));
        assert!(err.to_string().contains("mail server down"));
    }

    struct PanickingFetcher;

    impl FeedSource for PanickingFetcher {
        async fn fetch(&self, _source: &Source) -> Result<RawFeed, FetchError> {
            panic!("dispatch broke");
        }
    }

    #[tokio::test]
    async fn test_broken_fetch_stage_is_fatal() {
        let pipeline = DigestPipeline::new(
            sources(&["https://a"]),
            PanickingFetcher,
            RecordingDelivery::default(),
        );

        let err = pipeline.run_at(&now()).await.unwrap_err();
        assert!(matches!(err, PipelineError::FetchAggregation(_)));
        assert!(pipeline.delivery.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_back_to_back_runs_build_identical_digests() {
        let fetcher = StubFetcher::default()
            .with("https://a", feed("Same", vec![dated("1", "2026-10-16T03:00:00Z")]))
            .with("https://b", feed("Same", vec![dated("2", "2026-10-16T04:00:00Z")]))
            .with("https://c", feed("Earlier", vec![dated("3", "2026-10-16T05:00:00Z")]));
        let pipeline = DigestPipeline::new(
            sources(&["https://a", "https://b", "https://c"]),
            fetcher,
            RecordingDelivery::default(),
        );

        let first = pipeline.build_digest(&now()).await.unwrap();
        let second = pipeline.build_digest(&now()).await.unwrap();
        assert_eq!(first, second);

        let order: Vec<_> = first.feeds().iter().map(|f| f.source().as_str()).collect();
        assert_eq!(order, vec!["https://c", "https://a", "https://b"]);
    }
}
