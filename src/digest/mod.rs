//! The daily digest: yesterday's items from every subscription, one
//! ordered collection per run.
//!
//! - [`filter`] - Decides whether an item was published yesterday
//! - [`aggregator`] - Drops failed and empty feeds, orders the rest by title
//! - [`pipeline`] - Wires source list, fetcher, aggregator and delivery together

mod aggregator;
mod filter;
mod pipeline;

pub use aggregator::{aggregate, Digest, QualifyingFeed};
pub use filter::{is_from_yesterday, yesterday};
pub use pipeline::{DigestPipeline, PipelineError, RunOutcome};
