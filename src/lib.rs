//! letter: mails you yesterday's posts from your feed subscriptions.
//!
//! A run reads an OPML subscription list, fetches every feed concurrently,
//! keeps the items published on the previous local calendar day, and
//! delivers the resulting [`digest::Digest`] by e-mail (or to stdout).

pub mod config;
pub mod delivery;
pub mod digest;
pub mod feed;
pub mod util;
