//! Delivery channels for a finished digest.
//!
//! - [`render`] - Plain-text and HTML bodies shared by every channel
//! - [`smtp`] - Sends the digest as a multipart e-mail via `lettre`
//! - [`console`] - Prints the digest to stdout (`--dry-run`)

mod console;
mod render;
mod smtp;

use chrono::NaiveDate;
use std::future::Future;
use thiserror::Error;

use crate::digest::Digest;

pub use console::{ConsoleDelivery, OutputFormat};
pub use render::{format_date, render_html, render_text, SUMMARY_WIDTH};
pub use smtp::SmtpMailer;

/// Errors raised while rendering or sending a digest.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// A sender or recipient address did not parse.
    #[error("Invalid e-mail address: {0}")]
    Address(#[from] lettre::address::AddressError),
    /// The message could not be assembled.
    #[error("Failed to build message: {0}")]
    Message(#[from] lettre::error::Error),
    /// The SMTP exchange failed (connect, TLS, auth or rejection).
    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
    /// Writing the digest out failed.
    #[error("Write failed: {0}")]
    Io(#[from] std::io::Error),
    /// JSON serialization of the digest failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// The blocking send task panicked or was cancelled.
    #[error("Send task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Hands a finished digest to the reader.
///
/// Called at most once per run, and never with an empty digest.
pub trait Deliver: Send + Sync {
    fn deliver(
        &self,
        digest: &Digest,
        today: NaiveDate,
    ) -> impl Future<Output = Result<(), DeliveryError>> + Send;
}
