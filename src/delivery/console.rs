use chrono::NaiveDate;
use tokio::io::AsyncWriteExt;

use crate::delivery::render::render_text;
use crate::delivery::{Deliver, DeliveryError};
use crate::digest::Digest;

/// How the console channel prints a digest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// The plain-text e-mail body
    #[default]
    Text,
    /// The digest as pretty-printed JSON
    Json,
}

/// Writes the digest to stdout instead of sending it anywhere.
#[derive(Debug, Clone, Default)]
pub struct ConsoleDelivery {
    format: OutputFormat,
}

impl ConsoleDelivery {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn render(&self, digest: &Digest, today: NaiveDate) -> Result<String, DeliveryError> {
        match self.format {
            OutputFormat::Text => Ok(render_text(digest, today)),
            OutputFormat::Json => {
                let mut json = serde_json::to_string_pretty(digest)?;
                json.push('\n');
                Ok(json)
            }
        }
    }
}

impl Deliver for ConsoleDelivery {
    async fn deliver(&self, digest: &Digest, today: NaiveDate) -> Result<(), DeliveryError> {
        let body = self.render(digest, today)?;
        let mut stdout = tokio::io::stdout();
        stdout.write_all(body.as_bytes()).await?;
        stdout.flush().await?;
        Ok(())
    }
}
