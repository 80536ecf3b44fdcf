use chrono::NaiveDate;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Message, SmtpTransport, Transport};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

use crate::config::{EmailConfig, SmtpConfig};
use crate::delivery::render::{format_date, render_html, render_text};
use crate::delivery::{Deliver, DeliveryError};
use crate::digest::Digest;

/// Sends the digest as a `multipart/alternative` e-mail (plain text + HTML).
pub struct SmtpMailer {
    from: Mailbox,
    to: Vec<Mailbox>,
    subject: String,
    host: String,
    port: u16,
    secure: bool,
    timeout: Duration,
    credentials: Option<(String, SecretString)>,
}

impl SmtpMailer {
    /// Builds a mailer, parsing every address up front so a typo fails the
    /// run before any feed is fetched.
    ///
    /// Credentials are only used when both a user and a password are set.
    pub fn new(
        email: &EmailConfig,
        smtp: &SmtpConfig,
        password: Option<SecretString>,
    ) -> Result<Self, DeliveryError> {
        let from = email.from.parse::<Mailbox>()?;
        let to = email
            .to
            .iter()
            .filter(|to| !to.trim().is_empty())
            .map(|to| to.parse::<Mailbox>())
            .collect::<Result<Vec<_>, _>>()?;

        let credentials = match (&smtp.user, password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass)),
            _ => None,
        };

        Ok(Self {
            from,
            to,
            subject: email.subject.clone(),
            host: smtp.host.clone(),
            port: smtp.port,
            secure: smtp.secure,
            timeout: Duration::from_secs(smtp.timeout_secs),
            credentials,
        })
    }

    /// Assembles the message without sending it.
    pub fn build_message(&self, digest: &Digest, today: NaiveDate) -> Result<Message, DeliveryError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(format!("{} for {}", self.subject, format_date(today)));
        for to in &self.to {
            builder = builder.to(to.clone());
        }

        let message = builder.multipart(MultiPart::alternative_plain_html(
            render_text(digest, today),
            render_html(digest, today),
        ))?;
        Ok(message)
    }

    fn transport(&self) -> Result<SmtpTransport, DeliveryError> {
        let builder = if self.secure {
            SmtpTransport::relay(&self.host)?
        } else {
            SmtpTransport::builder_dangerous(&self.host)
                .tls(Tls::Opportunistic(TlsParameters::new(self.host.clone())?))
        };

        let mut builder = builder.port(self.port).timeout(Some(self.timeout));
        if let Some((user, pass)) = &self.credentials {
            builder = builder.credentials(Credentials::new(
                user.clone(),
                pass.expose_secret().to_owned(),
            ));
        }
        Ok(builder.build())
    }
}

impl Deliver for SmtpMailer {
    async fn deliver(&self, digest: &Digest, today: NaiveDate) -> Result<(), DeliveryError> {
        let message = self.build_message(digest, today)?;
        let transport = self.transport()?;

        tracing::debug!(
            host = %self.host,
            port = self.port,
            secure = self.secure,
            recipients = self.to.len(),
            "Sending digest"
        );

        // lettre's SmtpTransport blocks; keep it off the async workers
        let response = tokio::task::spawn_blocking(move || transport.send(&message)).await??;
        tracing::info!(
            code = %response.code(),
            recipients = self.to.len(),
            "Digest accepted by SMTP server"
        );
        Ok(())
    }
}
