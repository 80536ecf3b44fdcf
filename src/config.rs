//! Configuration file parser for ~/.config/letter/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`,
//! which is enough for `--dry-run`. Sending mail additionally needs the
//! `[email]` addresses and `[smtp] host`. Unknown keys are accepted but
//! logged as warnings, since they are usually typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Environment variable that overrides `smtp.pass`.
pub const SMTP_PASS_ENV: &str = "LETTER_SMTP_PASS";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// A setting needed for sending mail is absent or empty.
    #[error("Missing required setting `{0}` in config file")]
    Missing(&'static str),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// OPML subscription list. Relative paths resolve against the directory
    /// holding the config file.
    pub opml_file: PathBuf,

    /// Per-feed request timeout in seconds.
    pub fetch_timeout_secs: u64,

    /// Largest feed body accepted, in bytes.
    pub max_feed_size_bytes: usize,

    /// `User-Agent` sent with every feed request.
    pub user_agent: String,

    pub email: EmailConfig,

    pub smtp: SmtpConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            opml_file: PathBuf::from("feeds.opml"),
            fetch_timeout_secs: 30,
            max_feed_size_bytes: 10 * 1024 * 1024,
            user_agent: concat!("letter/", env!("CARGO_PKG_VERSION")).to_string(),
            email: EmailConfig::default(),
            smtp: SmtpConfig::default(),
        }
    }
}

/// `[email]` section: who the digest comes from and goes to.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    /// Sender mailbox, e.g. `"Letter <letter@example.com>"`.
    pub from: String,
    /// Recipient mailboxes.
    pub to: Vec<String>,
    /// Subject prefix; the date is appended.
    pub subject: String,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            from: String::new(),
            to: Vec::new(),
            subject: "Letter".to_string(),
        }
    }
}

/// `[smtp]` section.
///
/// SEC-015: Custom Debug impl masks `pass` to prevent secret leakage
/// in logs, error messages, and debug output.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Implicit TLS from the first byte (usually port 465). When false the
    /// connection upgrades with STARTTLS if the server offers it.
    pub secure: bool,
    pub user: Option<String>,
    /// Password. The `LETTER_SMTP_PASS` env var takes precedence.
    pub pass: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 587,
            secure: false,
            user: None,
            pass: None,
            timeout_secs: 60,
        }
    }
}

impl std::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("secure", &self.secure)
            .field("user", &self.user)
            .field("pass", &self.pass.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

const KNOWN_KEYS: &[&str] = &[
    "opml_file",
    "fetch_timeout_secs",
    "max_feed_size_bytes",
    "user_agent",
    "email",
    "smtp",
];
const KNOWN_EMAIL_KEYS: &[&str] = &["from", "to", "subject"];
const KNOWN_SMTP_KEYS: &[&str] = &["host", "port", "secure", "user", "pass", "timeout_secs"];

fn warn_unknown_keys(raw: &toml::Table) {
    for key in raw.keys() {
        if !KNOWN_KEYS.contains(&key.as_str()) {
            tracing::warn!(key = %key, "Unknown key in config file, ignoring");
        }
    }
    for (section, known) in [("email", KNOWN_EMAIL_KEYS), ("smtp", KNOWN_SMTP_KEYS)] {
        if let Some(table) = raw.get(section).and_then(toml::Value::as_table) {
            for key in table.keys() {
                if !known.contains(&key.as_str()) {
                    tracing::warn!(key = %format!("{}.{}", section, key), "Unknown key in config file, ignoring");
                }
            }
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    ///
    /// A relative `opml_file` is resolved against the config file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut config = Self::load_raw(path)?;
        if config.opml_file.is_relative() {
            config.opml_file = base_dir.join(&config.opml_file);
        }
        Ok(config)
    }

    fn load_raw(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            warn_unknown_keys(&raw);
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), opml = %config.opml_file.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// SMTP password, preferring the `LETTER_SMTP_PASS` env var over the file.
    pub fn smtp_password(&self) -> Option<SecretString> {
        password_from(std::env::var(SMTP_PASS_ENV).ok(), self.smtp.pass.as_deref())
    }

    /// Checks that everything needed to send mail is present.
    pub fn require_mail_settings(&self) -> Result<(), ConfigError> {
        if self.email.from.trim().is_empty() {
            return Err(ConfigError::Missing("email.from"));
        }
        if self.email.to.iter().all(|to| to.trim().is_empty()) {
            return Err(ConfigError::Missing("email.to"));
        }
        if self.smtp.host.trim().is_empty() {
            return Err(ConfigError::Missing("smtp.host"));
        }
        Ok(())
    }
}

fn password_from(env: Option<String>, file: Option<&str>) -> Option<SecretString> {
    env.filter(|p| !p.is_empty())
        .or_else(|| file.map(str::to_string))
        .map(SecretString::from)
}

// ============================================================================
// Tests
// ============================================================================
