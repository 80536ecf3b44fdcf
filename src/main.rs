use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use letter::config::Config;
use letter::delivery::{ConsoleDelivery, Deliver, OutputFormat, SmtpMailer};
use letter::digest::{DigestPipeline, RunOutcome};
use letter::feed::{HttpFeedSource, OpmlSourceList};

/// Get the config directory path (~/.config/letter/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("letter"))
}

#[derive(Parser, Debug)]
#[command(
    name = "letter",
    version,
    about = "Mails you yesterday's posts from your RSS/Atom subscriptions"
)]
struct Args {
    /// Config file (default: ~/.config/letter/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// OPML subscription list, overriding `opml_file` from the config
    #[arg(long, value_name = "FILE")]
    opml: Option<PathBuf>,

    /// Print the digest to stdout instead of mailing it
    #[arg(long)]
    dry_run: bool,

    /// Output format for --dry-run
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, requires = "dry_run")]
    format: OutputFormat,
}

async fn run<D: Deliver>(config: &Config, opml: PathBuf, delivery: D) -> Result<RunOutcome> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .build()
        .context("Failed to build HTTP client")?;
    let fetcher = HttpFeedSource::new(client)
        .with_timeout(config.fetch_timeout())
        .with_max_feed_size(config.max_feed_size_bytes);

    let pipeline = DigestPipeline::new(OpmlSourceList::new(opml), fetcher, delivery);
    Ok(pipeline.run().await?)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so --dry-run output stays clean on stdout
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = match args.config {
        Some(path) => path,
        None => get_config_dir()?.join("config.toml"),
    };
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let opml = args.opml.unwrap_or_else(|| config.opml_file.clone());

    let outcome = if args.dry_run {
        run(&config, opml, ConsoleDelivery::new(args.format)).await?
    } else {
        config
            .require_mail_settings()
            .with_context(|| format!("Cannot send mail with {}", config_path.display()))?;
        let mailer = SmtpMailer::new(&config.email, &config.smtp, config.smtp_password())
            .context("Invalid e-mail settings")?;
        run(&config, opml, mailer).await?
    };

    match outcome {
        RunOutcome::Delivered { .. } if args.dry_run => {}
        RunOutcome::Delivered { feeds, items } => {
            println!("Good news! Letter just sent you some daily readings. Enjoy.");
            tracing::debug!(feeds, items, "Run complete");
        }
        RunOutcome::NoContent if args.dry_run => eprintln!("No new readings for today."),
        RunOutcome::NoContent => println!("No new readings for today."),
    }

    Ok(())
}
