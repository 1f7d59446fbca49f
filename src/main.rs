//! Dredge main entry point
//!
//! A small command-line front end that fetches one URL through the
//! resilient client, for trying out configurations and inspecting sites.

use anyhow::Context;
use clap::Parser;
use dredge::config::{load_config, ClientConfig, MailConfig};
use dredge::mail::{self, Message};
use dredge::util::tidy_html_text;
use dredge::{Client, RequestContext};
use reqwest::header::HeaderMap;
use scraper::Selector;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Dredge: fetch a page the way a resilient scraper would
///
/// Failed attempts are retried with linear backoff. With --dump every
/// attempt is written to the session dump directory.
#[derive(Parser, Debug)]
#[command(name = "dredge")]
#[command(version = "1.0.0")]
#[command(about = "Resilient HTTP fetcher for scrapers", long_about = None)]
struct Cli {
    /// URL to fetch
    #[arg(value_name = "URL")]
    url: String,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Save the body to a file; the extension is derived from the Content-Type if missing
    #[arg(short, long, value_name = "PATH", conflicts_with_all = ["select", "json"])]
    output: Option<PathBuf>,

    /// Mail the saved file to this address (repeatable), using the [mail] config section
    #[arg(long, value_name = "ADDR", requires = "output")]
    mail_to: Vec<String>,

    /// Print the tidied text of elements matching a CSS selector
    #[arg(short, long, value_name = "CSS", conflicts_with = "json")]
    select: Option<String>,

    /// Decode the body as JSON and pretty-print it
    #[arg(long)]
    json: bool,

    /// Write a dump file per attempt
    #[arg(long)]
    dump: bool,

    /// Root directory for dump files
    #[arg(long, value_name = "DIR")]
    dump_dir: Option<PathBuf>,

    /// Maximum attempts for the request
    #[arg(long, value_name = "N")]
    max_attempts: Option<u32>,

    /// Proxy URL (http, https or socks5)
    #[arg(long, value_name = "URL")]
    proxy: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = build_config(&cli)?;
    let client = Client::new(config).context("Failed to create client")?;

    let ctx = RequestContext::new();
    let canceler = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, canceling request");
            canceler.cancel();
        }
    });

    if let Some(output) = &cli.output {
        let path = client
            .get_file(&ctx, &cli.url, &[], HeaderMap::new(), output)
            .await?;
        tracing::info!("Saved {}", path.display());

        if !cli.mail_to.is_empty() {
            let mail_config = client
                .config()
                .mail
                .as_ref()
                .context("--mail-to needs a [mail] section in the configuration")?;
            mail_file(mail_config, &cli.mail_to, &cli.url, &path).await?;
        }
    } else if let Some(css) = &cli.select {
        print_selection(&client, &ctx, &cli.url, css).await?;
    } else if cli.json {
        let value: serde_json::Value = client
            .get_json(&ctx, &cli.url, &[], HeaderMap::new())
            .await?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        let body = client.get(&ctx, &cli.url, &[], HeaderMap::new()).await?;
        std::io::stdout().write_all(&body)?;
    }

    tracing::info!(
        "Done after {} request(s){}",
        client.requests_sent(),
        client
            .dump_dir()
            .map(|dir| format!(", dumps in {}", dir.display()))
            .unwrap_or_default()
    );

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("dredge=info,warn"),
            1 => EnvFilter::new("dredge=debug,info"),
            2 => EnvFilter::new("dredge=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the configuration file, if any, and applies command-line overrides
fn build_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?
        }
        None => ClientConfig::default(),
    };

    if let Some(max_attempts) = cli.max_attempts {
        config.max_attempts = max_attempts;
    }
    if let Some(proxy) = &cli.proxy {
        config.proxy = Some(proxy.clone());
    }
    if cli.dump {
        config.diagnostics.enabled = true;
    }
    if let Some(dir) = &cli.dump_dir {
        config.diagnostics.dump_dir = dir.clone();
    }

    Ok(config)
}

/// Sends a downloaded file as an attachment
async fn mail_file(
    config: &MailConfig,
    recipients: &[String],
    url: &str,
    path: &Path,
) -> anyhow::Result<()> {
    let sender = config
        .from
        .as_ref()
        .or(config.username.as_ref())
        .context("Mail config needs a `from` address or a username")?;

    let mut message = Message::new(
        sender.clone(),
        recipients.to_vec(),
        format!("dredge: {}", url),
        format!("Fetched {}\n", url),
    );
    message.attach(path)?;

    mail::send(config, &message)
        .await
        .context("Failed to send mail")?;
    tracing::info!("Mailed {} to {}", path.display(), recipients.join(", "));
    Ok(())
}

async fn print_selection(
    client: &Client,
    ctx: &RequestContext,
    url: &str,
    css: &str,
) -> anyhow::Result<()> {
    let selector =
        Selector::parse(css).map_err(|e| anyhow::anyhow!("Invalid selector {:?}: {:?}", css, e))?;

    let document = client.get_document(ctx, url, &[], HeaderMap::new()).await?;

    let mut matches = 0;
    for element in document.select(&selector) {
        let text: String = element.text().collect::<Vec<_>>().join(" ");
        println!("{}", tidy_html_text(&text));
        matches += 1;
    }

    if matches == 0 {
        tracing::warn!("No elements matched {}", css);
    }

    Ok(())
}
