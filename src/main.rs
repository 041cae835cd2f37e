//! scrapex command-line entry point.
//!
//! Runs a WebScraper sitemap against its start URLs and prints the
//! merged records as JSON on stdout.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand};
use scrapex::{EngineBuilder, ExportFormat, Sitemap, WebScraperSpider};
use tracing_subscriber::EnvFilter;

/// Run declarative sitemap scrapes from the command line.
#[derive(Parser, Debug)]
#[command(name = "scrapex")]
#[command(version)]
#[command(about = "A spider runtime for declarative sitemap scraping", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Crawl a sitemap once and print the records as JSON
    Run {
        /// Path to the sitemap JSON document
        #[arg(value_name = "SITEMAP")]
        sitemap: PathBuf,

        /// Re-crawl every N milliseconds instead of exiting after one pass
        #[arg(long, value_name = "MS")]
        interval: Option<u64>,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        CliCommand::Run {
            sitemap,
            interval,
            pretty,
        } => run(sitemap, interval, pretty).await,
    }
}

async fn run(path: PathBuf, interval: Option<u64>, pretty: bool) -> anyhow::Result<()> {
    tracing::info!("loading sitemap from {}", path.display());
    let sitemap = Sitemap::from_file(&path)?;
    let spider = WebScraperSpider::new(sitemap)?;
    let seeds = spider.start_urls();

    let mut builder = EngineBuilder::new(spider).urls(seeds);
    if let Some(ms) = interval {
        builder = builder.interval(Duration::from_millis(ms));
    }
    let engine = builder.start().await?;

    if pretty {
        let records = engine.export().await?;
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        let json = engine.export_with(ExportFormat::Json, false).await?;
        println!("{}", json.into_text());
    }

    engine.stop().await;
    Ok(())
}

fn setup_logging(verbose: u8) {
    let default = match verbose {
        0 => "scrapex=warn",
        1 => "scrapex=info",
        _ => "scrapex=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
