//! # Sitemap Harvest
//!
//! Crawls a news publisher's sitemaps and stores every scraped article as
//! structured JSON, one batch per publication month, ready for loading into a
//! document store and for downstream entity and sentiment enrichment.
//!
//! ## Usage
//!
//! ```sh
//! sitemap_harvest crawl --limit 12000 --year 2024 --year 2023 -o ./data_articles
//! sitemap_harvest inspect -o ./data_articles
//! ```
//!
//! ## Architecture
//!
//! The crawl follows a pipeline architecture:
//! 1. **Indexing**: Read the sitemap index to discover one sitemap per month
//! 2. **Scheduling**: Keep the target years, newest first, and split the
//!    article budget evenly across the remaining months
//! 3. **Extraction**: For each month, scrape article pages up to its share
//! 4. **Output**: Write each month's articles as `articles_YYYY_MM.json`

use clap::Parser;
use std::error::Error;
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod error;
mod http;
mod models;
mod orchestrator;
mod outputs;
mod quota;
mod scrapers;
mod utils;

use cli::{Cli, Command, CrawlArgs};
use config::Config;
use http::HttpClient;
use orchestrator::{BucketOutcome, Orchestrator};
use outputs::json::BatchWriter;
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut config = Config::load(args.config.as_deref())?;

    match args.command {
        Command::Crawl(crawl_args) => crawl(&mut config, &crawl_args).await,
        Command::Inspect { output_dir } => {
            if let Some(dir) = output_dir {
                config.output.dir = dir;
            }
            inspect(&config.output.dir).await
        }
    }
}

#[instrument(level = "info", skip_all)]
async fn crawl(config: &mut Config, args: &CrawlArgs) -> Result<(), Box<dyn Error>> {
    let start_time = std::time::Instant::now();
    config.apply_crawl_args(args);
    config.validate()?;
    info!(
        index_url = %config.crawl.index_url,
        limit = config.crawl.overall_limit,
        years = ?config.crawl.target_years,
        output_dir = %config.output.dir.display(),
        "sitemap_harvest starting up"
    );

    // Early check: fail before crawling if batches could never be written
    if let Err(e) = ensure_writable_dir(&config.output.dir).await {
        error!(
            path = %config.output.dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    let client = HttpClient::new(&config.http)?;
    let writer = BatchWriter::new(&config.output.dir);
    let report = Orchestrator::new(&client, &writer, &config.crawl).run().await?;

    for (sitemap_url, outcome) in &report.buckets {
        match outcome {
            BucketOutcome::Persisted { year, month, count, path } => {
                info!(%sitemap_url, %year, %month, count, path = %path.display(), "Bucket persisted");
            }
            BucketOutcome::Empty { year, month } => {
                warn!(%sitemap_url, %year, %month, "Bucket produced no articles");
            }
            BucketOutcome::FetchFailed { year, month } => {
                warn!(%sitemap_url, %year, %month, "Bucket skipped: sitemap unavailable");
            }
            BucketOutcome::UndatedSitemap => {
                warn!(%sitemap_url, "Bucket skipped: no year-month in sitemap name");
            }
            BucketOutcome::PersistFailed { year, month, count } => {
                error!(%sitemap_url, %year, %month, count, "Bucket lost: batch could not be written");
            }
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        total_articles = report.overall_count,
        worklist = report.worklist_len,
        limit = config.crawl.overall_limit,
        per_bucket_cap = report.per_bucket_cap,
        buckets_persisted = report.persisted(),
        "Scraping completed"
    );
    Ok(())
}

#[instrument(level = "info", fields(dir = %output_dir.display()))]
async fn inspect(output_dir: &Path) -> Result<(), Box<dyn Error>> {
    let writer = BatchWriter::new(output_dir);
    let batches = writer.load_all().await?;

    let mut total = 0;
    for (path, records) in &batches {
        let with_text = records.iter().filter(|r| !r.full_text.is_empty()).count();
        info!(
            path = %path.display(),
            records = records.len(),
            with_text,
            "Batch"
        );
        total += records.len();
    }
    info!(batches = batches.len(), total, dir = %writer.output_dir().display(), "Inspection complete");
    Ok(())
}
