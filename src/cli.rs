//! Command-line interface definitions.
//!
//! Every flag can also come from an environment variable, and any flag left
//! unset falls back to the config file or the built-in default.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for sitemap_harvest.
///
/// # Examples
///
/// ```sh
/// # Crawl with defaults (2024 then 2023, 12000 articles)
/// sitemap_harvest crawl
///
/// # Small run into a scratch directory
/// sitemap_harvest crawl --limit 50 --year 2024 -o /tmp/articles
///
/// # Count what earlier runs persisted
/// sitemap_harvest inspect -o /tmp/articles
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long, global = true, env = "HARVEST_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Crawl the sitemap index and persist one JSON batch per month
    Crawl(CrawlArgs),
    /// Read persisted batches back and report their record counts
    Inspect {
        /// Directory holding the articles_YYYY_MM.json batches
        #[arg(short, long, env = "HARVEST_OUTPUT_DIR")]
        output_dir: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct CrawlArgs {
    /// URL of the top-level sitemap index
    #[arg(long, env = "HARVEST_INDEX_URL")]
    pub index_url: Option<String>,

    /// Maximum number of articles scraped across the whole run
    #[arg(short, long, env = "HARVEST_LIMIT")]
    pub limit: Option<usize>,

    /// Year to crawl; repeat for several (most recent is processed first)
    #[arg(short = 'y', long = "year")]
    pub years: Vec<i32>,

    /// Directory for the articles_YYYY_MM.json batches
    #[arg(short, long, env = "HARVEST_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, env = "HARVEST_TIMEOUT_SECS")]
    pub timeout_secs: Option<u64>,

    /// User-Agent header sent with every request
    #[arg(long, env = "HARVEST_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Article pages fetched at once within a month
    #[arg(long, env = "HARVEST_CONCURRENCY")]
    pub concurrency: Option<usize>,
}
