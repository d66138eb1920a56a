//! Layered run configuration.
//!
//! Built-in defaults, then an optional YAML file, then CLI flags (which also
//! read their environment variables). Later layers win.
//!
//! ```yaml
//! crawl:
//!   index_url: https://www.almayadeen.net/sitemaps/all.xml
//!   overall_limit: 12000
//!   target_years: [2024, 2023]
//!   concurrency: 1
//! http:
//!   timeout_secs: 30
//!   connect_timeout_secs: 10
//!   user_agent: sitemap_harvest/0.1
//! output:
//!   dir: data_articles
//! ```

use crate::cli::CrawlArgs;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

pub const DEFAULT_INDEX_URL: &str = "https://www.almayadeen.net/sitemaps/all.xml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawl: CrawlSettings,
    pub http: HttpSettings,
    pub output: OutputSettings,
}

/// What to crawl and how much of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    pub index_url: String,
    pub overall_limit: usize,
    /// Years to keep, most recent processed first regardless of listed order.
    pub target_years: Vec<i32>,
    /// Article pages fetched at once within a bucket. 1 is fully sequential.
    pub concurrency: usize,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            overall_limit: 12_000,
            target_years: vec![2024, 2023],
            concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub dir: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data_articles"),
        }
    }
}

impl Config {
    /// Defaults, overlaid with the YAML file at `path` when one is given.
    #[instrument(level = "info")]
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            debug!("No config file given; using defaults");
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&raw).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, serde_yaml::Error> {
        // An empty file deserializes as null; treat it as "all defaults".
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Overlay crawl flags given on the command line.
    pub fn apply_crawl_args(&mut self, args: &CrawlArgs) {
        if let Some(url) = &args.index_url {
            self.crawl.index_url = url.clone();
        }
        if let Some(limit) = args.limit {
            self.crawl.overall_limit = limit;
        }
        if !args.years.is_empty() {
            self.crawl.target_years = args.years.clone();
        }
        if let Some(concurrency) = args.concurrency {
            self.crawl.concurrency = concurrency;
        }
        if let Some(timeout) = args.timeout_secs {
            self.http.timeout_secs = timeout;
        }
        if let Some(agent) = &args.user_agent {
            self.http.user_agent = agent.clone();
        }
        if let Some(dir) = &args.output_dir {
            self.output.dir = dir.clone();
        }
    }

    /// Reject settings a run cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crawl.index_url.trim().is_empty() {
            return Err(ConfigError::Invalid("crawl.index_url is empty".to_string()));
        }
        if self.crawl.target_years.is_empty() {
            return Err(ConfigError::Invalid("crawl.target_years is empty".to_string()));
        }
        if self.crawl.concurrency == 0 {
            return Err(ConfigError::Invalid("crawl.concurrency must be at least 1".to_string()));
        }
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::Invalid("http.timeout_secs must be at least 1".to_string()));
        }
        Ok(())
    }
}
