//! Error types for each stage of a crawl.
//!
//! Every failure is scoped to the smallest unit it affects. A [`FetchError`]
//! skips one article or one monthly sitemap, a [`ParseError`] skips one bucket,
//! a [`PersistError`] loses one bucket's batch. Only [`CrawlError`] ends a run.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A GET that did not produce a usable document.
///
/// This is the single skip signal for every fetch operation: sitemap index,
/// monthly sitemap and article page all return `Result<_, FetchError>`.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("GET {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("GET {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} is not a readable sitemap: {reason}")]
    Malformed { url: String, reason: String },
}

impl FetchError {
    /// The URL the failed request was made against.
    pub fn url(&self) -> &str {
        match self {
            FetchError::Status { url, .. }
            | FetchError::Transport { url, .. }
            | FetchError::Malformed { url, .. } => url,
        }
    }
}

/// A sitemap URL that does not name its (year, month) period.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("no trailing year-month pair in {0}")]
    MissingPeriod(String),

    #[error("{url} names month {month} of {year}, which does not exist")]
    InvalidPeriod { url: String, year: i32, month: u32 },
}

/// Failure writing or reading a persisted batch.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON error on {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure loading the layered configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid setting: {0}")]
    Invalid(String),
}

/// Run-fatal conditions.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Without an index there is no worklist.
    #[error("sitemap index {url} yielded no sitemaps")]
    IndexUnavailable {
        url: String,
        #[source]
        source: Option<FetchError>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_reports_url() {
        let err = FetchError::Status {
            url: "https://example.com/a".to_string(),
            status: 404,
        };
        assert_eq!(err.url(), "https://example.com/a");
        assert_eq!(err.to_string(), "GET https://example.com/a returned HTTP 404");
    }

    #[test]
    fn test_index_unavailable_without_source() {
        let err = CrawlError::IndexUnavailable {
            url: "https://example.com/all.xml".to_string(),
            source: None,
        };
        assert!(std::error::Error::source(&err).is_none());
        assert!(err.to_string().contains("all.xml"));
    }
}
