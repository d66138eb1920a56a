//! Sitemap index and monthly sitemap fetching.
//!
//! The publisher exposes one sitemap index listing a secondary sitemap per
//! month, each named with a `-YYYY-MM` suffix:
//!
//! ```text
//! all.xml
//! ├── sitemap-2024-02.xml   → article URLs published February 2024
//! ├── sitemap-2024-01.xml
//! └── ...
//! ```
//!
//! Both levels are read the same way: GET the document and collect every
//! `<loc>` in document order.

use crate::error::{FetchError, ParseError};
use crate::http::FetchText;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// `...-<year>-<month>` optionally followed by extensions such as `.xml` or `.xml.gz`.
static PERIOD_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|-)(\d+)-(\d+)(?:\.[A-Za-z0-9]+)*$").expect("valid period regex"));

/// Fetch the sitemap index and list the secondary sitemap URLs it names.
///
/// # Arguments
///
/// * `fetcher` - HTTP access for the run
/// * `index_url` - URL of the sitemap index document
///
/// # Returns
///
/// The monthly sitemap URLs in document order. A non-200 answer, a transport
/// failure or a body that is not XML is a [`FetchError`].
#[instrument(level = "info", skip(fetcher))]
pub async fn fetch_index<F: FetchText>(
    fetcher: &F,
    index_url: &str,
) -> Result<Vec<String>, FetchError> {
    let sitemap_urls = fetch_locations(fetcher, index_url).await.inspect_err(|e| {
        warn!(error = %e, "Failed to retrieve sitemap index");
    })?;
    info!(count = sitemap_urls.len(), "Indexed secondary sitemaps");
    Ok(sitemap_urls)
}

/// Fetch one monthly sitemap and list the article URLs it names.
#[instrument(level = "info", skip(fetcher))]
pub async fn fetch_article_urls<F: FetchText>(
    fetcher: &F,
    sitemap_url: &str,
) -> Result<Vec<String>, FetchError> {
    let article_urls = fetch_locations(fetcher, sitemap_url).await.inspect_err(|e| {
        warn!(error = %e, "Failed to retrieve monthly sitemap");
    })?;
    info!(count = article_urls.len(), "Listed article URLs");
    Ok(article_urls)
}

async fn fetch_locations<F: FetchText>(fetcher: &F, url: &str) -> Result<Vec<String>, FetchError> {
    let body = fetcher.fetch_text(url).await?;
    parse_locations(&body).map_err(|e| FetchError::Malformed {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

/// Every `<loc>` value of a sitemap or sitemap index, trimmed, empty ones dropped.
///
/// Only the `<loc>` elements matter: they are collected in document order
/// wherever they sit, so `<lastmod>`, extension tags or any other sibling
/// between entries are skipped. A document that is not well-formed XML is an
/// error.
pub fn parse_locations(xml: &str) -> Result<Vec<String>, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);
    let mut locations = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.local_name().as_ref() == b"loc" => {
                current = Some(String::new());
            }
            Event::End(e) if e.local_name().as_ref() == b"loc" => {
                if let Some(loc) = current.take() {
                    let loc = loc.trim();
                    if !loc.is_empty() {
                        locations.push(loc.to_string());
                    }
                }
            }
            Event::Text(t) => {
                if let Some(loc) = current.as_mut() {
                    loc.push_str(&t.decode()?);
                }
            }
            Event::CData(c) => {
                if let Some(loc) = current.as_mut() {
                    loc.push_str(&c.decode()?);
                }
            }
            Event::GeneralRef(r) => {
                if let Some(loc) = current.as_mut() {
                    match r.resolve_char_ref()? {
                        Some(ch) => loc.push(ch),
                        None => {
                            let name = r.decode()?;
                            match resolve_predefined_entity(&name) {
                                Some(text) => loc.push_str(text),
                                None => {
                                    loc.push('&');
                                    loc.push_str(&name);
                                    loc.push(';');
                                }
                            }
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    debug!(count = locations.len(), "Parsed sitemap locations");
    Ok(locations)
}

/// Derive the (year, month) bucket of a monthly sitemap from its file name.
///
/// The last path segment must end in `-YYYY-MM` plus an optional extension:
/// `.../sitemap-2023-08.xml` gives `(2023, 8)`.
pub fn extract_year_month(url: &str) -> Result<(i32, u32), ParseError> {
    let missing = || ParseError::MissingPeriod(url.to_string());

    let segment = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|segments| segments.last())
            .map(str::to_string),
        Err(_) => url
            .split(['?', '#'])
            .next()
            .and_then(|path| path.rsplit('/').next())
            .map(str::to_string),
    }
    .ok_or_else(missing)?;

    let captures = PERIOD_SUFFIX.captures(&segment).ok_or_else(missing)?;
    let year: i32 = captures[1].parse().map_err(|_| missing())?;
    let month: u32 = captures[2].parse().map_err(|_| missing())?;

    if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
        return Err(ParseError::InvalidPeriod {
            url: url.to_string(),
            year,
            month,
        });
    }
    Ok((year, month))
}
