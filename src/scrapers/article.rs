//! Article page scraper.
//!
//! Each article page carries its metadata twice over: a JSON object embedded
//! in a `<script id="tawsiyat-metadata" type="text/tawsiyat">` block, and a
//! `<meta name="postid">` tag. The body text lives in paragraphs reachable
//! through three different markups, depending on the page template:
//!
//! | Strategy | Selector | Notes |
//! |----------|----------|-------|
//! | Summary  | `p.lg_para.summary` | Lead paragraphs |
//! | Content  | `div.p-content > p` | Direct children of the first content container only |
//! | Body     | `p.lg_para:not(.summary)` | Remaining large paragraphs |
//!
//! The strategies are not a fallback chain: every strategy that matches
//! contributes its paragraphs, in table order.
//!
//! The body strategy excludes `.summary`, so a lead paragraph appears once in
//! `fullText`. Batches from a scraper that matched plain `p.lg_para` repeat
//! every lead paragraph after the body (`Lead\nBody\nLead` rather than
//! `Lead\nBody`), so the two are not byte-comparable.

use crate::error::FetchError;
use crate::http::FetchText;
use crate::models::{ArticleMetadata, ArticleRecord};
use crate::utils::truncate_for_log;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

static METADATA_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"script#tawsiyat-metadata[type="text/tawsiyat"]"#).expect("valid metadata selector")
});
static POST_ID_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="postid"]"#).expect("valid post id selector"));
static SUMMARY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p.lg_para.summary").expect("valid summary selector"));
static CONTENT_CONTAINER_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.p-content").expect("valid content selector"));
static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p.lg_para:not(.summary)").expect("valid body selector"));

/// Fetch one article page and turn it into a record.
///
/// # Arguments
///
/// * `fetcher` - HTTP access for the run
/// * `url` - The article page to scrape
///
/// # Returns
///
/// The scraped [`ArticleRecord`]. A non-200 status or transport failure is
/// returned as the skip signal; everything after a successful fetch degrades
/// to empty fields instead of failing.
#[instrument(level = "info", skip(fetcher))]
pub async fn scrape_article<F: FetchText>(fetcher: &F, url: &str) -> Result<ArticleRecord, FetchError> {
    let html = fetcher.fetch_text(url).await.inspect_err(|e| {
        warn!(error = %e, "Failed to retrieve article");
    })?;
    let record = parse_article(url, &html);
    info!(
        bytes = record.full_text.len(),
        has_title = record.title.is_some(),
        "Parsed article"
    );
    Ok(record)
}

/// Extract a record from an already fetched article page.
pub fn parse_article(url: &str, html: &str) -> ArticleRecord {
    let document = Html::parse_document(html);
    let metadata = ArticleMetadata::from_value(&metadata_block(&document));
    let post_id = post_id(&document);
    let full_text = paragraphs(&document).join("\n");
    ArticleRecord::from_parts(url, post_id, metadata, full_text)
}

/// The embedded metadata object, or an empty object when it is missing or malformed.
fn metadata_block(document: &Html) -> Value {
    let Some(script) = document.select(&METADATA_SELECTOR).next() else {
        debug!("No metadata block on page");
        return Value::Object(Default::default());
    };

    let raw = script.text().collect::<String>();
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(value) => value,
        Err(e) => {
            warn!(
                error = %e,
                preview = %truncate_for_log(raw.trim(), 200),
                "Malformed metadata block; continuing with empty metadata"
            );
            Value::Object(Default::default())
        }
    }
}

fn post_id(document: &Html) -> Option<String> {
    document
        .select(&POST_ID_SELECTOR)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .map(str::to_string)
}

/// Paragraph texts from all three strategies, concatenated in strategy order.
fn paragraphs(document: &Html) -> Vec<String> {
    let summary = document.select(&SUMMARY_SELECTOR);

    let content = document
        .select(&CONTENT_CONTAINER_SELECTOR)
        .next()
        .into_iter()
        .flat_map(|container| container.children().filter_map(ElementRef::wrap))
        .filter(|child| child.value().name() == "p");

    let body = document.select(&BODY_SELECTOR);

    summary
        .chain(content)
        .chain(body)
        .filter_map(|element| {
            let text = element.text().collect::<String>();
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        })
        .collect()
}
