//! Data models for scraped articles and the sitemaps they are discovered from.
//!
//! - [`ArticleRecord`]: One scraped article page, the unit persisted in batches
//! - [`ArticleMetadata`]: The fixed field set read from a page's embedded metadata block
//! - [`TaxonomyTag`]: A `{mapping, value}` category pair from the open-ended `classes` list
//! - [`SitemapEntry`]: A monthly sitemap resolved to its (year, month) bucket
//!
//! Records serialize with camelCase field names (`postId`, `fullText`,
//! `publishedTime`). Consumers that read snake_case keys such as `full_text`
//! need to map them on load.

use crate::error::ParseError;
use crate::scrapers::sitemap::extract_year_month;
use crate::utils::split_keywords;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A single scraped article.
///
/// Only `url` is guaranteed. Every other field is whatever the page supplied,
/// and is `None` or empty when it supplied nothing usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    pub url: String,
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "keywords_list_or_csv")]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub video_duration: Option<String>,
    #[serde(default)]
    pub word_count: Option<WordCount>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub published_time: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub classes: Vec<TaxonomyTag>,
    #[serde(default)]
    pub full_text: String,
}

impl ArticleRecord {
    /// Combine page metadata with the extracted body into a record for `url`.
    pub fn from_parts(
        url: &str,
        post_id: Option<String>,
        metadata: ArticleMetadata,
        full_text: String,
    ) -> Self {
        Self {
            url: url.to_string(),
            post_id,
            title: metadata.title,
            keywords: metadata.keywords,
            thumbnail: metadata.thumbnail,
            video_duration: metadata.video_duration,
            word_count: metadata.word_count,
            lang: metadata.lang,
            published_time: metadata.published_time,
            last_updated: metadata.last_updated,
            description: metadata.description,
            author: metadata.author,
            classes: metadata.classes,
            full_text,
        }
    }
}

/// Word count as published. Some pages emit a number, others a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WordCount {
    Count(serde_json::Number),
    Text(String),
}

/// A `{mapping, value}` taxonomy pair, e.g. `{"mapping": "category", "value": "Politics"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyTag {
    pub mapping: String,
    pub value: String,
}

/// The known fields of a page's embedded metadata object.
///
/// Built leniently from a [`serde_json::Value`]: a missing or mistyped field
/// becomes `None`/empty for that field alone instead of rejecting the block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleMetadata {
    pub title: Option<String>,
    pub keywords: Vec<String>,
    pub thumbnail: Option<String>,
    pub video_duration: Option<String>,
    pub word_count: Option<WordCount>,
    pub lang: Option<String>,
    pub published_time: Option<String>,
    pub last_updated: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub classes: Vec<TaxonomyTag>,
}

impl ArticleMetadata {
    /// Read the known fields out of a parsed metadata value.
    ///
    /// Anything other than a JSON object yields the all-empty metadata.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };

        Self {
            title: scalar_field(obj, "title"),
            keywords: keywords_field(obj.get("keywords")),
            thumbnail: scalar_field(obj, "thumbnail"),
            video_duration: scalar_field(obj, "video_duration"),
            word_count: match obj.get("word_count") {
                Some(Value::Number(n)) => Some(WordCount::Count(n.clone())),
                Some(Value::String(s)) => Some(WordCount::Text(s.clone())),
                _ => None,
            },
            lang: scalar_field(obj, "lang"),
            published_time: scalar_field(obj, "published_time"),
            last_updated: scalar_field(obj, "last_updated"),
            description: scalar_field(obj, "description"),
            author: scalar_field(obj, "author"),
            classes: classes_field(obj.get("classes")),
        }
    }
}

/// A monthly sitemap resolved to the bucket its articles belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    pub url: String,
    pub year: i32,
    pub month: u32,
}

impl SitemapEntry {
    /// Resolve a sitemap URL to its bucket from the `-YYYY-MM` suffix of its name.
    pub fn from_url(url: &str) -> Result<Self, ParseError> {
        let (year, month) = extract_year_month(url)?;
        Ok(Self {
            url: url.to_string(),
            year,
            month,
        })
    }

    /// `YYYY-MM`, for logs.
    pub fn period(&self) -> String {
        format!("{}-{:02}", self.year, self.month)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(scalar_text)
}

fn keywords_field(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(Value::String(s)) => split_keywords(s),
        _ => Vec::new(),
    }
}

fn classes_field(value: Option<&Value>) -> Vec<TaxonomyTag> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| {
            let obj = item.as_object()?;
            Some(TaxonomyTag {
                mapping: scalar_field(obj, "mapping")?,
                value: scalar_field(obj, "value")?,
            })
        })
        .collect()
}

/// Accept `keywords` either as a list or as one comma-separated string.
fn keywords_list_or_csv<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(keywords_field(value.as_ref()))
}
