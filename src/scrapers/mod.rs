//! Fetching and parsing of the publisher's documents.
//!
//! Scraping happens at three levels, each with the same failure policy: a
//! document that cannot be fetched is logged and reported as a [`FetchError`](crate::error::FetchError),
//! and the caller decides whether that ends the run or only skips one unit.
//!
//! | Level | Module | Produces |
//! |-------|--------|----------|
//! | Sitemap index | [`sitemap`] | Monthly sitemap URLs |
//! | Monthly sitemap | [`sitemap`] | Article URLs |
//! | Article page | [`article`] | [`ArticleRecord`](crate::models::ArticleRecord) |

pub mod article;
pub mod sitemap;
