//! Drives a crawl from the sitemap index down to persisted batches.
//!
//! ```text
//! INIT → INDEXED → WORKLIST_BUILT → (FETCHING_URLS → EXTRACTING → PERSISTING)* → DONE
//!          └──────→ FAILED_INDEX
//! ```
//!
//! Only an unusable sitemap index ends a run early. A monthly sitemap that
//! cannot be fetched or dated is skipped, an article that cannot be fetched
//! is skipped, and a batch that cannot be written is lost for this run; the
//! crawl moves on to the next unit in every case.

use crate::config::CrawlSettings;
use crate::error::CrawlError;
use crate::http::FetchText;
use crate::models::{ArticleRecord, SitemapEntry};
use crate::outputs::json::BatchWriter;
use crate::quota::{allocate, build_worklist, RunQuota};
use crate::scrapers::article::scrape_article;
use crate::scrapers::sitemap::{fetch_article_urls, fetch_index};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{debug, error, info, instrument, warn};

/// What happened to one monthly sitemap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketOutcome {
    Persisted {
        year: i32,
        month: u32,
        count: usize,
        path: PathBuf,
    },
    /// Fetched, but no article could be extracted.
    Empty { year: i32, month: u32 },
    FetchFailed { year: i32, month: u32 },
    /// The sitemap URL carries no usable `-YYYY-MM` suffix.
    UndatedSitemap,
    PersistFailed { year: i32, month: u32, count: usize },
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub worklist_len: usize,
    pub per_bucket_cap: usize,
    pub overall_count: usize,
    /// One entry per visited sitemap, in processing order.
    pub buckets: Vec<(String, BucketOutcome)>,
}

impl RunReport {
    pub fn persisted(&self) -> usize {
        self.buckets
            .iter()
            .filter(|(_, outcome)| matches!(outcome, BucketOutcome::Persisted { .. }))
            .count()
    }
}

pub struct Orchestrator<'a, F> {
    fetcher: &'a F,
    writer: &'a BatchWriter,
    settings: &'a CrawlSettings,
}

impl<'a, F: FetchText> Orchestrator<'a, F> {
    pub fn new(fetcher: &'a F, writer: &'a BatchWriter, settings: &'a CrawlSettings) -> Self {
        Self {
            fetcher,
            writer,
            settings,
        }
    }

    /// Run the crawl to completion.
    ///
    /// # Returns
    ///
    /// A [`RunReport`] with one outcome per visited sitemap, or
    /// [`CrawlError::IndexUnavailable`] when the sitemap index cannot be
    /// fetched or lists nothing. Failures below the index never end the run.
    #[instrument(level = "info", skip(self), fields(index_url = %self.settings.index_url, limit = self.settings.overall_limit))]
    pub async fn run(&self) -> Result<RunReport, CrawlError> {
        let index_url = &self.settings.index_url;
        let discovered = match fetch_index(self.fetcher, index_url).await {
            Ok(urls) if !urls.is_empty() => urls,
            Ok(_) => {
                error!("Sitemap index lists no sitemaps; aborting run");
                return Err(CrawlError::IndexUnavailable {
                    url: index_url.clone(),
                    source: None,
                });
            }
            Err(e) => {
                error!(error = %e, "Sitemap index unavailable; aborting run");
                return Err(CrawlError::IndexUnavailable {
                    url: index_url.clone(),
                    source: Some(e),
                });
            }
        };
        info!(discovered = discovered.len(), "Sitemap index fetched");

        let worklist = build_worklist(discovered, &self.settings.target_years);
        let per_bucket_cap = allocate(&worklist, self.settings.overall_limit);
        info!(
            worklist = worklist.len(),
            per_bucket_cap,
            target_years = ?self.settings.target_years,
            "Worklist built"
        );

        let mut quota = RunQuota::new(self.settings.overall_limit, per_bucket_cap);
        let mut seen = HashSet::new();
        let mut buckets = Vec::with_capacity(worklist.len());

        for sitemap_url in &worklist {
            if quota.overall_reached() {
                info!(
                    overall = quota.overall_count(),
                    limit = quota.overall_limit(),
                    "Overall article limit reached"
                );
                break;
            }
            let outcome = self.process_bucket(sitemap_url, &mut quota, &mut seen).await;
            buckets.push((sitemap_url.clone(), outcome));
        }

        let report = RunReport {
            worklist_len: worklist.len(),
            per_bucket_cap: quota.per_bucket_cap(),
            overall_count: quota.overall_count(),
            buckets,
        };
        info!(
            overall = report.overall_count,
            persisted = report.persisted(),
            visited = report.buckets.len(),
            "Crawl complete"
        );
        Ok(report)
    }

    #[instrument(level = "info", skip(self, quota, seen))]
    async fn process_bucket(
        &self,
        sitemap_url: &str,
        quota: &mut RunQuota,
        seen: &mut HashSet<String>,
    ) -> BucketOutcome {
        let entry = match SitemapEntry::from_url(sitemap_url) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping undated sitemap");
                return BucketOutcome::UndatedSitemap;
            }
        };
        let (year, month) = (entry.year, entry.month);

        let article_urls = match fetch_article_urls(self.fetcher, &entry.url).await {
            Ok(urls) => urls,
            Err(e) => {
                warn!(period = %entry.period(), error = %e, "Skipping sitemap");
                return BucketOutcome::FetchFailed { year, month };
            }
        };

        quota.start_bucket();
        let records = self.extract_bucket(&article_urls, quota, seen).await;
        info!(
            period = %entry.period(),
            scraped = quota.bucket_count(),
            listed = article_urls.len(),
            overall = quota.overall_count(),
            "Bucket extracted"
        );

        if records.is_empty() {
            return BucketOutcome::Empty { year, month };
        }

        let count = records.len();
        match self.writer.persist(&records, year, month).await {
            Ok(path) => BucketOutcome::Persisted {
                year,
                month,
                count,
                path,
            },
            Err(e) => {
                error!(period = %entry.period(), error = %e, "Failed to persist bucket; records lost for this run");
                BucketOutcome::PersistFailed { year, month, count }
            }
        }
    }

    /// Scrape a bucket's articles until its cap or the overall limit is hit.
    ///
    /// Pages are requested in waves of at most `min(concurrency, room)`, so
    /// the number of successes can never pass either limit even when several
    /// requests are in flight.
    async fn extract_bucket(
        &self,
        article_urls: &[String],
        quota: &mut RunQuota,
        seen: &mut HashSet<String>,
    ) -> Vec<ArticleRecord> {
        let concurrency = self.settings.concurrency.max(1);
        let mut pending = article_urls.iter();
        let mut records = Vec::new();

        loop {
            let room = quota.room();
            if room == 0 {
                break;
            }

            let wave: Vec<&String> = pending
                .by_ref()
                .filter(|url| seen.insert(url.to_string()))
                .take(room.min(concurrency))
                .collect();
            if wave.is_empty() {
                break;
            }

            let results: Vec<_> = stream::iter(wave)
                .map(|url| scrape_article(self.fetcher, url))
                .buffered(concurrency)
                .collect()
                .await;

            for result in results {
                match result {
                    Ok(record) => {
                        if quota.record_success() {
                            records.push(record);
                        }
                    }
                    Err(e) => debug!(url = e.url(), error = %e, "Article skipped"),
                }
            }
        }

        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::StubFetcher;

    const INDEX_URL: &str = "https://example.com/sitemaps/all.xml";

    fn index_xml(sitemaps: &[String]) -> String {
        let entries: String = sitemaps
            .iter()
            .map(|s| format!("<sitemap><loc>{s}</loc></sitemap>"))
            .collect();
        format!(r#"<?xml version="1.0"?><sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</sitemapindex>"#)
    }

    fn urlset_xml(urls: &[String]) -> String {
        let entries: String = urls.iter().map(|u| format!("<url><loc>{u}</loc></url>")).collect();
        format!(r#"<?xml version="1.0"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</urlset>"#)
    }

    fn sitemap_url(year: i32, month: u32) -> String {
        format!("https://example.com/sitemaps/sitemap-{year}-{month:02}.xml")
    }

    fn article_url(year: i32, month: u32, n: usize) -> String {
        format!("https://example.com/news/{year}/{month}/{n}")
    }

    fn article_html(n: usize) -> String {
        format!(
            r#"<html><head><meta name="postid" content="{n}">
            <script id="tawsiyat-metadata" type="text/tawsiyat">{{"title": "Story {n}"}}</script>
            </head><body><p class="lg_para">Paragraph {n}</p></body></html>"#
        )
    }

    /// A site with one sitemap per `(year, month)`, each listing `per_month` articles.
    fn site(periods: &[(i32, u32)], per_month: usize) -> StubFetcher {
        let sitemaps: Vec<String> = periods.iter().map(|(y, m)| sitemap_url(*y, *m)).collect();
        let mut stub = StubFetcher::new().page(INDEX_URL, index_xml(&sitemaps));
        for &(year, month) in periods {
            let urls: Vec<String> = (0..per_month).map(|n| article_url(year, month, n)).collect();
            stub = stub.page(&sitemap_url(year, month), urlset_xml(&urls));
            for (n, url) in urls.iter().enumerate() {
                stub = stub.page(url, article_html(n));
            }
        }
        stub
    }

    fn settings(limit: usize, concurrency: usize) -> CrawlSettings {
        CrawlSettings {
            index_url: INDEX_URL.to_string(),
            overall_limit: limit,
            target_years: vec![2023, 2024],
            concurrency,
        }
    }

    const FIVE_MONTHS: [(i32, u32); 5] = [(2023, 1), (2024, 1), (2023, 2), (2024, 3), (2024, 2)];

    #[tokio::test]
    async fn test_end_to_end_five_buckets() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = BatchWriter::new(tmp.path());
        let stub = site(&FIVE_MONTHS, 3);
        let settings = settings(100, 1);

        let report = Orchestrator::new(&stub, &writer, &settings).run().await.unwrap();

        assert_eq!(report.worklist_len, 5);
        assert_eq!(report.per_bucket_cap, 20);
        assert_eq!(report.overall_count, 15);
        let visited: Vec<&str> = report.buckets.iter().map(|(u, _)| u.as_str()).collect();
        assert_eq!(
            visited,
            vec![
                sitemap_url(2024, 3),
                sitemap_url(2024, 2),
                sitemap_url(2024, 1),
                sitemap_url(2023, 2),
                sitemap_url(2023, 1),
            ]
        );
        assert_eq!(report.persisted(), 5);

        let records = crate::outputs::json::read_batch(&writer.batch_path(2024, 2)).await.unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].url, article_url(2024, 2, 0));
        assert_eq!(records[0].post_id.as_deref(), Some("0"));
        assert_eq!(records[0].title.as_deref(), Some("Story 0"));
        assert_eq!(records[0].full_text, "Paragraph 0");
    }

    #[tokio::test]
    async fn test_per_bucket_cap_is_static() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = BatchWriter::new(tmp.path());
        // Cap is 10 / 5 = 2 per bucket; buckets list 3 articles each.
        let stub = site(&FIVE_MONTHS, 3);
        let settings = settings(10, 1);

        let report = Orchestrator::new(&stub, &writer, &settings).run().await.unwrap();

        assert_eq!(report.per_bucket_cap, 2);
        assert_eq!(report.overall_count, 10);
        for (_, outcome) in &report.buckets {
            assert!(matches!(outcome, BucketOutcome::Persisted { count: 2, .. }));
        }
        // The third article of each month is never requested.
        assert!(!stub.requests().contains(&article_url(2024, 3, 2)));
    }

    #[tokio::test]
    async fn test_unused_quota_is_not_redistributed() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = BatchWriter::new(tmp.path());
        let mut stub = site(&[(2024, 2), (2024, 1)], 5);
        // The newest month has only one reachable article.
        for n in 1..5 {
            stub = stub.status(&article_url(2024, 2, n), 500);
        }
        let settings = settings(8, 1);

        let report = Orchestrator::new(&stub, &writer, &settings).run().await.unwrap();

        assert_eq!(report.per_bucket_cap, 4);
        assert_eq!(report.overall_count, 5);
        assert!(matches!(
            report.buckets[0].1,
            BucketOutcome::Persisted { count: 1, .. }
        ));
        assert!(matches!(
            report.buckets[1].1,
            BucketOutcome::Persisted { count: 4, .. }
        ));
    }

    #[tokio::test]
    async fn test_failed_bucket_does_not_stop_run() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = BatchWriter::new(tmp.path());
        let stub = site(&[(2024, 3), (2024, 2), (2024, 1)], 2).status(&sitemap_url(2024, 2), 502);
        let settings = settings(30, 1);

        let report = Orchestrator::new(&stub, &writer, &settings).run().await.unwrap();

        assert_eq!(report.buckets.len(), 3);
        assert!(matches!(report.buckets[1].1, BucketOutcome::FetchFailed { year: 2024, month: 2 }));
        assert!(matches!(report.buckets[2].1, BucketOutcome::Persisted { month: 1, count: 2, .. }));
        assert_eq!(report.overall_count, 4);
        assert!(writer.batch_path(2024, 1).exists());
        assert!(!writer.batch_path(2024, 2).exists());
    }

    #[tokio::test]
    async fn test_undated_sitemap_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = BatchWriter::new(tmp.path());
        let undated = "https://example.com/sitemaps/sitemap-2024-latest.xml".to_string();
        let dated = sitemap_url(2024, 1);
        let stub = StubFetcher::new()
            .page(INDEX_URL, index_xml(&[undated.clone(), dated.clone()]))
            .page(&dated, urlset_xml(&[article_url(2024, 1, 0)]))
            .page(&article_url(2024, 1, 0), article_html(0));
        let settings = settings(10, 1);

        let report = Orchestrator::new(&stub, &writer, &settings).run().await.unwrap();

        let outcome = |url: &str| report.buckets.iter().find(|(u, _)| u == url).map(|(_, o)| o.clone());
        assert_eq!(outcome(&undated), Some(BucketOutcome::UndatedSitemap));
        assert!(matches!(outcome(&dated), Some(BucketOutcome::Persisted { count: 1, .. })));
        assert!(!stub.requests().contains(&undated));
    }

    #[tokio::test]
    async fn test_index_failure_aborts_run() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = BatchWriter::new(tmp.path());
        let settings = settings(10, 1);

        let stub = StubFetcher::new().status(INDEX_URL, 500);
        let err = Orchestrator::new(&stub, &writer, &settings).run().await.unwrap_err();
        assert!(matches!(err, CrawlError::IndexUnavailable { source: Some(_), .. }));

        let empty = StubFetcher::new().page(INDEX_URL, index_xml(&[]));
        let err = Orchestrator::new(&empty, &writer, &settings).run().await.unwrap_err();
        assert!(matches!(err, CrawlError::IndexUnavailable { source: None, .. }));
    }

    #[tokio::test]
    async fn test_persist_failure_does_not_stop_run() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocked");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let writer = BatchWriter::new(&blocker);
        let stub = site(&[(2024, 2), (2024, 1)], 2);
        let settings = settings(10, 1);

        let report = Orchestrator::new(&stub, &writer, &settings).run().await.unwrap();

        assert_eq!(report.buckets.len(), 2);
        for (_, outcome) in &report.buckets {
            assert!(matches!(outcome, BucketOutcome::PersistFailed { count: 2, .. }));
        }
        assert_eq!(report.overall_count, 4);
    }

    #[tokio::test]
    async fn test_overall_limit_stops_outer_loop() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = BatchWriter::new(tmp.path());
        // A single bucket, so its cap equals the overall limit.
        let stub = site(&[(2024, 1)], 10);
        let settings = settings(3, 1);

        let report = Orchestrator::new(&stub, &writer, &settings).run().await.unwrap();

        assert_eq!(report.per_bucket_cap, 3);
        assert_eq!(report.overall_count, 3);
        let article_requests = stub
            .requests()
            .iter()
            .filter(|u| u.contains("/news/"))
            .count();
        assert_eq!(article_requests, 3);
    }

    #[tokio::test]
    async fn test_concurrent_waves_respect_caps() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = BatchWriter::new(tmp.path());
        let mut stub = site(&FIVE_MONTHS, 9);
        // Every other article fails, so waves have to be topped up.
        for &(year, month) in &FIVE_MONTHS {
            for n in (0..9).step_by(2) {
                stub = stub.status(&article_url(year, month, n), 404);
            }
        }
        let settings = settings(17, 4);

        let report = Orchestrator::new(&stub, &writer, &settings).run().await.unwrap();

        assert_eq!(report.per_bucket_cap, 3);
        assert_eq!(report.overall_count, 15);
        for (_, outcome) in &report.buckets {
            assert!(matches!(outcome, BucketOutcome::Persisted { count: 3, .. }));
        }
        let records = crate::outputs::json::read_batch(&writer.batch_path(2023, 1)).await.unwrap();
        let urls: Vec<String> = records.into_iter().map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec![article_url(2023, 1, 1), article_url(2023, 1, 3), article_url(2023, 1, 5)]
        );
    }

    #[tokio::test]
    async fn test_article_url_scraped_once_per_run() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = BatchWriter::new(tmp.path());
        let shared = article_url(2024, 1, 0);
        let stub = StubFetcher::new()
            .page(INDEX_URL, index_xml(&[sitemap_url(2024, 2), sitemap_url(2024, 1)]))
            .page(&sitemap_url(2024, 2), urlset_xml(&[shared.clone()]))
            .page(&sitemap_url(2024, 1), urlset_xml(&[shared.clone()]))
            .page(&shared, article_html(0));
        let settings = settings(10, 1);

        let report = Orchestrator::new(&stub, &writer, &settings).run().await.unwrap();

        assert_eq!(report.overall_count, 1);
        assert!(matches!(report.buckets[1].1, BucketOutcome::Empty { year: 2024, month: 1 }));
        assert_eq!(stub.requests().iter().filter(|u| **u == shared).count(), 1);
    }
}
