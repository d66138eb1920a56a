//! Worklist ordering and the fixed per-bucket scraping quota.
//!
//! The overall article budget is split evenly across the monthly sitemaps
//! that survive year filtering. The split is computed once before any bucket
//! is processed; a bucket that yields fewer articles than its cap does not
//! hand its leftover to later buckets, so a run can finish below its budget.

use crate::scrapers::sitemap::extract_year_month;
use itertools::Itertools;
use std::cmp::Reverse;
use tracing::debug;

/// Per-bucket cap for a worklist: `floor(limit / len)`, or `limit` when empty.
pub fn allocate(worklist: &[String], overall_limit: usize) -> usize {
    if worklist.is_empty() {
        overall_limit
    } else {
        overall_limit / worklist.len()
    }
}

/// Order discovered sitemaps for processing.
///
/// Sitemaps are sorted newest period first, then grouped by target year in
/// descending year order: every sitemap of the most recent target year comes
/// before any sitemap of the next one. A sitemap belongs to the most recent
/// target year its URL mentions; sitemaps mentioning none are dropped.
pub fn build_worklist(discovered: Vec<String>, target_years: &[i32]) -> Vec<String> {
    let years: Vec<i32> = target_years
        .iter()
        .copied()
        .sorted_unstable_by_key(|year| Reverse(*year))
        .dedup()
        .collect();

    let sorted: Vec<String> = discovered
        .into_iter()
        .unique()
        .sorted_by_cached_key(|url| Reverse((extract_year_month(url).ok(), url.clone())))
        .collect();

    let mut partitions: Vec<Vec<String>> = vec![Vec::new(); years.len()];
    for url in sorted {
        if let Some(slot) = years.iter().position(|year| url.contains(&year.to_string())) {
            partitions[slot].push(url);
        }
    }

    let worklist: Vec<String> = partitions.into_iter().flatten().collect();
    debug!(count = worklist.len(), ?years, "Built worklist");
    worklist
}

/// Running article counts for one crawl.
///
/// `overall_count` never exceeds `overall_limit` and `bucket_count` never
/// exceeds `per_bucket_cap`; [`RunQuota::room`] is the only way to ask how
/// many more successes may be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunQuota {
    overall_limit: usize,
    overall_count: usize,
    per_bucket_cap: usize,
    bucket_count: usize,
}

impl RunQuota {
    pub fn new(overall_limit: usize, per_bucket_cap: usize) -> Self {
        Self {
            overall_limit,
            overall_count: 0,
            per_bucket_cap,
            bucket_count: 0,
        }
    }

    pub fn overall_limit(&self) -> usize {
        self.overall_limit
    }

    pub fn overall_count(&self) -> usize {
        self.overall_count
    }

    pub fn per_bucket_cap(&self) -> usize {
        self.per_bucket_cap
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Reset the bucket counter for the next bucket.
    pub fn start_bucket(&mut self) {
        self.bucket_count = 0;
    }

    pub fn overall_reached(&self) -> bool {
        self.overall_count >= self.overall_limit
    }

    /// Successes still allowed in the current bucket.
    pub fn room(&self) -> usize {
        let bucket_room = self.per_bucket_cap.saturating_sub(self.bucket_count);
        let overall_room = self.overall_limit.saturating_sub(self.overall_count);
        bucket_room.min(overall_room)
    }

    /// Count one extracted article. Returns `false`, counting nothing, when there is no room.
    pub fn record_success(&mut self) -> bool {
        if self.room() == 0 {
            return false;
        }
        self.bucket_count += 1;
        self.overall_count += 1;
        true
    }
}
