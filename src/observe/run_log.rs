//! Run statistics and structured progress logging.

use crate::fetch::{ExportDescriptor, ExportPage, NextPage};
use crate::observe::observer::PipelineObserver;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Counts what a run listed, fetched and kept, logging as it goes.
#[derive(Debug)]
pub struct RunLog {
    /// Number of list calls
    pages_listed: AtomicU64,
    /// Number of descriptors seen across all pages
    exports_listed: AtomicU64,
    /// Number of export bodies fetched
    exports_fetched: AtomicU64,
    /// Raw records decoded from bodies
    records_fetched: AtomicU64,
    records_kept: AtomicU64,
    records_dropped: AtomicU64,
    days_reported: AtomicU64,
    run_start: DateTime<Utc>,
}

impl RunLog {
    pub fn new() -> Self {
        Self {
            pages_listed: AtomicU64::new(0),
            exports_listed: AtomicU64::new(0),
            exports_fetched: AtomicU64::new(0),
            records_fetched: AtomicU64::new(0),
            records_kept: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
            days_reported: AtomicU64::new(0),
            run_start: Utc::now(),
        }
    }

    /// Get the current statistics.
    pub fn stats(&self) -> RunStats {
        RunStats {
            pages_listed: self.pages_listed.load(Ordering::Relaxed),
            exports_listed: self.exports_listed.load(Ordering::Relaxed),
            exports_fetched: self.exports_fetched.load(Ordering::Relaxed),
            records_fetched: self.records_fetched.load(Ordering::Relaxed),
            records_kept: self.records_kept.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            days_reported: self.days_reported.load(Ordering::Relaxed),
            run_start: self.run_start,
            run_duration_secs: (Utc::now() - self.run_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Run Statistics:\n\
             - List pages requested: {}\n\
             - Exports listed: {}\n\
             - Exports fetched: {}\n\
             - Records fetched: {}\n\
             - Records kept: {}\n\
             - Records dropped by blacklists: {}\n\
             - Days reported: {}\n\
             - Run duration: {} seconds",
            stats.pages_listed,
            stats.exports_listed,
            stats.exports_fetched,
            stats.records_fetched,
            stats.records_kept,
            stats.records_dropped,
            stats.days_reported,
            stats.run_duration_secs
        )
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineObserver for RunLog {
    fn on_fetch_start(&self, start: i64, end: Option<i64>) {
        info!(start, ?end, "Listing exports");
    }

    fn on_page(&self, page: &ExportPage) {
        self.pages_listed.fetch_add(1, Ordering::Relaxed);
        self.exports_listed
            .fetch_add(page.descriptors.len() as u64, Ordering::Relaxed);
        debug!(
            cursor = page.cursor,
            exports = page.descriptors.len(),
            next = ?page.next,
            "Listed page"
        );
        match page.next {
            NextPage::Stalled(next) => warn!(
                cursor = page.cursor,
                next, "Export list did not advance the cursor, stopping"
            ),
            NextPage::PastEnd(next) => debug!(next, "Cursor passed the requested end"),
            NextPage::Advance(_) | NextPage::LastPage => {}
        }
    }

    fn on_empty(&self, start: i64, end: Option<i64>) {
        info!(start, ?end, "No exports in range");
    }

    fn on_exports_start(&self, count: usize) {
        info!(count, "Fetching exports");
    }

    fn on_export(&self, descriptor: &ExportDescriptor, records: usize) {
        self.exports_fetched.fetch_add(1, Ordering::Relaxed);
        self.records_fetched
            .fetch_add(records as u64, Ordering::Relaxed);
        debug!(
            id = %descriptor.id,
            start = descriptor.start,
            stop = descriptor.stop,
            records,
            "Fetched export"
        );
    }

    fn on_enriched(&self, day: Option<NaiveDate>, kept: usize, dropped: usize) {
        self.days_reported.fetch_add(1, Ordering::Relaxed);
        self.records_kept.fetch_add(kept as u64, Ordering::Relaxed);
        self.records_dropped
            .fetch_add(dropped as u64, Ordering::Relaxed);
        info!(?day, kept, dropped, "Enriched records");
    }
}

/// Snapshot of run statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunStats {
    pub pages_listed: u64,
    pub exports_listed: u64,
    pub exports_fetched: u64,
    pub records_fetched: u64,
    pub records_kept: u64,
    pub records_dropped: u64,
    pub days_reported: u64,
    pub run_start: DateTime<Utc>,
    pub run_duration_secs: u64,
}
