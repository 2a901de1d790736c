//! Progress hooks called by the fetch loop and the pipeline.

use crate::fetch::{ExportDescriptor, ExportPage};
use chrono::NaiveDate;

/// Receives progress notifications during a run.
///
/// All methods default to doing nothing, so implementors only override the
/// hooks they care about. Hooks may be called from concurrent body fetches.
pub trait PipelineObserver: Send + Sync {
    /// Listing is about to start at `start`.
    fn on_fetch_start(&self, _start: i64, _end: Option<i64>) {}

    /// A list page came back.
    fn on_page(&self, _page: &ExportPage) {}

    /// The listing held no exports.
    fn on_empty(&self, _start: i64, _end: Option<i64>) {}

    /// `count` export bodies are about to be fetched.
    fn on_exports_start(&self, _count: usize) {}

    /// One export body was fetched and decoded.
    fn on_export(&self, _descriptor: &ExportDescriptor, _records: usize) {}

    /// Records of one day were enriched.
    fn on_enriched(&self, _day: Option<NaiveDate>, _kept: usize, _dropped: usize) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}
