//! Story Export - event export, enrichment and aggregation.
//!
//! This library pulls raw session events out of a cursor-paginated export
//! API, derives analysis fields for every record and rolls the result up
//! into a fixed catalogue of aggregations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Story Export                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │    Fetch    │──▶│   Enrich    │──▶│  Aggregate  │       │
//! │  │ (list/get)  │   │ (per day)   │   │ (catalogue) │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         │                                    │              │
//! │         ▼                                    ▼              │
//! │  ┌─────────────┐                     ┌─────────────┐       │
//! │  │   RunLog    │                     │   Daily     │       │
//! │  │  Observer   │                     │  Reports    │       │
//! │  └─────────────┘                     └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use story_export::{pipeline, Config, ExportClient, ExportRequest, RunLog};
//!
//! # async fn demo() -> story_export::Result<()> {
//! let config = Config::load(None)?;
//! let client = ExportClient::new(&config)?;
//! let log = RunLog::new();
//!
//! let request = ExportRequest::new(1_563_148_800, Some(1_563_235_200));
//! let outcome = pipeline::run(&config, &client, &request, &log).await?;
//! for report in outcome.reports() {
//!     println!("{}: {} records", report.label(), report.records.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod config;
pub mod enrich;
pub mod error;
pub mod fetch;
pub mod observe;
pub mod pipeline;

// Re-export key types at crate root for convenience
pub use aggregate::{
    aggregate, all_aggregations, AggregationCatalogue, AggregationKind, AggregationOutput,
    AggregationResult, TransitionGraph,
};
pub use config::{Config, ConfigError, RouteConfig};
pub use enrich::{enrich, EnrichedEventRecord, Enricher, RawEventRecord};
pub use error::{Error, RequestError, Result};
pub use fetch::{fetch_records, ExportClient, ExportDescriptor, ExportId, ExportSource, FetchOptions};
pub use observe::{NoopObserver, PipelineObserver, RunLog, RunStats};
pub use pipeline::{DailyReport, ExportRequest, PipelineOutcome};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
