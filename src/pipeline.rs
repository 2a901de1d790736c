//! Fetch, enrich and aggregate one requested range.
//!
//! The pipeline owns no I/O besides the [`ExportSource`] it is handed;
//! writing artifacts is left to the caller.

use crate::aggregate::{all_aggregations, AggregationCatalogue};
use crate::config::Config;
use crate::enrich::decompose::parse_event_start;
use crate::enrich::{EnrichedEventRecord, Enricher, RawEventRecord};
use crate::error::{Error, Result};
use crate::fetch::{fetch_records, ExportSource, FetchOptions};
use crate::observe::PipelineObserver;
use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

/// Range to export, in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportRequest {
    pub start: i64,
    /// Exclusive end, or open-ended
    pub end: Option<i64>,
    /// Whether to run the aggregation catalogue per day
    pub aggregate: bool,
}

impl ExportRequest {
    pub fn new(start: i64, end: Option<i64>) -> Self {
        Self {
            start,
            end,
            aggregate: true,
        }
    }

    /// Request covering whole calendar days in `tz`, `end` inclusive.
    pub fn for_dates(start: NaiveDate, end: Option<NaiveDate>, tz: Tz, aggregate: bool) -> Self {
        Self {
            start: day_start(start, tz),
            end: end.map(|end| day_start(end + Days::new(1), tz)),
            aggregate,
        }
    }
}

/// Calendar date of `at` in `tz`.
pub fn date_in(at: DateTime<Utc>, tz: Tz) -> NaiveDate {
    at.with_timezone(&tz).date_naive()
}

/// Epoch second at which `date` begins in `tz`.
///
/// Where midnight does not exist (a DST gap) the earliest valid instant
/// after it is used.
pub fn day_start(date: NaiveDate, tz: Tz) -> i64 {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    match tz.from_local_datetime(&midnight).earliest() {
        Some(at) => at.timestamp(),
        None => (0..24 * 60)
            .find_map(|minutes| {
                tz.from_local_datetime(&(midnight + chrono::Duration::minutes(minutes)))
                    .earliest()
            })
            .map(|at| at.timestamp())
            .unwrap_or_else(|| midnight.and_utc().timestamp()),
    }
}

/// Enriched records and aggregations of one calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyReport {
    /// `None` for records whose `EventStart` could not be parsed
    pub day: Option<NaiveDate>,
    pub records: Vec<EnrichedEventRecord>,
    pub aggregations: Option<AggregationCatalogue>,
    /// Records removed by blacklists
    pub dropped: usize,
}

impl DailyReport {
    /// `MMDDYYYY`, or `undated`.
    pub fn label(&self) -> String {
        match self.day {
            Some(day) => day.format("%m%d%Y").to_string(),
            None => "undated".to_string(),
        }
    }

    pub fn records_file_name(&self) -> String {
        format!("export-{}.json", self.label())
    }

    pub fn aggregations_file_name(&self) -> String {
        format!("export-{}-aggregations.json", self.label())
    }
}

/// Result of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// The range held no exports, or the exports held no records.
    NoData,
    /// One report per day, ordered by day; undated records come first.
    Reports(Vec<DailyReport>),
}

impl PipelineOutcome {
    pub fn reports(&self) -> &[DailyReport] {
        match self {
            PipelineOutcome::NoData => &[],
            PipelineOutcome::Reports(reports) => reports,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reports().is_empty()
    }
}

/// Group raw records by the calendar day of `EventStart` in `tz`.
///
/// Input order is kept within each day.
pub fn partition_by_day(
    records: Vec<RawEventRecord>,
    tz: Tz,
) -> BTreeMap<Option<NaiveDate>, Vec<RawEventRecord>> {
    let mut days: BTreeMap<Option<NaiveDate>, Vec<RawEventRecord>> = BTreeMap::new();
    for record in records {
        let day = record
            .event_start
            .as_deref()
            .and_then(parse_event_start)
            .map(|at| at.with_timezone(&tz).date_naive());
        days.entry(day).or_default().push(record);
    }
    days
}

/// Run the pipeline once over `request`.
///
/// Enrichment rules and the timezone are checked before the first call to
/// `source`, so a bad configuration never reaches the network.
pub async fn run<S>(
    config: &Config,
    source: &S,
    request: &ExportRequest,
    observer: &dyn PipelineObserver,
) -> Result<PipelineOutcome>
where
    S: ExportSource + ?Sized,
{
    let enricher = Enricher::new(config)?;
    let tz = config.tz()?;
    let options = FetchOptions::from_config(config);

    let records = fetch_records(source, &options, request.start, request.end, observer).await?;
    if records.is_empty() {
        info!(start = request.start, end = ?request.end, "Nothing to export");
        return Ok(PipelineOutcome::NoData);
    }

    let reports = partition_by_day(records, tz)
        .into_iter()
        .map(|(day, raw)| {
            let total = raw.len();
            let records = enricher.enrich(raw);
            let dropped = total - records.len();
            observer.on_enriched(day, records.len(), dropped);

            let aggregations = request.aggregate.then(|| all_aggregations(&records));
            debug!(?day, aggregated = aggregations.is_some(), "Built daily report");
            DailyReport {
                day,
                records,
                aggregations,
                dropped,
            }
        })
        .collect();

    Ok(PipelineOutcome::Reports(reports))
}

/// [`run`] bounded by `limit`; expiry is [`Error::Timeout`].
pub async fn run_with_timeout<S>(
    config: &Config,
    source: &S,
    request: &ExportRequest,
    observer: &dyn PipelineObserver,
    limit: Duration,
) -> Result<PipelineOutcome>
where
    S: ExportSource + ?Sized,
{
    tokio::time::timeout(limit, run(config, source, request, observer))
        .await
        .map_err(|_| Error::Timeout(limit))?
}
