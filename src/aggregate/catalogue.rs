//! The fixed catalogue of named aggregations.

use crate::aggregate::result::AggregationOutput;
use crate::aggregate::rollup::{count_by, count_by2, mean_by, transition_graph};
use crate::enrich::record::EnrichedEventRecord;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Bucket key used when a record has no value for a grouping dimension.
pub const UNKNOWN_KEY: &str = "unknown";

/// Every aggregation the engine knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AggregationKind {
    EventsByDay,
    EventsByDayByCustomer,
    EventsByTimeOfDay,
    EventsByDayOfWeek,
    EventsByUser,
    CustomEventsByType,
    EventsByBrowser,
    EventsByOs,
    EventsByPage,
    EventsByPageByCustomer,
    ErrorsByPage,
    FirstPaintByPage,
    NavigationGraph,
}

impl AggregationKind {
    /// Catalogue order.
    pub const ALL: [AggregationKind; 13] = [
        AggregationKind::EventsByDay,
        AggregationKind::EventsByDayByCustomer,
        AggregationKind::EventsByTimeOfDay,
        AggregationKind::EventsByDayOfWeek,
        AggregationKind::EventsByUser,
        AggregationKind::CustomEventsByType,
        AggregationKind::EventsByBrowser,
        AggregationKind::EventsByOs,
        AggregationKind::EventsByPage,
        AggregationKind::EventsByPageByCustomer,
        AggregationKind::ErrorsByPage,
        AggregationKind::FirstPaintByPage,
        AggregationKind::NavigationGraph,
    ];

    /// Key of this aggregation in exported catalogues.
    pub fn name(self) -> &'static str {
        match self {
            AggregationKind::EventsByDay => "allEventsByDay",
            AggregationKind::EventsByDayByCustomer => "allEventsByDayByCustomer",
            AggregationKind::EventsByTimeOfDay => "allEventsByTimeOfDay",
            AggregationKind::EventsByDayOfWeek => "allEventsByDayOfTheWeek",
            AggregationKind::EventsByUser => "allEventsByUser",
            AggregationKind::CustomEventsByType => "customEventsByType",
            AggregationKind::EventsByBrowser => "allEventsByBrowser",
            AggregationKind::EventsByOs => "allEventsByOS",
            AggregationKind::EventsByPage => "allEventsByPage",
            AggregationKind::EventsByPageByCustomer => "allEventsByPageByCustomer",
            AggregationKind::ErrorsByPage => "errorsByPage",
            AggregationKind::FirstPaintByPage => "timesToFirstPaintByPage",
            AggregationKind::NavigationGraph => "navigateEventsSankey",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Run this aggregation over `records`.
    pub fn compute(self, records: &[EnrichedEventRecord]) -> AggregationOutput {
        use AggregationKind::*;

        let grouped = match self {
            EventsByDay => count_by(records, |r| key(&r.event_day)),
            EventsByDayByCustomer => count_by2(records, |r| key(&r.event_day), customer),
            EventsByTimeOfDay => count_by(records, |r| key(&r.event_hour_of_day)),
            EventsByDayOfWeek => count_by(records, |r| key(&r.event_day_of_week)),
            EventsByUser => count_by(records, user),
            CustomEventsByType => count_by2(
                records.iter().filter(|r| r.is_event("custom")),
                |r| text_key(r, "EventCustomName"),
                custom_payload,
            ),
            EventsByBrowser => count_by(records, |r| text_key(r, "PageBrowser")),
            EventsByOs => count_by(records, |r| text_key(r, "PageOperatingSystem")),
            EventsByPage => count_by(records, |r| key(&r.page_url_path)),
            EventsByPageByCustomer => count_by2(records, |r| key(&r.page_url_path), customer),
            ErrorsByPage => count_by(
                records.iter().filter(|r| number(r, "PageNumErrors").is_some_and(|n| n > 0.0)),
                |r| key(&r.page_url_path),
            ),
            FirstPaintByPage => mean_by(
                records.iter().filter(|r| r.is_event("load")),
                |r| key(&r.page_url_path),
                |r| number(r, "LoadFirstPaintTime"),
            ),
            NavigationGraph => {
                return AggregationOutput::Graph(transition_graph(
                    records.iter().filter(|r| r.is_event("navigate")),
                    |r| key(&r.page_referer_url_path),
                    |r| key(&r.page_url_path),
                ));
            }
        };

        AggregationOutput::Grouped(grouped)
    }
}

impl fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn key(value: &str) -> String {
    if value.is_empty() {
        UNKNOWN_KEY.to_string()
    } else {
        value.to_string()
    }
}

fn text_key(record: &EnrichedEventRecord, name: &str) -> String {
    first_non_empty([record.text(name)])
}

/// Numeric value of a field, also when it arrived as a numeric string.
fn number(record: &EnrichedEventRecord, name: &str) -> Option<f64> {
    match record.field(name)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn first_non_empty(candidates: impl IntoIterator<Item = Option<String>>) -> String {
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| UNKNOWN_KEY.to_string())
}

fn customer(record: &EnrichedEventRecord) -> String {
    first_non_empty([record.text("Customer")])
}

fn user(record: &EnrichedEventRecord) -> String {
    first_non_empty([
        record.text("UserEmail"),
        record.text("UserAppKey"),
        record.text("UserId"),
    ])
}

fn custom_payload(record: &EnrichedEventRecord) -> String {
    first_non_empty([record.text("evt_query_str"), record.text("evt_view_str")])
}

/// Run one aggregation.
pub fn aggregate(kind: AggregationKind, records: &[EnrichedEventRecord]) -> AggregationOutput {
    kind.compute(records)
}

/// Run every aggregation of the catalogue over the same records.
pub fn all_aggregations(records: &[EnrichedEventRecord]) -> AggregationCatalogue {
    AggregationCatalogue {
        entries: AggregationKind::ALL
            .into_iter()
            .map(|kind| (kind, kind.compute(records)))
            .collect(),
    }
}

/// Results of the whole catalogue, in catalogue order.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationCatalogue {
    entries: Vec<(AggregationKind, AggregationOutput)>,
}

impl AggregationCatalogue {
    pub fn get(&self, kind: AggregationKind) -> Option<&AggregationOutput> {
        self.entries
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, output)| output)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AggregationKind, &AggregationOutput)> {
        self.entries.iter().map(|(kind, output)| (*kind, output))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Object keyed by aggregation name, in catalogue order.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.iter()
                .map(|(kind, output)| (kind.name().to_string(), output.to_value()))
                .collect::<Map<String, Value>>(),
        )
    }
}

impl Serialize for AggregationCatalogue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (kind, output) in &self.entries {
            map.serialize_entry(kind.name(), output)?;
        }
        map.end()
    }
}
