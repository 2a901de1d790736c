//! Raw and enriched event record types.
//!
//! A [`RawEventRecord`] is one row of an export as received. Enrichment
//! turns it into an [`EnrichedEventRecord`], which keeps the raw row as its
//! base and adds the derived fields. Both serialize to a single flat JSON
//! object using the provider's PascalCase field names.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Known field names of a raw export row.
pub const RAW_FIELDS: &[&str] = &[
    "IndvId",
    "UserId",
    "SessionId",
    "PageId",
    "EventStart",
    "EventType",
    "EventCustomName",
    "EventTargetSelectorTok",
    "PageDuration",
    "PageActiveDuration",
    "PageUrl",
    "PageRefererUrl",
    "PageBrowser",
    "PageDevice",
    "PageOperatingSystem",
    "PageNumInfos",
    "PageNumWarnings",
    "PageNumErrors",
    "LoadFirstPaintTime",
    "UserAppKey",
    "UserDisplayName",
    "UserEmail",
];

/// Field names added by enrichment.
pub const DERIVED_FIELDS: &[&str] = &[
    "UserEmailName",
    "UserEmailDomain",
    "PageUrlOrigin",
    "PageUrlPathname",
    "PageUrlPath",
    "PageRefererUrlOrigin",
    "PageRefererUrlPathname",
    "PageRefererUrlPath",
    "EventDay",
    "EventDayOfWeek",
    "EventHourOfDay",
    "EventMonth",
];

/// Whether `name` is a field the record types define themselves.
pub fn is_builtin_field(name: &str) -> bool {
    RAW_FIELDS.contains(&name) || DERIVED_FIELDS.contains(&name)
}

/// One event row as returned by the export API.
///
/// Fields not modelled here (event payloads, geo data, agent strings) are
/// kept verbatim in `extra`. So is a known field whose value does not have
/// the expected type; decoding never drops a row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", from = "Map<String, Value>")]
pub struct RawEventRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indv_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_id: Option<i64>,
    /// ISO-8601 event timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_start: Option<String>,
    /// Discriminator such as `navigate`, `load`, `click` or `custom`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_custom_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_target_selector_tok: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_active_duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_referer_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_browser: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_operating_system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_num_infos: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_num_warnings: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_num_errors: Option<u64>,
    /// Milliseconds until first paint, present on `load` events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_first_paint_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_app_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    /// Every other field of the row
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RawEventRecord {
    /// Look up a field by its wire name.
    ///
    /// A known field that arrived with an unexpected type is found in
    /// `extra` under the same name.
    pub fn field(&self, name: &str) -> Option<Value> {
        fn text(value: &Option<String>) -> Option<Value> {
            value.clone().map(Value::String)
        }

        let known = match name {
            "IndvId" => self.indv_id.map(Value::from),
            "UserId" => self.user_id.map(Value::from),
            "SessionId" => self.session_id.map(Value::from),
            "PageId" => self.page_id.map(Value::from),
            "EventStart" => text(&self.event_start),
            "EventType" => text(&self.event_type),
            "EventCustomName" => text(&self.event_custom_name),
            "EventTargetSelectorTok" => text(&self.event_target_selector_tok),
            "PageDuration" => self.page_duration.map(Value::from),
            "PageActiveDuration" => self.page_active_duration.map(Value::from),
            "PageUrl" => text(&self.page_url),
            "PageRefererUrl" => text(&self.page_referer_url),
            "PageBrowser" => text(&self.page_browser),
            "PageDevice" => text(&self.page_device),
            "PageOperatingSystem" => text(&self.page_operating_system),
            "PageNumInfos" => self.page_num_infos.map(Value::from),
            "PageNumWarnings" => self.page_num_warnings.map(Value::from),
            "PageNumErrors" => self.page_num_errors.map(Value::from),
            "LoadFirstPaintTime" => self.load_first_paint_time.map(Value::from),
            "UserAppKey" => text(&self.user_app_key),
            "UserDisplayName" => text(&self.user_display_name),
            "UserEmail" => text(&self.user_email),
            _ => None,
        };
        known.or_else(|| self.extra.get(name).cloned())
    }

    /// Whether the event discriminator equals `event_type`.
    pub fn is_event(&self, event_type: &str) -> bool {
        self.event_type.as_deref() == Some(event_type)
    }
}

impl From<Map<String, Value>> for RawEventRecord {
    fn from(mut row: Map<String, Value>) -> Self {
        Self {
            indv_id: take(&mut row, "IndvId"),
            user_id: take(&mut row, "UserId"),
            session_id: take(&mut row, "SessionId"),
            page_id: take(&mut row, "PageId"),
            event_start: take(&mut row, "EventStart"),
            event_type: take(&mut row, "EventType"),
            event_custom_name: take(&mut row, "EventCustomName"),
            event_target_selector_tok: take(&mut row, "EventTargetSelectorTok"),
            page_duration: take(&mut row, "PageDuration"),
            page_active_duration: take(&mut row, "PageActiveDuration"),
            page_url: take(&mut row, "PageUrl"),
            page_referer_url: take(&mut row, "PageRefererUrl"),
            page_browser: take(&mut row, "PageBrowser"),
            page_device: take(&mut row, "PageDevice"),
            page_operating_system: take(&mut row, "PageOperatingSystem"),
            page_num_infos: take(&mut row, "PageNumInfos"),
            page_num_warnings: take(&mut row, "PageNumWarnings"),
            page_num_errors: take(&mut row, "PageNumErrors"),
            load_first_paint_time: take(&mut row, "LoadFirstPaintTime"),
            user_app_key: take(&mut row, "UserAppKey"),
            user_display_name: take(&mut row, "UserDisplayName"),
            user_email: take(&mut row, "UserEmail"),
            extra: row,
        }
    }
}

/// Move `name` out of `row` when it has the type of `T`. Values of another
/// type stay in `row`; nulls are removed.
fn take<T: DeserializeOwned>(row: &mut Map<String, Value>, name: &str) -> Option<T> {
    let value = row.remove(name)?;
    if value.is_null() {
        return None;
    }
    match T::deserialize(&value) {
        Ok(typed) => Some(typed),
        Err(_) => {
            row.insert(name.to_string(), value);
            None
        }
    }
}

/// A raw record plus the fields derived from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnrichedEventRecord {
    /// Source row, without the selector token
    #[serde(flatten)]
    pub base: RawEventRecord,
    pub user_email_name: String,
    pub user_email_domain: String,
    pub page_url_origin: String,
    pub page_url_pathname: String,
    /// Route label of the page, or its raw pathname
    pub page_url_path: String,
    pub page_referer_url_origin: String,
    pub page_referer_url_pathname: String,
    pub page_referer_url_path: String,
    /// `YYYY-MM-DD` in UTC
    pub event_day: String,
    pub event_day_of_week: String,
    /// Hour with meridiem, e.g. `7 PM`
    pub event_hour_of_day: String,
    pub event_month: String,
    /// Fields written by configured transforms
    #[serde(flatten)]
    pub custom: BTreeMap<String, Value>,
}

impl EnrichedEventRecord {
    /// Look up a field by its wire name: derived fields first, then
    /// transform output, then the base row.
    pub fn field(&self, name: &str) -> Option<Value> {
        let derived = match name {
            "UserEmailName" => &self.user_email_name,
            "UserEmailDomain" => &self.user_email_domain,
            "PageUrlOrigin" => &self.page_url_origin,
            "PageUrlPathname" => &self.page_url_pathname,
            "PageUrlPath" => &self.page_url_path,
            "PageRefererUrlOrigin" => &self.page_referer_url_origin,
            "PageRefererUrlPathname" => &self.page_referer_url_pathname,
            "PageRefererUrlPath" => &self.page_referer_url_path,
            "EventDay" => &self.event_day,
            "EventDayOfWeek" => &self.event_day_of_week,
            "EventHourOfDay" => &self.event_hour_of_day,
            "EventMonth" => &self.event_month,
            _ => {
                return match self.custom.get(name) {
                    Some(value) => Some(value.clone()),
                    None => self.base.field(name),
                };
            }
        };
        Some(Value::String(derived.clone()))
    }

    /// Field rendered as text; `None` when absent or null.
    pub fn text(&self, name: &str) -> Option<String> {
        self.field(name).as_ref().and_then(value_text)
    }

    pub fn is_event(&self, event_type: &str) -> bool {
        self.base.is_event(event_type)
    }
}

/// Render a JSON value as text. Strings are taken as-is; null yields `None`.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

/// Equality that treats `3` and `3.0` as the same number.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}
