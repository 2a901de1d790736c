//! Decomposition of identity, URL and timestamp fields.
//!
//! None of these functions fail: malformed input yields empty parts.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use url::{Origin, Url};

/// Username and domain of an email address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailParts {
    pub name: String,
    pub domain: String,
}

/// Split an email address at its `@`.
///
/// Requires exactly one `@`, a non-empty username, and a dotted domain
/// without empty labels or whitespace.
pub fn split_email(email: Option<&str>) -> EmailParts {
    let Some(email) = email.map(str::trim) else {
        return EmailParts::default();
    };
    let Some((name, domain)) = email.split_once('@') else {
        return EmailParts::default();
    };

    let valid = !name.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
        && !email.chars().any(char::is_whitespace);

    if !valid {
        return EmailParts::default();
    }

    EmailParts {
        name: name.to_string(),
        domain: domain.to_string(),
    }
}

/// Origin and pathname of a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParts {
    pub origin: String,
    pub pathname: String,
}

/// Split a URL into origin (`scheme://host[:port]`) and pathname.
///
/// A bare path such as `/a/b?q=1` yields an empty origin and `/a/b`.
pub fn split_url(url: Option<&str>) -> UrlParts {
    let Some(raw) = url.map(str::trim).filter(|u| !u.is_empty()) else {
        return UrlParts::default();
    };

    match Url::parse(raw) {
        Ok(parsed) => {
            let origin = match parsed.origin() {
                origin @ Origin::Tuple(..) => origin.ascii_serialization(),
                Origin::Opaque(_) => String::new(),
            };
            UrlParts {
                origin,
                pathname: parsed.path().to_string(),
            }
        }
        Err(_) if raw.starts_with('/') => {
            let end = raw.find(['?', '#']).unwrap_or(raw.len());
            UrlParts {
                origin: String::new(),
                pathname: raw[..end].to_string(),
            }
        }
        Err(_) => UrlParts::default(),
    }
}

/// Calendar buckets of an event timestamp, in UTC.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarParts {
    /// `YYYY-MM-DD`
    pub day: String,
    /// Full weekday name
    pub day_of_week: String,
    /// Hour with meridiem, e.g. `7 PM`
    pub hour_of_day: String,
    /// Full month name
    pub month: String,
}

impl CalendarParts {
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self {
            day: at.format("%Y-%m-%d").to_string(),
            day_of_week: at.format("%A").to_string(),
            hour_of_day: at.format("%-I %p").to_string(),
            month: at.format("%B").to_string(),
        }
    }
}

/// Calendar buckets for an `EventStart` value; empty when unparseable.
pub fn calendar_parts(event_start: Option<&str>) -> CalendarParts {
    event_start
        .and_then(parse_event_start)
        .map(CalendarParts::from_datetime)
        .unwrap_or_default()
}

/// Parse an event timestamp as UTC.
///
/// Accepts RFC 3339 with any offset, and naive ISO-8601 date-times or dates
/// which are taken to be UTC already.
pub fn parse_event_start(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
