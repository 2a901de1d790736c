//! The per-record enrichment pipeline.

use crate::config::{Config, ConfigError, RouteConfig};
use crate::enrich::decompose::{calendar_parts, split_email, split_url};
use crate::enrich::record::{is_builtin_field, EnrichedEventRecord, RawEventRecord};
use crate::enrich::routes::RouteTable;
use crate::enrich::rules::{
    Blacklist, BlacklistEntry, RecordPredicate, RecordTransform, TransformRule,
};
use std::collections::BTreeMap;

/// Compiled routes, transforms and blacklists for one run.
pub struct Enricher {
    routes: RouteTable,
    transforms: Vec<(String, Box<dyn RecordTransform>)>,
    blacklists: Vec<Blacklist>,
}

impl Enricher {
    /// Compile the enrichment rules of `config`.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Self::from_parts(&config.routes, &config.transforms, &config.blacklists)
    }

    pub fn from_parts(
        routes: &[RouteConfig],
        transforms: &[TransformRule],
        blacklists: &BTreeMap<String, Vec<BlacklistEntry>>,
    ) -> Result<Self, ConfigError> {
        let mut enricher = Self {
            routes: RouteTable::compile(routes)?,
            transforms: Vec::with_capacity(transforms.len()),
            blacklists: blacklists
                .iter()
                .map(|(field, entries)| Blacklist::compile(field, entries))
                .collect::<Result<_, _>>()?,
        };

        for rule in transforms {
            enricher.push_transform(&rule.field, rule.compile()?)?;
        }

        Ok(enricher)
    }

    /// Add a code-defined transform after the configured ones.
    pub fn with_transform(
        mut self,
        field: impl Into<String>,
        transform: impl RecordTransform + 'static,
    ) -> Result<Self, ConfigError> {
        self.push_transform(&field.into(), Box::new(transform))?;
        Ok(self)
    }

    /// Add a code-defined predicate to the blacklist of `field`.
    pub fn with_predicate(
        mut self,
        field: &str,
        predicate: impl RecordPredicate + 'static,
    ) -> Self {
        let index = match self.blacklists.iter().position(|b| b.field() == field) {
            Some(index) => index,
            None => {
                self.blacklists.push(Blacklist::empty(field));
                self.blacklists.len() - 1
            }
        };
        self.blacklists[index].push_predicate(Box::new(predicate));
        self
    }

    fn push_transform(
        &mut self,
        field: &str,
        transform: Box<dyn RecordTransform>,
    ) -> Result<(), ConfigError> {
        if is_builtin_field(field) {
            return Err(ConfigError::ReservedField(field.to_string()));
        }
        self.transforms.push((field.to_string(), transform));
        Ok(())
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Enrich `records`, dropping blacklisted ones. Order is preserved.
    pub fn enrich(&self, records: Vec<RawEventRecord>) -> Vec<EnrichedEventRecord> {
        records
            .into_iter()
            .filter_map(|record| self.enrich_record(record))
            .collect()
    }

    /// Enrich one record; `None` when a blacklist rejects it.
    pub fn enrich_record(&self, raw: RawEventRecord) -> Option<EnrichedEventRecord> {
        let email = split_email(raw.user_email.as_deref());
        let page = split_url(raw.page_url.as_deref());
        let referer = split_url(raw.page_referer_url.as_deref());
        let calendar = calendar_parts(raw.event_start.as_deref());

        let page_url_path = self.routes.classify(&page.pathname).to_string();
        let page_referer_url_path = self.routes.classify(&referer.pathname).to_string();

        let mut base = raw;
        // free text, breaks flat exports
        base.event_target_selector_tok = None;

        let mut record = EnrichedEventRecord {
            base,
            user_email_name: email.name,
            user_email_domain: email.domain,
            page_url_origin: page.origin,
            page_url_pathname: page.pathname,
            page_url_path,
            page_referer_url_origin: referer.origin,
            page_referer_url_pathname: referer.pathname,
            page_referer_url_path,
            event_day: calendar.day,
            event_day_of_week: calendar.day_of_week,
            event_hour_of_day: calendar.hour_of_day,
            event_month: calendar.month,
            custom: BTreeMap::new(),
        };

        for (field, transform) in &self.transforms {
            let value = transform.apply(&record);
            record.base.extra.remove(field);
            record.custom.insert(field.clone(), value);
        }

        if self.blacklists.iter().any(|blacklist| blacklist.rejects(&record)) {
            return None;
        }

        Some(record)
    }
}

/// Compile the rules of `config` and enrich `records` with them.
pub fn enrich(config: &Config, records: Vec<RawEventRecord>) -> Result<Vec<EnrichedEventRecord>, ConfigError> {
    Ok(Enricher::new(config)?.enrich(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn raw(value: Value) -> RawEventRecord {
        serde_json::from_value(value).unwrap()
    }

    fn config(json: Value) -> Config {
        serde_json::from_value(json).unwrap()
    }

    fn sample() -> RawEventRecord {
        raw(json!({
            "UserId": 42,
            "EventStart": "2019-07-15T19:01:23.729Z",
            "EventType": "navigate",
            "EventTargetSelectorTok": "div#app > a.nav",
            "PageUrl": "https://acme.portal.example.ai/users/42?tab=1",
            "PageRefererUrl": "https://acme.portal.example.ai/dashboard",
            "PageNumErrors": 0,
            "UserEmail": "bob@acme.com",
            "evt_view_str": "grid"
        }))
    }

    #[test]
    fn test_derived_fields() {
        let enricher = Enricher::new(&config(json!({
            "routes": [{"route": "/users/:id", "page": "/users/:id"}]
        })))
        .unwrap();

        let record = enricher.enrich_record(sample()).unwrap();
        assert_eq!(record.user_email_name, "bob");
        assert_eq!(record.user_email_domain, "acme.com");
        assert_eq!(record.page_url_origin, "https://acme.portal.example.ai");
        assert_eq!(record.page_url_pathname, "/users/42");
        assert_eq!(record.page_url_path, "/users/:id");
        assert_eq!(record.page_referer_url_pathname, "/dashboard");
        assert_eq!(record.page_referer_url_path, "/dashboard");
        assert_eq!(record.event_day, "2019-07-15");
        assert_eq!(record.event_day_of_week, "Monday");
        assert_eq!(record.event_hour_of_day, "7 PM");
        assert_eq!(record.event_month, "July");
        assert_eq!(record.base.event_target_selector_tok, None);
    }

    #[test]
    fn test_base_fields_are_untouched() {
        let enricher = Enricher::new(&Config::default()).unwrap();
        let source = sample();
        let record = enricher.enrich_record(source.clone()).unwrap();

        let mut expected = source;
        expected.event_target_selector_tok = None;
        assert_eq!(record.base, expected);
    }

    #[test]
    fn test_bad_input_degrades_to_empty_fields() {
        let enricher = Enricher::new(&Config::default()).unwrap();
        let record = enricher
            .enrich_record(raw(json!({
                "EventStart": "not a time",
                "PageUrl": "::::",
                "UserEmail": "nobody"
            })))
            .unwrap();

        assert_eq!(record.user_email_name, "");
        assert_eq!(record.page_url_origin, "");
        assert_eq!(record.page_url_path, "");
        assert_eq!(record.event_day, "");
        assert_eq!(record.event_hour_of_day, "");
    }

    #[test]
    fn test_transforms_run_in_order_and_see_derived_fields() {
        let enricher = Enricher::new(&config(json!({
            "transforms": [
                {"field": "Customer", "op": "extract", "from": "UserEmailDomain", "pattern": "^([^.]+)"},
                {"field": "CustomerPage", "op": "template", "template": "{Customer}{PageUrlPath}"},
                {"field": "evt_view_str", "op": "constant", "value": "list"}
            ]
        })))
        .unwrap();

        let record = enricher.enrich_record(sample()).unwrap();
        assert_eq!(record.custom["Customer"], json!("acme"));
        assert_eq!(record.custom["CustomerPage"], json!("acme/users/42"));
        assert_eq!(record.field("evt_view_str"), Some(json!("list")));
        assert!(!record.base.extra.contains_key("evt_view_str"));
    }

    #[test]
    fn test_blacklist_sees_transformed_fields() {
        let enricher = Enricher::new(&config(json!({
            "transforms": [{"field": "Customer", "op": "extract", "from": "UserEmailDomain", "pattern": "^([^.]+)"}],
            "blacklists": {"Customer": ["acme"]}
        })))
        .unwrap();

        assert!(enricher.enrich_record(sample()).is_none());
    }

    #[test]
    fn test_any_matching_field_drops_record() {
        let enricher = Enricher::new(&config(json!({
            "blacklists": {
                "UserEmail": ["someone@else.com"],
                "PageUrlPath": [{"op": "equals", "field": "EventType", "value": "navigate"}]
            }
        })))
        .unwrap();

        let mut kept = sample();
        kept.event_type = Some("click".to_string());
        let records = enricher.enrich(vec![sample(), kept.clone(), sample()]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].base.event_type.as_deref(), Some("click"));
    }

    #[test]
    fn test_output_order_matches_input() {
        let enricher = Enricher::new(&Config::default())
            .unwrap()
            .with_predicate("UserId", |r: &EnrichedEventRecord| r.base.user_id == Some(2));

        let input: Vec<RawEventRecord> = (1..=4)
            .map(|id| RawEventRecord {
                user_id: Some(id),
                ..RawEventRecord::default()
            })
            .collect();
        let ids: Vec<i64> = enricher
            .enrich(input)
            .iter()
            .filter_map(|r| r.base.user_id)
            .collect();
        assert_eq!(ids, vec![1, 3, 4]);
    }

    #[test]
    fn test_transform_may_not_shadow_builtin_fields() {
        let result = Enricher::new(&config(json!({
            "transforms": [{"field": "PageUrlPath", "op": "constant", "value": "x"}]
        })));
        assert!(matches!(result, Err(ConfigError::ReservedField(field)) if field == "PageUrlPath"));

        let result = Enricher::new(&Config::default())
            .unwrap()
            .with_transform("EventDay", |_: &EnrichedEventRecord| Value::Null);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_route_is_config_error() {
        let result = enrich(
            &config(json!({"routes": [{"route": "/users/:", "page": "x"}]})),
            vec![sample()],
        );
        assert!(matches!(result, Err(ConfigError::InvalidRoute { .. })));
    }
}
