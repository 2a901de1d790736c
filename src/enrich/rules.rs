//! Typed transform and blacklist rules.
//!
//! Rules are plain serializable data in the configuration. They are
//! compiled into [`RecordTransform`] and [`RecordPredicate`] capabilities
//! when an [`Enricher`](crate::enrich::Enricher) is built, so a bad regex or
//! template is reported before any record is fetched. Code can register its
//! own capabilities, closures included, next to the configured ones.

use crate::config::ConfigError;
use crate::enrich::record::{values_equal, EnrichedEventRecord};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Computes a derived field from a record.
pub trait RecordTransform: Send + Sync {
    fn apply(&self, record: &EnrichedEventRecord) -> Value;
}

impl<F> RecordTransform for F
where
    F: Fn(&EnrichedEventRecord) -> Value + Send + Sync,
{
    fn apply(&self, record: &EnrichedEventRecord) -> Value {
        self(record)
    }
}

/// Decides whether a record matches.
pub trait RecordPredicate: Send + Sync {
    fn matches(&self, record: &EnrichedEventRecord) -> bool;
}

impl<F> RecordPredicate for F
where
    F: Fn(&EnrichedEventRecord) -> bool + Send + Sync,
{
    fn matches(&self, record: &EnrichedEventRecord) -> bool {
        self(record)
    }
}

// ============================================================================
// Transforms
// ============================================================================

/// A configured transform writing `field`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRule {
    pub field: String,
    #[serde(flatten)]
    pub op: TransformOp,
}

/// Operations a configured transform can perform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TransformOp {
    /// Value of another field, or null
    Copy { from: String },
    /// A fixed value
    Constant { value: Value },
    /// Map the text of `from` through `table`
    Lookup {
        from: String,
        table: BTreeMap<String, Value>,
        #[serde(default)]
        default: Option<Value>,
    },
    /// Capture group of a regex applied to the text of `from`
    Extract {
        from: String,
        pattern: String,
        #[serde(default = "default_group")]
        group: usize,
    },
    /// Text with `{Field}` placeholders filled in
    Template { template: String },
}

fn default_group() -> usize {
    1
}

impl TransformRule {
    pub fn new(field: impl Into<String>, op: TransformOp) -> Self {
        Self {
            field: field.into(),
            op,
        }
    }

    /// Compile into an executable transform.
    pub fn compile(&self) -> Result<Box<dyn RecordTransform>, ConfigError> {
        let transform = match &self.op {
            TransformOp::Copy { from } => Transform::Copy { from: from.clone() },
            TransformOp::Constant { value } => Transform::Constant(value.clone()),
            TransformOp::Lookup {
                from,
                table,
                default,
            } => Transform::Lookup {
                from: from.clone(),
                table: table.clone(),
                default: default.clone().unwrap_or(Value::Null),
            },
            TransformOp::Extract {
                from,
                pattern,
                group,
            } => Transform::Extract {
                from: from.clone(),
                regex: compile_pattern(pattern)?,
                group: *group,
            },
            TransformOp::Template { template } => Transform::Template(parse_template(template)?),
        };
        Ok(Box::new(transform))
    }
}

#[derive(Debug)]
enum Transform {
    Copy {
        from: String,
    },
    Constant(Value),
    Lookup {
        from: String,
        table: BTreeMap<String, Value>,
        default: Value,
    },
    Extract {
        from: String,
        regex: Regex,
        group: usize,
    },
    Template(Vec<TemplatePart>),
}

#[derive(Debug, PartialEq)]
enum TemplatePart {
    Text(String),
    Field(String),
}

fn parse_template(template: &str) -> Result<Vec<TemplatePart>, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidPattern {
        pattern: template.to_string(),
        reason: reason.to_string(),
    };

    let mut parts = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        if open > 0 {
            parts.push(TemplatePart::Text(rest[..open].to_string()));
        }
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| invalid("unclosed '{'"))?;
        let name = after[..close].trim();
        if name.is_empty() {
            return Err(invalid("empty placeholder"));
        }
        parts.push(TemplatePart::Field(name.to_string()));
        rest = &after[close + 1..];
    }
    if !rest.is_empty() {
        parts.push(TemplatePart::Text(rest.to_string()));
    }
    Ok(parts)
}

impl RecordTransform for Transform {
    fn apply(&self, record: &EnrichedEventRecord) -> Value {
        match self {
            Transform::Copy { from } => record.field(from).unwrap_or(Value::Null),
            Transform::Constant(value) => value.clone(),
            Transform::Lookup {
                from,
                table,
                default,
            } => record
                .text(from)
                .and_then(|key| table.get(&key).cloned())
                .unwrap_or_else(|| default.clone()),
            Transform::Extract { from, regex, group } => record
                .text(from)
                .and_then(|text| {
                    regex
                        .captures(&text)
                        .and_then(|caps| caps.get(*group))
                        .map(|m| Value::String(m.as_str().to_string()))
                })
                .unwrap_or(Value::Null),
            Transform::Template(parts) => {
                let text: String = parts
                    .iter()
                    .map(|part| match part {
                        TemplatePart::Text(text) => text.clone(),
                        TemplatePart::Field(name) => record.text(name).unwrap_or_default(),
                    })
                    .collect();
                Value::String(text)
            }
        }
    }
}

// ============================================================================
// Predicates
// ============================================================================

/// A configured predicate over a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum PredicateRule {
    Equals { field: String, value: Value },
    Contains { field: String, value: String },
    StartsWith { field: String, value: String },
    EndsWith { field: String, value: String },
    Matches { field: String, pattern: String },
    /// Field absent, null or an empty string
    Missing { field: String },
    GreaterThan { field: String, value: f64 },
    LessThan { field: String, value: f64 },
    Any { rules: Vec<PredicateRule> },
    All { rules: Vec<PredicateRule> },
    Not { rule: Box<PredicateRule> },
}

impl PredicateRule {
    /// Compile into an executable predicate.
    pub fn compile(&self) -> Result<Box<dyn RecordPredicate>, ConfigError> {
        Ok(Box::new(self.compile_inner()?))
    }

    fn compile_inner(&self) -> Result<Predicate, ConfigError> {
        let compile_all = |rules: &[PredicateRule]| {
            rules
                .iter()
                .map(PredicateRule::compile_inner)
                .collect::<Result<Vec<_>, _>>()
        };

        Ok(match self {
            PredicateRule::Equals { field, value } => Predicate::Equals {
                field: field.clone(),
                value: value.clone(),
            },
            PredicateRule::Contains { field, value } => Predicate::Text {
                field: field.clone(),
                value: value.clone(),
                test: TextTest::Contains,
            },
            PredicateRule::StartsWith { field, value } => Predicate::Text {
                field: field.clone(),
                value: value.clone(),
                test: TextTest::StartsWith,
            },
            PredicateRule::EndsWith { field, value } => Predicate::Text {
                field: field.clone(),
                value: value.clone(),
                test: TextTest::EndsWith,
            },
            PredicateRule::Matches { field, pattern } => Predicate::Matches {
                field: field.clone(),
                regex: compile_pattern(pattern)?,
            },
            PredicateRule::Missing { field } => Predicate::Missing {
                field: field.clone(),
            },
            PredicateRule::GreaterThan { field, value } => Predicate::Compare {
                field: field.clone(),
                value: *value,
                greater: true,
            },
            PredicateRule::LessThan { field, value } => Predicate::Compare {
                field: field.clone(),
                value: *value,
                greater: false,
            },
            PredicateRule::Any { rules } => Predicate::Any(compile_all(rules)?),
            PredicateRule::All { rules } => Predicate::All(compile_all(rules)?),
            PredicateRule::Not { rule } => Predicate::Not(Box::new(rule.compile_inner()?)),
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum TextTest {
    Contains,
    StartsWith,
    EndsWith,
}

#[derive(Debug)]
enum Predicate {
    Equals {
        field: String,
        value: Value,
    },
    Text {
        field: String,
        value: String,
        test: TextTest,
    },
    Matches {
        field: String,
        regex: Regex,
    },
    Missing {
        field: String,
    },
    Compare {
        field: String,
        value: f64,
        greater: bool,
    },
    Any(Vec<Predicate>),
    All(Vec<Predicate>),
    Not(Box<Predicate>),
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl RecordPredicate for Predicate {
    fn matches(&self, record: &EnrichedEventRecord) -> bool {
        match self {
            Predicate::Equals { field, value } => record
                .field(field)
                .is_some_and(|actual| values_equal(&actual, value)),
            Predicate::Text { field, value, test } => {
                record.text(field).is_some_and(|text| match test {
                    TextTest::Contains => text.contains(value.as_str()),
                    TextTest::StartsWith => text.starts_with(value.as_str()),
                    TextTest::EndsWith => text.ends_with(value.as_str()),
                })
            }
            Predicate::Matches { field, regex } => {
                record.text(field).is_some_and(|text| regex.is_match(&text))
            }
            Predicate::Missing { field } => record.text(field).map_or(true, |t| t.is_empty()),
            Predicate::Compare {
                field,
                value,
                greater,
            } => record
                .field(field)
                .as_ref()
                .and_then(number)
                .is_some_and(|n| if *greater { n > *value } else { n < *value }),
            Predicate::Any(rules) => rules.iter().any(|rule| rule.matches(record)),
            Predicate::All(rules) => rules.iter().all(|rule| rule.matches(record)),
            Predicate::Not(rule) => !rule.matches(record),
        }
    }
}

fn compile_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|e| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

// ============================================================================
// Blacklists
// ============================================================================

/// One entry of a field's blacklist: a literal value or a predicate.
///
/// A JSON object is always read as a [`PredicateRule`]; a malformed rule is
/// a parse error, never a literal.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BlacklistEntry {
    Rule(PredicateRule),
    Literal(Value),
}

impl<'de> Deserialize<'de> for BlacklistEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        if value.is_object() {
            PredicateRule::deserialize(value)
                .map(BlacklistEntry::Rule)
                .map_err(|e| serde::de::Error::custom(format!("invalid blacklist rule: {e}")))
        } else {
            Ok(BlacklistEntry::Literal(value))
        }
    }
}

enum BlacklistMatcher {
    Literal(Value),
    Predicate(Box<dyn RecordPredicate>),
}

/// Compiled blacklist of one field.
pub struct Blacklist {
    field: String,
    matchers: Vec<BlacklistMatcher>,
}

impl Blacklist {
    pub fn compile(field: &str, entries: &[BlacklistEntry]) -> Result<Self, ConfigError> {
        let matchers = entries
            .iter()
            .map(|entry| match entry {
                BlacklistEntry::Literal(value) => Ok(BlacklistMatcher::Literal(value.clone())),
                BlacklistEntry::Rule(rule) => rule.compile().map(BlacklistMatcher::Predicate),
            })
            .collect::<Result<_, ConfigError>>()?;

        Ok(Self {
            field: field.to_string(),
            matchers,
        })
    }

    /// Empty blacklist for `field`, to attach code-defined predicates to.
    pub fn empty(field: &str) -> Self {
        Self {
            field: field.to_string(),
            matchers: Vec::new(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn push_predicate(&mut self, predicate: Box<dyn RecordPredicate>) {
        self.matchers.push(BlacklistMatcher::Predicate(predicate));
    }

    /// Whether any literal equals the field's value or any predicate matches.
    pub fn rejects(&self, record: &EnrichedEventRecord) -> bool {
        let value = record.field(&self.field);
        self.matchers.iter().any(|matcher| match matcher {
            BlacklistMatcher::Literal(literal) => value
                .as_ref()
                .is_some_and(|value| values_equal(value, literal)),
            BlacklistMatcher::Predicate(predicate) => predicate.matches(record),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> EnrichedEventRecord {
        let mut record = EnrichedEventRecord {
            user_email_domain: "panda.example.com".to_string(),
            page_url_path: "/insights".to_string(),
            ..EnrichedEventRecord::default()
        };
        record.base.user_email = Some("bob@panda.example.com".to_string());
        record.base.page_num_errors = Some(3);
        record
    }

    fn predicate(json: Value) -> Box<dyn RecordPredicate> {
        serde_json::from_value::<PredicateRule>(json)
            .unwrap()
            .compile()
            .unwrap()
    }

    fn transform(json: Value) -> Box<dyn RecordTransform> {
        serde_json::from_value::<TransformRule>(json)
            .unwrap()
            .compile()
            .unwrap()
    }

    #[test]
    fn test_extract_transform() {
        let t = transform(json!({"field": "Customer", "op": "extract", "from": "UserEmailDomain", "pattern": "^([^.]+)"}));
        assert_eq!(t.apply(&record()), json!("panda"));

        let t = transform(json!({"field": "X", "op": "extract", "from": "Nope", "pattern": "(a)"}));
        assert_eq!(t.apply(&record()), Value::Null);
    }

    #[test]
    fn test_lookup_transform() {
        let t = transform(json!({
            "field": "Customer",
            "op": "lookup",
            "from": "UserEmailDomain",
            "table": {"panda.example.com": "Panda"},
            "default": "Other"
        }));
        assert_eq!(t.apply(&record()), json!("Panda"));

        let mut other = record();
        other.user_email_domain = "goose.com".to_string();
        assert_eq!(t.apply(&other), json!("Other"));
    }

    #[test]
    fn test_template_copy_and_constant() {
        let t = transform(json!({"field": "Key", "op": "template", "template": "{UserEmailDomain}:{PageUrlPath}"}));
        assert_eq!(t.apply(&record()), json!("panda.example.com:/insights"));

        let t = transform(json!({"field": "Errors", "op": "copy", "from": "PageNumErrors"}));
        assert_eq!(t.apply(&record()), json!(3));

        let t = transform(json!({"field": "Source", "op": "constant", "value": {"kind": "export"}}));
        assert_eq!(t.apply(&record()), json!({"kind": "export"}));
    }

    #[test]
    fn test_invalid_rules_fail_to_compile() {
        let rule = TransformRule::new(
            "X",
            TransformOp::Extract {
                from: "A".to_string(),
                pattern: "(".to_string(),
                group: 1,
            },
        );
        assert!(matches!(rule.compile(), Err(ConfigError::InvalidPattern { .. })));

        let rule = TransformRule::new(
            "X",
            TransformOp::Template {
                template: "{Open".to_string(),
            },
        );
        assert!(matches!(rule.compile(), Err(ConfigError::InvalidPattern { .. })));

        let rule = PredicateRule::Not {
            rule: Box::new(PredicateRule::Matches {
                field: "A".to_string(),
                pattern: "[".to_string(),
            }),
        };
        assert!(rule.compile().is_err());
    }

    #[test]
    fn test_text_predicates() {
        let r = record();
        assert!(predicate(json!({"op": "ends_with", "field": "UserEmail", "value": "example.com"})).matches(&r));
        assert!(predicate(json!({"op": "starts_with", "field": "PageUrlPath", "value": "/ins"})).matches(&r));
        assert!(!predicate(json!({"op": "contains", "field": "PageUrlPath", "value": "admin"})).matches(&r));
        assert!(predicate(json!({"op": "matches", "field": "UserEmail", "pattern": "^bob@"})).matches(&r));
    }

    #[test]
    fn test_numeric_and_missing_predicates() {
        let r = record();
        assert!(predicate(json!({"op": "greater_than", "field": "PageNumErrors", "value": 2})).matches(&r));
        assert!(!predicate(json!({"op": "less_than", "field": "PageNumErrors", "value": 2})).matches(&r));
        assert!(predicate(json!({"op": "missing", "field": "UserAppKey"})).matches(&r));
        assert!(predicate(json!({"op": "missing", "field": "EventDay"})).matches(&r));
        assert!(!predicate(json!({"op": "missing", "field": "UserEmail"})).matches(&r));
        assert!(predicate(json!({"op": "equals", "field": "PageNumErrors", "value": 3.0})).matches(&r));
    }

    #[test]
    fn test_combinators() {
        let r = record();
        let rule = json!({"op": "all", "rules": [
            {"op": "equals", "field": "PageUrlPath", "value": "/insights"},
            {"op": "not", "rule": {"op": "missing", "field": "UserEmail"}}
        ]});
        assert!(predicate(rule).matches(&r));

        let rule = json!({"op": "any", "rules": []});
        assert!(!predicate(rule).matches(&r));
    }

    #[test]
    fn test_blacklist_entries_parse_as_rule_or_literal() {
        let entries: Vec<BlacklistEntry> = serde_json::from_value(json!([
            "bot@example.com",
            42,
            {"op": "missing", "field": "UserId"}
        ]))
        .unwrap();
        assert!(matches!(entries[0], BlacklistEntry::Literal(_)));
        assert!(matches!(entries[1], BlacklistEntry::Literal(_)));
        assert!(matches!(entries[2], BlacklistEntry::Rule(PredicateRule::Missing { .. })));
    }

    #[test]
    fn test_malformed_blacklist_rule_is_parse_error() {
        for entry in [
            json!({"name": "not a rule"}),
            json!({"op": "ends_with", "field": "UserEmail", "vale": "@test.com"}),
            json!({"op": "ends_with", "field": "UserEmail", "value": "@test.com", "extra": 1}),
            json!({"op": "explode", "field": "UserEmail"}),
        ] {
            let result = serde_json::from_value::<BlacklistEntry>(entry.clone());
            assert!(result.is_err(), "{entry}");
        }
    }

    #[test]
    fn test_blacklist_rejects_on_literal_or_predicate() {
        let r = record();
        let by_literal = Blacklist::compile("UserEmail", &[BlacklistEntry::Literal(json!("bob@panda.example.com"))]).unwrap();
        assert!(by_literal.rejects(&r));

        let other = Blacklist::compile("UserEmail", &[BlacklistEntry::Literal(json!("alice@x.com"))]).unwrap();
        assert!(!other.rejects(&r));

        // predicates see the whole record, not just the keyed field
        let mut by_rule = Blacklist::empty("UserEmail");
        by_rule.push_predicate(Box::new(|r: &EnrichedEventRecord| r.page_url_path == "/insights"));
        assert!(by_rule.rejects(&r));
    }

    #[test]
    fn test_closure_transform() {
        let t: Box<dyn RecordTransform> =
            Box::new(|r: &EnrichedEventRecord| json!(r.page_url_path.len()));
        assert_eq!(t.apply(&record()), json!(9));
    }
}
