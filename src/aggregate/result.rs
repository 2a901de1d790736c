//! Aggregation result types and their JSON wire form.

use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Terminal value of a bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    Count(u64),
    Mean(f64),
}

/// A bucket value, or a nested grouping for the next dimension.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationResult {
    Leaf(Metric),
    Node(BTreeMap<String, AggregationResult>),
}

impl AggregationResult {
    pub fn empty() -> Self {
        AggregationResult::Node(BTreeMap::new())
    }

    /// Child bucket of a node.
    pub fn get(&self, key: &str) -> Option<&AggregationResult> {
        match self {
            AggregationResult::Node(children) => children.get(key),
            AggregationResult::Leaf(_) => None,
        }
    }

    /// Follow `keys` down the nesting.
    pub fn path(&self, keys: &[&str]) -> Option<&AggregationResult> {
        keys.iter().try_fold(self, |node, key| node.get(key))
    }

    pub fn metric(&self) -> Option<Metric> {
        match self {
            AggregationResult::Leaf(metric) => Some(*metric),
            AggregationResult::Node(_) => None,
        }
    }

    pub fn count(&self) -> Option<u64> {
        match self.metric()? {
            Metric::Count(count) => Some(count),
            Metric::Mean(_) => None,
        }
    }

    pub fn mean(&self) -> Option<f64> {
        match self.metric()? {
            Metric::Mean(mean) => Some(mean),
            Metric::Count(_) => None,
        }
    }

    /// Number of buckets at this level.
    pub fn len(&self) -> usize {
        match self {
            AggregationResult::Node(children) => children.len(),
            AggregationResult::Leaf(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, AggregationResult::Node(children) if children.is_empty())
    }

    /// Nested-object JSON form: nodes become objects, leaves numbers.
    pub fn to_value(&self) -> Value {
        match self {
            AggregationResult::Leaf(Metric::Count(count)) => Value::from(*count),
            AggregationResult::Leaf(Metric::Mean(mean)) => Value::from(*mean),
            AggregationResult::Node(children) => Value::Object(
                children
                    .iter()
                    .map(|(key, child)| (key.clone(), child.to_value()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

impl Serialize for AggregationResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            AggregationResult::Leaf(Metric::Count(count)) => serializer.serialize_u64(*count),
            AggregationResult::Leaf(Metric::Mean(mean)) => serializer.serialize_f64(*mean),
            AggregationResult::Node(children) => children.serialize(serializer),
        }
    }
}

/// One directed edge of the transition graph.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Link {
    pub source: String,
    pub target: String,
    pub value: u64,
}

/// Page-to-page navigation graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct TransitionGraph {
    pub links: Vec<Link>,
}

impl TransitionGraph {
    pub fn to_value(&self) -> Value {
        let links = self
            .links
            .iter()
            .map(|link| {
                serde_json::json!({
                    "source": link.source,
                    "target": link.target,
                    "value": link.value,
                })
            })
            .collect();
        serde_json::json!({ "links": Value::Array(links) })
    }
}

/// Output of one named aggregation.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum AggregationOutput {
    Grouped(AggregationResult),
    Graph(TransitionGraph),
}

impl AggregationOutput {
    pub fn grouped(&self) -> Option<&AggregationResult> {
        match self {
            AggregationOutput::Grouped(result) => Some(result),
            AggregationOutput::Graph(_) => None,
        }
    }

    pub fn graph(&self) -> Option<&TransitionGraph> {
        match self {
            AggregationOutput::Graph(graph) => Some(graph),
            AggregationOutput::Grouped(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            AggregationOutput::Grouped(result) => result.to_value(),
            AggregationOutput::Graph(graph) => graph.to_value(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nested() -> AggregationResult {
        let inner = BTreeMap::from([
            ("Panda".to_string(), AggregationResult::Leaf(Metric::Count(5))),
            ("Goose".to_string(), AggregationResult::Leaf(Metric::Count(23))),
        ]);
        AggregationResult::Node(BTreeMap::from([(
            "2019-07-15".to_string(),
            AggregationResult::Node(inner),
        )]))
    }

    #[test]
    fn test_nested_to_value() {
        assert_eq!(
            nested().to_value(),
            json!({"2019-07-15": {"Goose": 23, "Panda": 5}})
        );
    }

    #[test]
    fn test_serialize_matches_to_value() {
        let result = nested();
        assert_eq!(serde_json::to_value(&result).unwrap(), result.to_value());
    }

    #[test]
    fn test_path_lookup() {
        let result = nested();
        assert_eq!(result.path(&["2019-07-15", "Panda"]).and_then(|r| r.count()), Some(5));
        assert!(result.path(&["2019-07-16"]).is_none());
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_graph_wire_form() {
        let graph = TransitionGraph {
            links: vec![Link {
                source: "/".to_string(),
                target: "/dashboard".to_string(),
                value: 45,
            }],
        };
        let expected = json!({"links": [{"source": "/", "target": "/dashboard", "value": 45}]});
        assert_eq!(graph.to_value(), expected);
        assert_eq!(
            serde_json::to_value(AggregationOutput::Graph(graph)).unwrap(),
            expected
        );
    }
}
