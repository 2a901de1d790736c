//! Grouping reductions over a record slice.
//!
//! Bucket identity is key equality; buckets come out ordered by key.

use crate::aggregate::result::{AggregationResult, Link, Metric, TransitionGraph};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Count records per key.
pub fn count_by<'a, R, I, K>(records: I, key: K) -> AggregationResult
where
    R: 'a,
    I: IntoIterator<Item = &'a R>,
    K: Fn(&R) -> String,
{
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for record in records {
        *counts.entry(key(record)).or_default() += 1;
    }
    leaves(counts)
}

/// Count records per `(outer, inner)` key, nested outer first.
pub fn count_by2<'a, R, I, O, N>(records: I, outer: O, inner: N) -> AggregationResult
where
    R: 'a,
    I: IntoIterator<Item = &'a R>,
    O: Fn(&R) -> String,
    N: Fn(&R) -> String,
{
    AggregationResult::Node(
        nested_counts(records, outer, inner)
            .into_iter()
            .map(|(key, counts)| (key, leaves(counts)))
            .collect(),
    )
}

/// Two-level counts as plain maps.
pub fn nested_counts<'a, R, I, O, N>(
    records: I,
    outer: O,
    inner: N,
) -> BTreeMap<String, BTreeMap<String, u64>>
where
    R: 'a,
    I: IntoIterator<Item = &'a R>,
    O: Fn(&R) -> String,
    N: Fn(&R) -> String,
{
    let mut counts: BTreeMap<String, BTreeMap<String, u64>> = BTreeMap::new();
    for record in records {
        *counts
            .entry(outer(record))
            .or_default()
            .entry(inner(record))
            .or_default() += 1;
    }
    counts
}

/// Arithmetic mean of `value` per key.
///
/// Records without a value are ignored; a key with no values at all gets
/// no bucket.
pub fn mean_by<'a, R, I, K, V>(records: I, key: K, value: V) -> AggregationResult
where
    R: 'a,
    I: IntoIterator<Item = &'a R>,
    K: Fn(&R) -> String,
    V: Fn(&R) -> Option<f64>,
{
    let mut samples: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for record in records {
        if let Some(v) = value(record).filter(|v| v.is_finite()) {
            samples.entry(key(record)).or_default().push(v);
        }
    }

    AggregationResult::Node(
        samples
            .into_iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(key, values)| (key, values.iter().mean()))
            .filter(|(_, mean)| mean.is_finite())
            .map(|(key, mean)| (key, AggregationResult::Leaf(Metric::Mean(mean))))
            .collect(),
    )
}

/// Directed edges between `source` and `target` keys, weighted by count.
/// Self-transitions are left out.
pub fn transition_graph<'a, R, I, S, T>(records: I, source: S, target: T) -> TransitionGraph
where
    R: 'a,
    I: IntoIterator<Item = &'a R>,
    S: Fn(&R) -> String,
    T: Fn(&R) -> String,
{
    let links = nested_counts(records, source, target)
        .into_iter()
        .flat_map(|(from, targets)| {
            targets.into_iter().filter_map(move |(to, value)| {
                if to == from {
                    None
                } else {
                    Some(Link {
                        source: from.clone(),
                        target: to,
                        value,
                    })
                }
            })
        })
        .collect();

    TransitionGraph { links }
}

fn leaves(counts: BTreeMap<String, u64>) -> AggregationResult {
    AggregationResult::Node(
        counts
            .into_iter()
            .map(|(key, count)| (key, AggregationResult::Leaf(Metric::Count(count))))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_count_by() {
        let words = ["a", "b", "a", "c", "a"];
        let result = count_by(&words, |w| w.to_string());
        assert_eq!(result.to_value(), json!({"a": 3, "b": 1, "c": 1}));
    }

    #[test]
    fn test_count_by2() {
        let pairs = [("d1", "x"), ("d1", "y"), ("d1", "x"), ("d2", "x")];
        let result = count_by2(&pairs, |p| p.0.to_string(), |p| p.1.to_string());
        assert_eq!(
            result.to_value(),
            json!({"d1": {"x": 2, "y": 1}, "d2": {"x": 1}})
        );
    }

    #[test]
    fn test_mean_skips_missing_and_empty() {
        let rows = [
            ("/home", Some(100.0)),
            ("/home", Some(200.0)),
            ("/home", None),
            ("/home", Some(300.0)),
            ("/about", None),
        ];
        let result = mean_by(&rows, |r| r.0.to_string(), |r| r.1);
        assert_eq!(result.get("/home").and_then(|r| r.mean()), Some(200.0));
        assert!(result.get("/about").is_none());
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_mean_of_nothing_is_empty() {
        let rows: [(&str, Option<f64>); 0] = [];
        assert!(mean_by(&rows, |r| r.0.to_string(), |r| r.1).is_empty());
    }

    #[test]
    fn test_transition_graph_excludes_self_loops() {
        let mut moves = Vec::new();
        moves.extend(std::iter::repeat(("A", "B")).take(3));
        moves.extend(std::iter::repeat(("B", "A")).take(2));
        moves.extend(std::iter::repeat(("A", "A")).take(5));

        let graph = transition_graph(&moves, |m| m.0.to_string(), |m| m.1.to_string());
        assert_eq!(
            graph.links,
            vec![
                Link {
                    source: "A".to_string(),
                    target: "B".to_string(),
                    value: 3
                },
                Link {
                    source: "B".to_string(),
                    target: "A".to_string(),
                    value: 2
                },
            ]
        );
    }
}
