//! Aggregation of enriched records.
//!
//! This module contains:
//! - Result types and their nested-object wire form
//! - Generic count, mean and transition reductions
//! - The named catalogue run over every export

pub mod catalogue;
pub mod result;
pub mod rollup;

// Re-export commonly used types
pub use catalogue::{
    aggregate, all_aggregations, AggregationCatalogue, AggregationKind, UNKNOWN_KEY,
};
pub use result::{AggregationOutput, AggregationResult, Link, Metric, TransitionGraph};
pub use rollup::{count_by, count_by2, mean_by, nested_counts, transition_graph};
