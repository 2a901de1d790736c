//! Record enrichment.
//!
//! This module contains:
//! - Raw and enriched record types
//! - Email, URL and timestamp decomposition
//! - Route classification
//! - Typed transform and blacklist rules
//! - The enricher applying all of the above per record

pub mod decompose;
pub mod enricher;
pub mod record;
pub mod routes;
pub mod rules;

// Re-export commonly used types
pub use enricher::{enrich, Enricher};
pub use record::{value_text, EnrichedEventRecord, RawEventRecord};
pub use routes::{RouteRule, RouteTable};
pub use rules::{
    BlacklistEntry, PredicateRule, RecordPredicate, RecordTransform, TransformOp, TransformRule,
};
