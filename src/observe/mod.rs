//! Run observation.
//!
//! This module provides the hooks the fetch loop and pipeline report
//! progress through, and a run log that counts and logs what happened.

pub mod observer;
pub mod run_log;

// Re-export commonly used types
pub use observer::{NoopObserver, PipelineObserver};
pub use run_log::{RunLog, RunStats};
