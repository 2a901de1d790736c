//! Retrieval of raw event records from the export API.
//!
//! This module contains:
//! - Wire types of the list endpoint
//! - The [`ExportSource`] seam and its HTTP implementation
//! - The cursor-advancing page loop and concurrent body fetch

pub mod client;
pub mod pager;
pub mod source;
pub mod types;

// Re-export commonly used types
pub use client::ExportClient;
pub use pager::{fetch_records, next_page, pages, ExportPage, FetchOptions, NextPage};
pub use source::ExportSource;
pub use types::{ExportDescriptor, ExportId, ExportList, PAGE_SIZE};
