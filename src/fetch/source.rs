//! The seam between the page loop and the remote export API.

use crate::enrich::RawEventRecord;
use crate::error::RequestError;
use crate::fetch::types::{ExportDescriptor, ExportId};
use async_trait::async_trait;

/// A provider of export descriptors and export bodies.
///
/// [`ExportClient`](crate::fetch::ExportClient) talks to the real API;
/// tests and replays can supply their own implementation.
#[async_trait]
pub trait ExportSource: Send + Sync {
    /// List the exports starting at `start` (epoch seconds).
    async fn list(&self, start: i64) -> Result<Vec<ExportDescriptor>, RequestError>;

    /// Fetch the records of a single export.
    async fn get(&self, id: &ExportId) -> Result<Vec<RawEventRecord>, RequestError>;
}
