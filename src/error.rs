//! Error types for the export pipeline.
//!
//! Retrieval and configuration failures are fatal and carry the context of
//! the request that caused them. Data-quality problems inside individual
//! records never surface here; enrichment degrades to empty values instead.

use crate::config::ConfigError;
use crate::fetch::ExportId;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the export pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// The export list call failed for the given cursor.
    #[error("export list request failed at cursor {cursor}: {source}")]
    List {
        cursor: i64,
        #[source]
        source: RequestError,
    },

    /// An export body call failed for the given export id.
    #[error("export request failed for id {id}: {source}")]
    Export {
        id: ExportId,
        #[source]
        source: RequestError,
    },

    /// Configuration was missing or malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The caller-imposed deadline elapsed before the run finished.
    #[error("export run timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Whether this error came from the remote export API.
    pub fn is_retrieval(&self) -> bool {
        matches!(self, Error::List { .. } | Error::Export { .. })
    }
}

/// Failure of a single request against the export API.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RequestError {
    /// Connection, TLS or timeout failure.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded.
    #[error("invalid response body: {0}")]
    Decode(String),
}
