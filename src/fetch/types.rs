//! Wire types of the export list endpoint.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Number of descriptors in a full list page as served by the provider.
pub const PAGE_SIZE: usize = 20;

/// Opaque export identifier.
///
/// The provider sends numeric ids; strings are accepted as well so the id
/// can always be echoed back verbatim in the `get` call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ExportId(String);

impl ExportId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for ExportId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl<'de> Deserialize<'de> for ExportId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Unsigned(u64),
            Signed(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Unsigned(id) => Self(id.to_string()),
            RawId::Signed(id) => Self(id.to_string()),
            RawId::Text(id) => Self(id),
        })
    }
}

/// One export named by the list endpoint, covering `[start, stop)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExportDescriptor {
    pub id: ExportId,
    /// Window start, epoch seconds
    pub start: i64,
    /// Window end, epoch seconds
    pub stop: i64,
}

impl ExportDescriptor {
    pub fn new(id: impl Into<ExportId>, start: i64, stop: i64) -> Self {
        Self {
            id: id.into(),
            start,
            stop,
        }
    }
}

/// Body of the list endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportList {
    #[serde(default)]
    pub exports: Vec<ExportDescriptor>,
}
