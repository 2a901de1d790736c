//! Configuration for the export pipeline.

use crate::enrich::rules::{BlacklistEntry, TransformRule};
use crate::fetch::PAGE_SIZE;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Export API used when the config does not name one.
pub const DEFAULT_BASE_URL: &str = "https://export.fullstory.com/api/v1/";

/// Environment variable that overrides the configured API key.
pub const API_KEY_ENV: &str = "STORY_EXPORT_API_KEY";

/// Main configuration for an export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Credential sent with every export API request
    #[serde(default)]
    pub api_key: String,

    /// Root of the export API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Authorization scheme placed before the API key
    #[serde(default = "default_auth_scheme")]
    pub auth_scheme: String,

    /// Number of descriptors a full list page holds
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Upper bound on export bodies fetched at once
    #[serde(default = "default_max_concurrent_exports")]
    pub max_concurrent_exports: usize,

    /// Per-request timeout
    #[serde(
        rename = "requestTimeoutSecs",
        with = "duration_serde",
        default = "default_request_timeout"
    )]
    pub request_timeout: Duration,

    /// IANA timezone used to split records into daily reports
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Route table, first match wins
    #[serde(default)]
    pub routes: Vec<RouteConfig>,

    /// Field name to values or predicates that drop a record
    #[serde(default)]
    pub blacklists: BTreeMap<String, Vec<BlacklistEntry>>,

    /// Derived fields, applied in order
    #[serde(default)]
    pub transforms: Vec<TransformRule>,
}

/// One route table entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Path template such as `/users/:id`
    pub route: String,
    /// Label written to the classified path field
    pub page: String,
}

impl RouteConfig {
    pub fn new(route: impl Into<String>, page: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            page: page.into(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_auth_scheme() -> String {
    "Basic".to_string()
}

fn default_page_size() -> usize {
    PAGE_SIZE
}

fn default_max_concurrent_exports() -> usize {
    8
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            auth_scheme: default_auth_scheme(),
            page_size: default_page_size(),
            max_concurrent_exports: default_max_concurrent_exports(),
            request_timeout: default_request_timeout(),
            timezone: default_timezone(),
            routes: Vec::new(),
            blacklists: BTreeMap::new(),
            transforms: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from an explicit path, or from the first default
    /// location that exists. Without either, defaults are used.
    ///
    /// A non-empty `STORY_EXPORT_API_KEY` replaces the configured key.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_paths().into_iter().find(|p| p.exists()),
        };

        let mut config = match config_path {
            Some(config_path) => {
                let content = std::fs::read_to_string(&config_path)
                    .map_err(|e| ConfigError::Io(format!("{}: {e}", config_path.display())))?;
                Self::from_json_str(&content)?
            }
            None => Self::default(),
        };

        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.api_key = key;
            }
        }

        Ok(config)
    }

    /// Parse configuration from a JSON document.
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Locations searched when no path is given.
    pub fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("story.json")];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("story-export").join("config.json"));
        }
        paths
    }

    /// Replace the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Check settings that do not need compiling routes or rules.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.page_size == 0 {
            return Err(ConfigError::InvalidSetting(
                "pageSize must be greater than zero".to_string(),
            ));
        }
        if self.max_concurrent_exports == 0 {
            return Err(ConfigError::InvalidSetting(
                "maxConcurrentExports must be greater than zero".to_string(),
            ));
        }
        self.tz()?;
        Ok(())
    }

    /// Timezone used for daily partitioning.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimezone(self.timezone.clone()))
    }
}

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("missing API key (set apiKey or {API_KEY_ENV})")]
    MissingApiKey,
    #[error("invalid route '{route}': {reason}")]
    InvalidRoute { route: String, reason: String },
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
    #[error("transform field '{0}' shadows a built-in record field")]
    ReservedField(String),
    #[error("unknown timezone '{0}'")]
    InvalidTimezone(String),
    #[error("invalid setting: {0}")]
    InvalidSetting(String),
    #[error("could not build HTTP client: {0}")]
    HttpClient(String),
}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
