//! HTTP client for the remote export API.

use crate::config::{Config, ConfigError};
use crate::enrich::RawEventRecord;
use crate::error::RequestError;
use crate::fetch::source::ExportSource;
use crate::fetch::types::{ExportDescriptor, ExportId, ExportList};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;

/// HTTP implementation of [`ExportSource`].
pub struct ExportClient {
    base_url: String,
    authorization: String,
    client: reqwest::Client,
}

impl ExportClient {
    /// Create a client from a validated configuration.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        if config.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            authorization: format!("{} {}", config.auth_scheme, config.api_key.trim()),
            client,
        })
    }

    /// Get the list endpoint URL.
    pub fn list_url(&self) -> String {
        format!("{}/export/list", self.base_url)
    }

    /// Get the export body endpoint URL.
    pub fn get_url(&self) -> String {
        format!("{}/export/get", self.base_url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, RequestError> {
        let response = request
            .header(AUTHORIZATION, &self.authorization)
            .send()
            .await
            .map_err(|e| RequestError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(RequestError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl ExportSource for ExportClient {
    async fn list(&self, start: i64) -> Result<Vec<ExportDescriptor>, RequestError> {
        let request = self.client.get(self.list_url()).query(&[("start", start)]);
        let list: ExportList = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| RequestError::Decode(e.to_string()))?;

        Ok(list.exports)
    }

    async fn get(&self, id: &ExportId) -> Result<Vec<RawEventRecord>, RequestError> {
        let request = self.client.get(self.get_url()).query(&[("id", id.as_str())]);
        let values: Vec<serde_json::Value> = self
            .send(request)
            .await?
            .json()
            .await
            .map_err(|e| RequestError::Decode(e.to_string()))?;

        Ok(decode_records(id, values))
    }
}

/// Decode export rows. Rows that are not JSON objects are skipped; known
/// fields with an unexpected type are kept raw by [`RawEventRecord`].
pub(crate) fn decode_records(id: &ExportId, values: Vec<serde_json::Value>) -> Vec<RawEventRecord> {
    let total = values.len();
    let records: Vec<RawEventRecord> = values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(export_id = %id, index, error = %e, "skipping non-object row");
                None
            }
        })
        .collect();

    if records.len() < total {
        tracing::warn!(
            export_id = %id,
            skipped = total - records.len(),
            "export contained non-object rows"
        );
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_urls() {
        let config = Config {
            base_url: "http://127.0.0.1:8080/api/v1/".to_string(),
            ..Config::default()
        }
        .with_api_key("secret");
        let client = ExportClient::new(&config).unwrap();
        assert_eq!(client.list_url(), "http://127.0.0.1:8080/api/v1/export/list");
        assert_eq!(client.get_url(), "http://127.0.0.1:8080/api/v1/export/get");
        assert_eq!(client.authorization, "Basic secret");
    }

    #[test]
    fn test_client_requires_api_key() {
        assert!(matches!(
            ExportClient::new(&Config::default()),
            Err(ConfigError::MissingApiKey)
        ));
    }

    #[test]
    fn test_decode_keeps_mistyped_rows() {
        let id = ExportId::new("1");
        let values = vec![
            json!({"EventType": "click", "PageNumErrors": 0}),
            json!({"EventType": "click", "PageNumErrors": "many", "UserAppKey": 12345}),
            json!({"EventType": "load", "PageDuration": 89791.5, "evt_view_str": "grid"}),
        ];
        let records = decode_records(&id, values);
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].field("UserAppKey"), Some(json!(12345)));
        assert_eq!(records[2].page_duration, Some(89791.5));
        assert_eq!(records[2].extra["evt_view_str"], json!("grid"));
    }

    #[test]
    fn test_decode_skips_non_object_rows() {
        let id = ExportId::new("1");
        let values = vec![json!({"EventType": "click"}), json!("garbage"), json!(null)];
        assert_eq!(decode_records(&id, values).len(), 1);
    }
}
