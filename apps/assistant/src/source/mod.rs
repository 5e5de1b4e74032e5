//! Remote Record Source: candidate/job records and categories from the platform API.
//!
//! Callers must tell three failures apart: `Unauthorized` ends the turn,
//! `Request` and `Network` only shrink the search to what did load.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::models::category::Category;
use crate::models::record::RecordKind;

const ENVELOPE_KEYS: &[&str] = &["data", "items", "results", "candidates", "jobs", "categories"];
const DEFAULT_AUTH_MESSAGE: &str = "Your session has expired. Please sign in again.";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("Remote request failed with status {status}")]
    Request { status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Could not decode remote payload: {0}")]
    Decode(String),
}

impl SourceError {
    pub fn is_auth(&self) -> bool {
        matches!(self, SourceError::Unauthorized(_))
    }
}

/// Query hints passed through to the remote API. All optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    pub category_id: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<String>,
}

#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch_categories(&self, token: &str) -> Result<Vec<Category>, SourceError>;

    /// Raw attribute bags; decoding into typed records is the caller's concern.
    async fn fetch_records(
        &self,
        kind: RecordKind,
        query: &RecordQuery,
        token: &str,
    ) -> Result<Vec<Value>, SourceError>;
}

/// Bearer-authenticated HTTP client for the platform API.
#[derive(Clone)]
pub struct HttpRecordSource {
    client: Client,
    categories_url: String,
    candidates_url: String,
    jobs_url: String,
}

impl HttpRecordSource {
    pub fn new(
        categories_url: String,
        candidates_url: String,
        jobs_url: String,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;
        Ok(Self {
            client,
            categories_url,
            candidates_url,
            jobs_url,
        })
    }

    async fn get_items(
        &self,
        url: &str,
        params: &[(&str, &str)],
        token: &str,
    ) -> Result<Vec<Value>, SourceError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .query(params)
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Unauthorized(auth_message(&body)));
        }
        if !status.is_success() {
            return Err(SourceError::Request {
                status: status.as_u16(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        let items = extract_items(body);
        debug!("GET {url} returned {} items", items.len());
        Ok(items)
    }
}

#[async_trait]
impl RecordSource for HttpRecordSource {
    async fn fetch_categories(&self, token: &str) -> Result<Vec<Category>, SourceError> {
        let items = self.get_items(&self.categories_url, &[], token).await?;
        Ok(items.into_iter().filter_map(Category::from_raw).collect())
    }

    async fn fetch_records(
        &self,
        kind: RecordKind,
        query: &RecordQuery,
        token: &str,
    ) -> Result<Vec<Value>, SourceError> {
        let url = match kind {
            RecordKind::Candidates => &self.candidates_url,
            RecordKind::Jobs => &self.jobs_url,
        };
        let params: Vec<(&str, &str)> = [
            ("categoryId", query.category_id.as_deref()),
            ("location", query.location.as_deref()),
            ("employmentType", query.employment_type.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| (key, v)))
        .collect();

        self.get_items(url, &params, token).await
    }
}

/// Unwraps `[..]`, `{"data": [..]}`, `{"data": {"items": [..]}}` and similar envelopes.
fn extract_items(body: Value) -> Vec<Value> {
    match body {
        Value::Array(items) => items,
        Value::Object(mut map) => ENVELOPE_KEYS
            .iter()
            .find_map(|key| map.remove(*key))
            .map(extract_items)
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn auth_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_AUTH_MESSAGE.to_string())
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_items_from_bare_array() {
        assert_eq!(extract_items(json!([{"id": 1}, {"id": 2}])).len(), 2);
    }

    #[test]
    fn test_extract_items_from_nested_envelope() {
        let body = json!({"success": true, "data": {"jobs": [{"id": 1}]}});
        assert_eq!(extract_items(body), vec![json!({"id": 1})]);
    }

    #[test]
    fn test_extract_items_unknown_shape_is_empty() {
        assert!(extract_items(json!({"status": "ok"})).is_empty());
        assert!(extract_items(json!("nope")).is_empty());
    }

    #[test]
    fn test_auth_message_prefers_remote_text() {
        assert_eq!(auth_message(r#"{"message":"Token expired"}"#), "Token expired");
        assert_eq!(auth_message("<html>"), DEFAULT_AUTH_MESSAGE);
    }

    #[test]
    fn test_only_unauthorized_is_auth() {
        assert!(SourceError::Unauthorized("x".into()).is_auth());
        assert!(!SourceError::Request { status: 500 }.is_auth());
        assert!(!SourceError::Network("reset".into()).is_auth());
    }
}
