//! REST adapter for the hosted database service.
//!
//! Speaks the PostgREST dialect the service exposes under `/rest/v1`:
//! rows are JSON objects, filters are `column=eq.value` query pairs, and
//! `Prefer: return=representation` makes writes echo the stored rows.

use super::{value_text, Backend, Filter};
use async_trait::async_trait;
use bastion_sync_types::{BackendError, ErrorKind, Record, RecordId};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Connection settings for [`RestBackend`].
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Project URL, e.g. `https://abc.example.co`.
    pub url: String,
    /// Anonymous or service API key.
    pub api_key: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".into(),
            api_key: None,
            timeout: Duration::from_secs(10),
        }
    }
}

/// [`Backend`] over HTTP.
#[derive(Debug, Clone)]
pub struct RestBackend {
    config: RestConfig,
    http: reqwest::Client,
}

/// Map an HTTP status to the failure class the write queue reacts to.
pub fn kind_for_status(status: StatusCode) -> ErrorKind {
    match status.as_u16() {
        400 | 422 => ErrorKind::Validation,
        401 | 403 => ErrorKind::Permission,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::Conflict,
        408 | 429 | 502 | 503 | 504 => ErrorKind::Connectivity,
        _ => ErrorKind::Internal,
    }
}

/// Classify a failure that happened before any response arrived.
fn transport_error(error: reqwest::Error) -> BackendError {
    if error.is_decode() || error.is_builder() {
        BackendError::internal(error.to_string())
    } else {
        // connect, timeout, request and body errors all mean we never got
        // a usable answer from the service
        BackendError::connectivity(error.to_string())
    }
}

impl RestBackend {
    /// Build a client for the given project.
    pub fn new(config: RestConfig) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let apikey = HeaderValue::from_str(key)
                .map_err(|e| BackendError::internal(format!("invalid api key: {e}")))?;
            let bearer = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| BackendError::internal(format!("invalid api key: {e}")))?;
            headers.insert("apikey", apikey);
            headers.insert(AUTHORIZATION, bearer);
        }
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| BackendError::internal(format!("http client: {e}")))?;

        Ok(Self { config, http })
    }

    /// The configured project URL.
    pub fn base_url(&self) -> &str {
        &self.config.url
    }

    /// Build the URL for a table's endpoint.
    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.url.trim_end_matches('/'), table)
    }

    fn by_id(&self, request: RequestBuilder, id: &RecordId) -> RequestBuilder {
        request.query(&[("id", format!("eq.{}", id.as_str()))])
    }

    /// Send a request and decode the returned rows.
    async fn rows(&self, request: RequestBuilder) -> Result<Vec<Record>, BackendError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::new(
                kind_for_status(status),
                error_message(status, &body),
            ));
        }

        // 204 No Content (e.g. delete without representation)
        let body = response.text().await.map_err(transport_error)?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        let value: Value = serde_json::from_str(&body)
            .map_err(|e| BackendError::internal(format!("unexpected response body: {e}")))?;
        match value {
            Value::Array(items) => Ok(items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect()),
            Value::Object(map) => Ok(vec![map]),
            other => Err(BackendError::internal(format!(
                "unexpected response body: {other}"
            ))),
        }
    }
}

/// Pull the service's `message` out of an error body, falling back to the
/// raw text.
fn error_message(status: StatusCode, body: &str) -> String {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    if detail.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {detail}")
    }
}

#[async_trait]
impl Backend for RestBackend {
    async fn insert(&self, table: &str, record: Record) -> Result<Record, BackendError> {
        let request = self.http.post(self.table_url(table)).json(&record);
        self.rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::internal(format!("insert into {table} returned no row")))
    }

    async fn update(
        &self,
        table: &str,
        id: &RecordId,
        fields: Record,
    ) -> Result<Record, BackendError> {
        let request = self.by_id(self.http.patch(self.table_url(table)), id).json(&fields);
        self.rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::not_found(format!("{table}.id = {id}")))
    }

    async fn delete(&self, table: &str, id: &RecordId) -> Result<(), BackendError> {
        let request = self.by_id(self.http.delete(self.table_url(table)), id);
        self.rows(request).await.map(|_| ())
    }

    async fn select(&self, table: &str, filters: &[Filter]) -> Result<Vec<Record>, BackendError> {
        let mut query = vec![("select".to_string(), "*".to_string())];
        query.extend(
            filters
                .iter()
                .map(|f| (f.column.clone(), format!("eq.{}", value_text(&f.value)))),
        );
        let request = self.http.get(self.table_url(table)).query(&query);
        self.rows(request).await
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let url = format!("{}/rest/v1/", self.config.url.trim_end_matches('/'));
        let response = self.http.get(url).send().await.map_err(transport_error)?;
        let status = response.status();
        match kind_for_status(status) {
            ErrorKind::Connectivity => Err(BackendError::connectivity(format!("HTTP {status}"))),
            _ => Ok(()),
        }
    }
}
