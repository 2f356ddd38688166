//! Backend abstraction for Bastion.
//!
//! This module provides a pluggable layer over the hosted
//! database-as-a-service that actually stores submissions (REST adapter,
//! in-memory mock for tests and local development).
//!
//! # Design
//!
//! The backend trait is async and record-oriented:
//! - `insert()` creates a row and returns it as stored
//! - `update()` applies fields to the row with a given id
//! - `delete()` removes the row with a given id
//! - `select()` returns rows matching equality filters
//! - `ping()` checks reachability
//!
//! Every failure carries an [`ErrorKind`](bastion_sync_types::ErrorKind)
//! chosen by the adapter, so the write queue can tell "unreachable" from
//! "rejected" without reading error text.
//!
//! # Example
//!
//! ```ignore
//! let backend = MockBackend::new();
//! let row = backend.insert("events", record).await?;
//! let pending = backend.select("events", &[Filter::eq("status", "pending")]).await?;
//! ```

mod mock;
mod rest;

pub use mock::{MockBackend, MockCall};
pub use rest::{kind_for_status, RestBackend, RestConfig};

use async_trait::async_trait;
use bastion_sync_types::{BackendError, Record, RecordId};
use serde_json::Value;
use std::sync::Arc;

/// An equality filter on one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    /// Column name.
    pub column: String,
    /// Value the column must equal.
    pub value: Value,
}

impl Filter {
    /// `column = value`.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Whether a record satisfies this filter.
    pub fn matches(&self, record: &Record) -> bool {
        match record.get(&self.column) {
            Some(found) => found == &self.value || value_text(found) == value_text(&self.value),
            None => self.value.is_null(),
        }
    }
}

/// Textual form of a scalar, as it would appear in a query string.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Backend trait for reading and writing remote collections.
///
/// Implementations handle the underlying wire protocol
/// (PostgREST-style HTTP, mock, etc).
#[async_trait]
pub trait Backend: Send + Sync {
    /// Create a row. Returns the row as stored (with its assigned `id`).
    async fn insert(&self, table: &str, record: Record) -> Result<Record, BackendError>;

    /// Apply `fields` to the row whose `id` matches. Returns the updated row.
    async fn update(
        &self,
        table: &str,
        id: &RecordId,
        fields: Record,
    ) -> Result<Record, BackendError>;

    /// Remove the row whose `id` matches. Removing a missing row succeeds,
    /// so replaying a delete is harmless.
    async fn delete(&self, table: &str, id: &RecordId) -> Result<(), BackendError>;

    /// Rows matching every filter, in storage order.
    async fn select(&self, table: &str, filters: &[Filter]) -> Result<Vec<Record>, BackendError>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<(), BackendError>;
}

/// Application-defined reachability check used by the reconnection loop.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Resolve `Ok` if the backend can be reached right now.
    async fn probe(&self) -> Result<(), BackendError>;
}

/// Health probe that pings a [`Backend`].
#[derive(Debug)]
pub struct BackendProbe<B> {
    backend: Arc<B>,
}

impl<B> BackendProbe<B> {
    /// Probe the given backend.
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl<B: Backend> HealthProbe for BackendProbe<B> {
    async fn probe(&self) -> Result<(), BackendError> {
        self.backend.ping().await
    }
}
