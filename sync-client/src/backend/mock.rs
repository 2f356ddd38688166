//! In-memory backend for tests and offline demos.
//!
//! Stores rows per table, records every call, and can be told to become
//! unreachable or to fail specific calls.

use super::{value_text, Backend, Filter};
use async_trait::async_trait;
use bastion_sync_types::{BackendError, ErrorKind, Record, RecordId};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A call observed by [`MockBackend`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    /// `insert(table, record)`.
    Insert {
        /// Target table.
        table: String,
        /// Record as passed in.
        record: Record,
    },
    /// `update(table, id, fields)`.
    Update {
        /// Target table.
        table: String,
        /// Row being updated.
        id: RecordId,
        /// Fields as passed in.
        fields: Record,
    },
    /// `delete(table, id)`.
    Delete {
        /// Target table.
        table: String,
        /// Row being deleted.
        id: RecordId,
    },
    /// `select(table, ..)`.
    Select {
        /// Target table.
        table: String,
    },
    /// `ping()`.
    Ping,
}

impl MockCall {
    /// Whether the call would change remote data.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            MockCall::Insert { .. } | MockCall::Update { .. } | MockCall::Delete { .. }
        )
    }
}

/// In-memory [`Backend`].
///
/// Clones share state, so a test can keep a handle while the code under
/// test owns another.
#[derive(Debug, Default)]
pub struct MockBackend {
    inner: Arc<Mutex<MockBackendInner>>,
}

#[derive(Debug)]
struct MockBackendInner {
    tables: BTreeMap<String, Vec<Record>>,
    reachable: bool,
    fail_next: VecDeque<BackendError>,
    rejected_tables: HashMap<String, BackendError>,
    calls: Vec<MockCall>,
    next_id: u64,
}

impl Default for MockBackendInner {
    fn default() -> Self {
        Self {
            tables: BTreeMap::new(),
            reachable: true,
            fail_next: VecDeque::new(),
            rejected_tables: HashMap::new(),
            calls: Vec::new(),
            next_id: 1,
        }
    }
}

impl MockBackendInner {
    /// Common preamble for every data call: record it, then apply any
    /// injected failure.
    fn begin(&mut self, call: MockCall, table: Option<&str>) -> Result<(), BackendError> {
        self.calls.push(call);
        if !self.reachable {
            return Err(BackendError::connectivity("mock backend is unreachable"));
        }
        if let Some(error) = self.fail_next.pop_front() {
            return Err(error);
        }
        if let Some(error) = table.and_then(|t| self.rejected_tables.get(t)) {
            return Err(error.clone());
        }
        Ok(())
    }

    fn allocate_id(&mut self) -> String {
        let id = format!("mock-{}", self.next_id);
        self.next_id += 1;
        id
    }
}

fn id_matches(row: &Record, id: &RecordId) -> bool {
    row.get("id")
        .map(|v| value_text(v) == id.as_str())
        .unwrap_or(false)
}

impl MockBackend {
    /// Create an empty, reachable backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockBackendInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every subsequent call succeed (`true`) or fail with a
    /// connectivity error (`false`).
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Whether calls currently reach the backend.
    pub fn is_reachable(&self) -> bool {
        self.lock().reachable
    }

    /// Fail the next data call with `error`. Multiple failures queue up.
    pub fn fail_next(&self, error: BackendError) {
        self.lock().fail_next.push_back(error);
    }

    /// Reject every call touching `table` with an error of `kind`.
    pub fn reject_table(&self, table: &str, kind: ErrorKind) {
        self.lock().rejected_tables.insert(
            table.to_string(),
            BackendError::new(kind, format!("{table} is rejected by the mock")),
        );
    }

    /// Stop rejecting `table`.
    pub fn accept_table(&self, table: &str) {
        self.lock().rejected_tables.remove(table);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Only the calls that would change data.
    pub fn write_calls(&self) -> Vec<MockCall> {
        self.lock()
            .calls
            .iter()
            .filter(|c| c.is_write())
            .cloned()
            .collect()
    }

    /// Forget recorded calls.
    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Current rows of `table`, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Record> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    /// Put rows directly into `table`, bypassing call recording and
    /// failure injection. Rows without an `id` get one.
    pub fn seed(&self, table: &str, records: impl IntoIterator<Item = Record>) {
        let mut inner = self.lock();
        for mut record in records {
            if record.get("id").and_then(RecordId::from_value).is_none() {
                let id = inner.allocate_id();
                record.insert("id".into(), Value::String(id));
            }
            inner
                .tables
                .entry(table.to_string())
                .or_default()
                .push(record);
        }
    }
}

impl Clone for MockBackend {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn insert(&self, table: &str, mut record: Record) -> Result<Record, BackendError> {
        let mut inner = self.lock();
        inner.begin(
            MockCall::Insert {
                table: table.to_string(),
                record: record.clone(),
            },
            Some(table),
        )?;

        match record.get("id").and_then(RecordId::from_value) {
            Some(id) => {
                let exists = inner
                    .tables
                    .get(table)
                    .map(|rows| rows.iter().any(|r| id_matches(r, &id)))
                    .unwrap_or(false);
                if exists {
                    return Err(BackendError::new(
                        ErrorKind::Conflict,
                        format!("duplicate key: {table}.id = {id}"),
                    ));
                }
            }
            None => {
                let id = inner.allocate_id();
                record.insert("id".into(), Value::String(id));
            }
        }

        inner
            .tables
            .entry(table.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        table: &str,
        id: &RecordId,
        fields: Record,
    ) -> Result<Record, BackendError> {
        let mut inner = self.lock();
        inner.begin(
            MockCall::Update {
                table: table.to_string(),
                id: id.clone(),
                fields: fields.clone(),
            },
            Some(table),
        )?;

        let row = inner
            .tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| id_matches(r, id)))
            .ok_or_else(|| BackendError::not_found(format!("{table}.id = {id}")))?;

        for (key, value) in fields {
            if key != "id" {
                row.insert(key, value);
            }
        }
        Ok(row.clone())
    }

    async fn delete(&self, table: &str, id: &RecordId) -> Result<(), BackendError> {
        let mut inner = self.lock();
        inner.begin(
            MockCall::Delete {
                table: table.to_string(),
                id: id.clone(),
            },
            Some(table),
        )?;

        if let Some(rows) = inner.tables.get_mut(table) {
            rows.retain(|r| !id_matches(r, id));
        }
        Ok(())
    }

    async fn select(&self, table: &str, filters: &[Filter]) -> Result<Vec<Record>, BackendError> {
        let mut inner = self.lock();
        inner.begin(
            MockCall::Select {
                table: table.to_string(),
            },
            Some(table),
        )?;

        Ok(inner
            .tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|r| filters.iter().all(|f| f.matches(r)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let mut inner = self.lock();
        inner.calls.push(MockCall::Ping);
        if inner.reachable {
            Ok(())
        } else {
            Err(BackendError::connectivity("mock backend is unreachable"))
        }
    }
}
