//! Queued mutations against remote collections.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::ids::{ChangeId, RecordId};

/// A JSON object as stored in a remote collection.
pub type Record = Map<String, Value>;

/// The kind of mutation a change performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOperation {
    /// Create a new row from `data`.
    Insert,
    /// Apply `data` to the row matching `data.id`.
    Update,
    /// Remove the row matching `data.id`.
    Delete,
}

impl ChangeOperation {
    /// Whether `data` must carry an `id` for this operation.
    pub fn requires_id(&self) -> bool {
        matches!(self, ChangeOperation::Update | ChangeOperation::Delete)
    }
}

impl fmt::Display for ChangeOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeOperation::Insert => "insert",
            ChangeOperation::Update => "update",
            ChangeOperation::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// A mutation that has been requested but not yet applied remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChange {
    /// Target collection name.
    pub table: String,
    /// What to do.
    pub operation: ChangeOperation,
    /// The payload. For update and delete it must contain `id`.
    pub data: Record,
}

impl PendingChange {
    /// Create a change.
    pub fn new(table: impl Into<String>, operation: ChangeOperation, data: Record) -> Self {
        Self {
            table: table.into(),
            operation,
            data,
        }
    }

    /// Insert `data` into `table`.
    pub fn insert(table: impl Into<String>, data: Record) -> Self {
        Self::new(table, ChangeOperation::Insert, data)
    }

    /// Update the row of `table` matching `data.id`.
    pub fn update(table: impl Into<String>, data: Record) -> Self {
        Self::new(table, ChangeOperation::Update, data)
    }

    /// Delete the row of `table` matching `data.id`.
    pub fn delete(table: impl Into<String>, data: Record) -> Self {
        Self::new(table, ChangeOperation::Delete, data)
    }

    /// The match key for update and delete, if present and usable.
    pub fn record_id(&self) -> Option<RecordId> {
        self.data.get("id").and_then(RecordId::from_value)
    }

    /// Whether the change carries everything its operation needs.
    pub fn is_well_formed(&self) -> bool {
        !self.table.is_empty() && (!self.operation.requires_id() || self.record_id().is_some())
    }
}

/// A [`PendingChange`] as persisted in the durable log.
///
/// The id is assigned on append and is the only thing used to remove the
/// entry later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChange {
    /// Log-local identity of this entry.
    pub id: ChangeId,
    /// The mutation itself.
    #[serde(flatten)]
    pub change: PendingChange,
}

impl StoredChange {
    /// Wrap a change with a fresh id.
    pub fn new(change: PendingChange) -> Self {
        Self {
            id: ChangeId::new(),
            change,
        }
    }
}
