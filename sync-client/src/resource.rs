//! SubmissionResource - one submission kind, end to end.
//!
//! Public submissions go through the durable write path so they survive
//! outages. Back-office reads and moderation talk to the backend directly
//! and report failures to the caller.

use crate::backend::{Backend, Filter};
use crate::store::ChangeLog;
use crate::sync::{DataSyncService, SyncError};
use bastion_sync_core::{FieldError, ResourceSchema, SubmissionStatus, SYSTEM_FIELDS};
use bastion_sync_types::{BackendError, ChangeId, ErrorKind, PendingChange, Record, RecordId};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Fields kept by [`SubmissionResource::export`] besides the schema's own.
const EXPORT_SYSTEM_FIELDS: &[&str] = &["id", "status", "submitted_at"];

/// Submission resource errors.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The record failed schema validation.
    #[error("invalid {entity}: {}", describe(.errors))]
    Invalid {
        /// The submission kind.
        entity: String,
        /// Every failing field.
        errors: Vec<FieldError>,
    },

    /// A direct backend call failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// The durable write path failed locally.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// No record with that id.
    #[error("{entity} {id} not found")]
    NotFound {
        /// The submission kind.
        entity: String,
        /// The missing id.
        id: RecordId,
    },

    /// Status operations on a kind without moderation.
    #[error("{entity} submissions are not moderated")]
    Unmoderated {
        /// The submission kind.
        entity: String,
    },
}

fn describe(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// A submission kind bound to the write path and backend.
pub struct SubmissionResource<L, B> {
    schema: ResourceSchema,
    sync: DataSyncService<L, B>,
}

impl<L, B> SubmissionResource<L, B>
where
    L: ChangeLog + 'static,
    B: Backend + 'static,
{
    /// Bind `schema` to a sync service.
    pub fn new(schema: ResourceSchema, sync: DataSyncService<L, B>) -> Self {
        Self { schema, sync }
    }

    /// The schema this resource serves.
    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    fn invalid(&self, errors: Vec<FieldError>) -> ResourceError {
        ResourceError::Invalid {
            entity: self.schema.entity.to_string(),
            errors,
        }
    }

    fn require_moderation(&self) -> Result<(), ResourceError> {
        if self.schema.moderated {
            Ok(())
        } else {
            Err(ResourceError::Unmoderated {
                entity: self.schema.entity.to_string(),
            })
        }
    }

    /// Accept a public submission.
    ///
    /// The record is validated, visitor-supplied system fields are dropped,
    /// `status` (moderated kinds only) and `submitted_at` are stamped, and
    /// the insert is queued on the durable write path.
    pub async fn submit(&self, mut record: Record) -> Result<ChangeId, ResourceError> {
        self.schema
            .validate(&record)
            .map_err(|errors| self.invalid(errors))?;

        record.retain(|key, _| !SYSTEM_FIELDS.contains(&key.as_str()));
        if self.schema.moderated {
            record.insert(
                "status".into(),
                Value::String(SubmissionStatus::Pending.as_str().into()),
            );
        }
        record.insert("submitted_at".into(), Value::from(now_secs()));

        let id = self
            .sync
            .queue_change(PendingChange::insert(self.schema.table, record))
            .await?;
        tracing::info!(entity = self.schema.entity, change_id = %id, "submission accepted");
        Ok(id)
    }

    /// Records, optionally only those with `status`.
    pub async fn list(&self, status: Option<SubmissionStatus>) -> Result<Vec<Record>, ResourceError> {
        let mut filters = Vec::new();
        if let Some(status) = status {
            self.require_moderation()?;
            filters.push(Filter::eq("status", status.as_str()));
        }
        Ok(self.sync.backend().select(self.schema.table, &filters).await?)
    }

    /// One record by id.
    pub async fn get(&self, id: &RecordId) -> Result<Record, ResourceError> {
        self.sync
            .backend()
            .select(self.schema.table, &[Filter::eq("id", id.as_str())])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| self.not_found(id))
    }

    fn not_found(&self, id: &RecordId) -> ResourceError {
        ResourceError::NotFound {
            entity: self.schema.entity.to_string(),
            id: id.clone(),
        }
    }

    /// Move a record to `status`.
    pub async fn set_status(
        &self,
        id: &RecordId,
        status: SubmissionStatus,
    ) -> Result<Record, ResourceError> {
        self.require_moderation()?;
        let mut fields = Record::new();
        fields.insert("status".into(), Value::String(status.as_str().into()));
        fields.insert("updated_at".into(), Value::from(now_secs()));

        let record = self.write_update(id, fields).await?;
        tracing::info!(entity = self.schema.entity, id = %id, status = %status, "status changed");
        Ok(record)
    }

    /// Publish a record.
    pub async fn approve(&self, id: &RecordId) -> Result<Record, ResourceError> {
        self.set_status(id, SubmissionStatus::Approved).await
    }

    /// Decline a record.
    pub async fn reject(&self, id: &RecordId) -> Result<Record, ResourceError> {
        self.set_status(id, SubmissionStatus::Rejected).await
    }

    /// Edit visitor fields of a record. System fields in `fields` are
    /// ignored; `updated_at` is stamped.
    pub async fn update(&self, id: &RecordId, mut fields: Record) -> Result<Record, ResourceError> {
        fields.retain(|key, _| !SYSTEM_FIELDS.contains(&key.as_str()));
        self.schema
            .validate_partial(&fields)
            .map_err(|errors| self.invalid(errors))?;
        fields.insert("updated_at".into(), Value::from(now_secs()));

        self.write_update(id, fields).await
    }

    async fn write_update(&self, id: &RecordId, fields: Record) -> Result<Record, ResourceError> {
        self.sync
            .backend()
            .update(self.schema.table, id, fields)
            .await
            .map_err(|e| match e.kind {
                ErrorKind::NotFound => self.not_found(id),
                _ => ResourceError::Backend(e),
            })
    }

    /// Remove a record.
    pub async fn delete(&self, id: &RecordId) -> Result<(), ResourceError> {
        self.sync.backend().delete(self.schema.table, id).await?;
        tracing::info!(entity = self.schema.entity, id = %id, "record deleted");
        Ok(())
    }

    /// Records reduced to the schema's fields plus id, status and
    /// submission time.
    pub async fn export(&self, status: Option<SubmissionStatus>) -> Result<Vec<Record>, ResourceError> {
        let records = self.list(status).await?;
        Ok(records.into_iter().map(|r| self.project(r)).collect())
    }

    fn project(&self, mut record: Record) -> Record {
        record.retain(|key, _| {
            EXPORT_SYSTEM_FIELDS.contains(&key.as_str()) || self.schema.field(key).is_some()
        });
        record
    }
}
