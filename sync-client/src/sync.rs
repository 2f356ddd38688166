//! DataSyncService - the durable write path.
//!
//! Mutations go to the durable [`ChangeLog`] first, then a replay of the
//! whole log is queued on the [`ConnectionManager`]. Each replay applies
//! entries oldest first and removes exactly the entries that succeeded.
//!
//! ```text
//! queue_change ─→ ChangeLog::append ─→ ConnectionManager::queue_operation
//!                                                ↓ (when connected)
//!                                      sync_pending_changes ─→ Backend
//! ```

use crate::backend::Backend;
use crate::connection::ConnectionManager;
use crate::store::{ChangeLog, StoreError};
use bastion_sync_types::{
    BackendError, ChangeId, ChangeOperation, PendingChange, RecordId, StoredChange,
};
use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::sync::Mutex;

/// Errors from the local half of the write path.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The change log could not be read or written.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A remote call failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// An update or delete without a usable `data.id`.
    #[error("{operation} on {table} requires data.id")]
    MissingRecordId {
        /// Target collection.
        table: String,
        /// The operation that needed the id.
        operation: ChangeOperation,
    },

    /// A change without a target collection.
    #[error("change has no table")]
    EmptyTable,
}

impl SyncError {
    /// Whether the failure means the backend is unreachable.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, SyncError::Backend(e) if e.is_connectivity())
    }
}

/// Outcome of one replay pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Changes applied and removed from the log.
    pub applied: usize,
    /// Changes that failed with a non-connectivity error and were kept,
    /// plus applied changes the log could not drop.
    pub failed: usize,
}

/// Writes changes durably and replays them against the backend.
///
/// Clones share the log, backend and connection manager.
pub struct DataSyncService<L, B> {
    inner: Arc<SyncInner<L, B>>,
}

struct SyncInner<L, B> {
    log: L,
    backend: Arc<B>,
    connection: ConnectionManager,
    /// Serializes replay passes.
    pass: Mutex<()>,
}

impl<L, B> Clone for DataSyncService<L, B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L, B> DataSyncService<L, B>
where
    L: ChangeLog + 'static,
    B: Backend + 'static,
{
    /// Create a service.
    pub fn new(log: L, backend: Arc<B>, connection: ConnectionManager) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                log,
                backend,
                connection,
                pass: Mutex::new(()),
            }),
        }
    }

    /// The connection manager replays are queued on.
    pub fn connection(&self) -> &ConnectionManager {
        &self.inner.connection
    }

    /// The backend changes are applied to.
    pub fn backend(&self) -> &Arc<B> {
        &self.inner.backend
    }

    /// Record a change durably and queue a replay of the log.
    ///
    /// Only local failures (a malformed change, a storage error) are
    /// returned. Whatever happens remotely is handled by the replay.
    pub async fn queue_change(&self, change: PendingChange) -> Result<ChangeId, SyncError> {
        check_well_formed(&change)?;

        let stored = self.inner.log.append(change).await?;
        tracing::debug!(
            change_id = %stored.id,
            table = %stored.change.table,
            operation = %stored.change.operation,
            "change queued"
        );

        let weak: Weak<SyncInner<L, B>> = Arc::downgrade(&self.inner);
        self.inner
            .connection
            .queue_operation(move || {
                let weak = weak.clone();
                async move {
                    // Nothing to replay once the service is gone.
                    match weak.upgrade() {
                        Some(inner) => DataSyncService { inner }.replay().await,
                        None => Ok(()),
                    }
                }
            })
            .await;

        Ok(stored.id)
    }

    /// Replay as an operation for the connection manager: only
    /// connectivity failures are reported, so the manager keeps the replay
    /// queued and flips to disconnected.
    async fn replay(&self) -> Result<(), BackendError> {
        match self.sync_pending_changes().await {
            Ok(_) => Ok(()),
            Err(SyncError::Backend(e)) => Err(e),
            Err(e) => {
                tracing::warn!("Replay could not read pending changes: {}", e);
                Ok(())
            }
        }
    }

    /// Apply every pending change, oldest first.
    ///
    /// Applied changes are removed from the log by id. A change failing
    /// with a non-connectivity error is logged and kept, and the pass moves
    /// on. So does an applied change the log fails to drop; it is counted
    /// as failed and sent again on a later pass. A connectivity failure
    /// ends the pass and is returned.
    pub async fn sync_pending_changes(&self) -> Result<SyncReport, SyncError> {
        let _pass = self.inner.pass.lock().await;
        let changes = self.inner.log.list().await?;
        let mut report = SyncReport::default();

        for (index, stored) in changes.iter().enumerate() {
            match self.apply(&stored.change).await {
                Ok(()) => {
                    if let Err(e) = self.inner.log.remove(&stored.id).await {
                        report.failed += 1;
                        tracing::warn!(
                            change_id = %stored.id,
                            table = %stored.change.table,
                            "Change applied but could not be dropped from the log: {}",
                            e
                        );
                        continue;
                    }
                    report.applied += 1;
                    tracing::info!(
                        change_id = %stored.id,
                        table = %stored.change.table,
                        operation = %stored.change.operation,
                        "change applied"
                    );
                }
                Err(SyncError::Backend(e)) if e.is_connectivity() => {
                    tracing::warn!(
                        applied = report.applied,
                        remaining = changes.len() - index,
                        "Backend unreachable during sync: {}",
                        e
                    );
                    return Err(SyncError::Backend(e));
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        change_id = %stored.id,
                        table = %stored.change.table,
                        "Change failed, keeping it for the next pass: {}",
                        e
                    );
                }
            }
        }

        Ok(report)
    }

    async fn apply(&self, change: &PendingChange) -> Result<(), SyncError> {
        let backend = &self.inner.backend;
        match change.operation {
            ChangeOperation::Insert => {
                backend.insert(&change.table, change.data.clone()).await?;
            }
            ChangeOperation::Update => {
                let id = record_id(change)?;
                backend
                    .update(&change.table, &id, change.data.clone())
                    .await?;
            }
            ChangeOperation::Delete => {
                let id = record_id(change)?;
                backend.delete(&change.table, &id).await?;
            }
        }
        Ok(())
    }

    /// Entries currently in the log, oldest first.
    pub async fn pending_changes(&self) -> Result<Vec<StoredChange>, SyncError> {
        Ok(self.inner.log.list().await?)
    }

    /// Number of entries in the log.
    pub async fn pending_count(&self) -> Result<usize, SyncError> {
        Ok(self.inner.log.count().await?)
    }

    /// Drop one entry without applying it. Returns whether it existed.
    pub async fn remove_change(&self, id: &ChangeId) -> Result<bool, SyncError> {
        let removed = self.inner.log.remove(id).await?;
        if removed {
            tracing::info!(change_id = %id, "pending change discarded");
        }
        Ok(removed)
    }

    /// Drop every entry without applying it.
    pub async fn clear_pending(&self) -> Result<(), SyncError> {
        self.inner.log.clear().await?;
        tracing::info!("pending changes cleared");
        Ok(())
    }
}

fn check_well_formed(change: &PendingChange) -> Result<(), SyncError> {
    if change.table.is_empty() {
        return Err(SyncError::EmptyTable);
    }
    if change.operation.requires_id() {
        record_id(change)?;
    }
    Ok(())
}

fn record_id(change: &PendingChange) -> Result<RecordId, SyncError> {
    change.record_id().ok_or_else(|| SyncError::MissingRecordId {
        table: change.table.clone(),
        operation: change.operation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendProbe, MockBackend, MockCall};
    use crate::store::{KvChangeLog, MemoryStore, SqliteChangeLog};
    use bastion_sync_core::RetryPolicy;
    use bastion_sync_types::{ErrorKind, Record};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};

    type Service = DataSyncService<KvChangeLog<MemoryStore>, MockBackend>;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn service(connected: bool) -> (Service, MockBackend) {
        let backend = MockBackend::new();
        let shared = Arc::new(backend.clone());
        let connection = ConnectionManager::new(
            Arc::new(BackendProbe::new(shared.clone())),
            RetryPolicy::default(),
            connected,
        );
        let service = DataSyncService::new(KvChangeLog::new(MemoryStore::new()), shared, connection);
        (service, backend)
    }

    /// Log whose next `remove` fails once when armed.
    struct FlakyRemoveLog {
        log: KvChangeLog<MemoryStore>,
        fail_next_remove: AtomicBool,
    }

    impl FlakyRemoveLog {
        fn new() -> Self {
            Self {
                log: KvChangeLog::new(MemoryStore::new()),
                fail_next_remove: AtomicBool::new(false),
            }
        }
    }

    #[async_trait::async_trait]
    impl ChangeLog for FlakyRemoveLog {
        async fn append(&self, change: PendingChange) -> Result<StoredChange, StoreError> {
            self.log.append(change).await
        }

        async fn list(&self) -> Result<Vec<StoredChange>, StoreError> {
            self.log.list().await
        }

        async fn remove(&self, id: &ChangeId) -> Result<bool, StoreError> {
            if self.fail_next_remove.swap(false, Ordering::SeqCst) {
                return Err(StoreError::Io(std::io::Error::other("disk full")));
            }
            self.log.remove(id).await
        }

        async fn clear(&self) -> Result<(), StoreError> {
            self.log.clear().await
        }
    }

    fn insert(name: &str) -> PendingChange {
        PendingChange::insert("events", record(json!({ "name": name })))
    }

    #[tokio::test]
    async fn end_to_end_offline_then_online() {
        let (service, backend) = service(false);

        service.queue_change(insert("X")).await.unwrap();
        assert_eq!(service.pending_count().await.unwrap(), 1);
        assert!(backend.write_calls().is_empty());

        service.connection().set_connected(true).await;

        assert_eq!(service.pending_count().await.unwrap(), 0);
        assert_eq!(service.connection().retry_count(), 0);
        assert_eq!(backend.rows("events").len(), 1);
        assert_eq!(backend.rows("events")[0]["name"], json!("X"));
    }

    #[tokio::test]
    async fn removed_only_on_success() {
        let (service, backend) = service(false);
        service.queue_change(insert("X")).await.unwrap();

        backend.fail_next(BackendError::new(ErrorKind::Conflict, "duplicate key"));
        let report = service.sync_pending_changes().await.unwrap();
        assert_eq!(report.failed, 1);

        let pending = service.pending_changes().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].change, insert("X"));

        let report = service.sync_pending_changes().await.unwrap();
        assert_eq!(report.applied, 1);
        assert!(service.pending_changes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn applies_in_insertion_order() {
        let (service, backend) = service(false);
        backend.seed("events", [record(json!({"id": "e1", "name": "Old"}))]);

        service.queue_change(insert("A")).await.unwrap();
        service
            .queue_change(PendingChange::update(
                "events",
                record(json!({"id": "e1", "name": "New"})),
            ))
            .await
            .unwrap();
        service
            .queue_change(PendingChange::delete("events", record(json!({"id": "e1"}))))
            .await
            .unwrap();

        service.connection().set_connected(true).await;

        let kinds: Vec<&str> = backend
            .write_calls()
            .iter()
            .map(|c| match c {
                MockCall::Insert { .. } => "insert",
                MockCall::Update { .. } => "update",
                MockCall::Delete { .. } => "delete",
                _ => "other",
            })
            .collect();
        assert_eq!(kinds, vec!["insert", "update", "delete"]);
        let names: Vec<_> = backend.rows("events").iter().map(|r| r["name"].clone()).collect();
        assert_eq!(names, vec![json!("A")]);
    }

    #[tokio::test]
    async fn connectivity_loss_stops_pass_and_disconnects() {
        let (service, backend) = service(true);
        backend.set_reachable(false);

        service.queue_change(insert("A")).await.unwrap();

        assert!(!service.connection().is_connected());
        assert_eq!(service.pending_count().await.unwrap(), 1);
        // The replay stays queued for the next connected transition.
        assert_eq!(service.connection().pending_operations(), 1);

        backend.set_reachable(true);
        service.connection().set_connected(true).await;
        assert_eq!(service.pending_count().await.unwrap(), 0);
        assert_eq!(service.connection().pending_operations(), 0);
    }

    #[tokio::test]
    async fn connectivity_error_ends_pass() {
        let (service, backend) = service(false);
        service.queue_change(insert("A")).await.unwrap();
        service.queue_change(insert("B")).await.unwrap();
        service.queue_change(insert("C")).await.unwrap();

        backend.fail_next(BackendError::validation("bad"));
        backend.fail_next(BackendError::connectivity("timeout"));
        let err = service.sync_pending_changes().await.unwrap_err();

        assert!(err.is_connectivity());
        // A failed and was kept, B hit the outage, C was never tried.
        assert_eq!(service.pending_count().await.unwrap(), 3);
        assert_eq!(backend.write_calls().len(), 2);
    }

    #[tokio::test]
    async fn poison_change_does_not_block_others() {
        let (service, backend) = service(false);
        backend.reject_table("broken", ErrorKind::Validation);

        service
            .queue_change(PendingChange::insert("broken", Record::new()))
            .await
            .unwrap();
        service.queue_change(insert("fine")).await.unwrap();

        service.connection().set_connected(true).await;

        let pending = service.pending_changes().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].change.table, "broken");
        assert_eq!(backend.rows("events").len(), 1);
        assert!(service.connection().is_connected());
    }

    #[tokio::test]
    async fn failed_removal_does_not_stop_the_pass() {
        let backend = Arc::new(MockBackend::new());
        let connection = ConnectionManager::new(
            Arc::new(BackendProbe::new(backend.clone())),
            RetryPolicy::default(),
            false,
        );
        let service = DataSyncService::new(FlakyRemoveLog::new(), backend.clone(), connection);
        let a = service.queue_change(insert("A")).await.unwrap();
        service.queue_change(insert("B")).await.unwrap();

        service.inner.log.fail_next_remove.store(true, Ordering::SeqCst);
        let report = service.sync_pending_changes().await.unwrap();

        assert_eq!(report, SyncReport { applied: 1, failed: 1 });
        assert_eq!(backend.rows("events").len(), 2);
        let pending = service.pending_changes().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, a);

        let report = service.sync_pending_changes().await.unwrap();
        assert_eq!(report.applied, 1);
        assert_eq!(service.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn queued_replay_does_not_keep_service_alive() {
        let (service, backend) = service(false);
        service.queue_change(insert("A")).await.unwrap();

        let connection = service.connection().clone();
        let inner = Arc::downgrade(&service.inner);
        drop(service);

        assert!(inner.upgrade().is_none());
        assert_eq!(connection.pending_operations(), 1);

        connection.set_connected(true).await;
        assert_eq!(connection.pending_operations(), 0);
        assert!(connection.is_connected());
        assert!(backend.write_calls().is_empty());
    }

    #[tokio::test]
    async fn malformed_changes_rejected_locally() {
        let (service, _) = service(true);

        let err = service
            .queue_change(PendingChange::update("events", record(json!({"name": "X"}))))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::MissingRecordId { .. }));

        let err = service
            .queue_change(PendingChange::insert("", Record::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::EmptyTable));

        assert_eq!(service.pending_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn remove_and_clear_pending() {
        let (service, backend) = service(false);
        let a = service.queue_change(insert("A")).await.unwrap();
        service.queue_change(insert("B")).await.unwrap();

        assert!(service.remove_change(&a).await.unwrap());
        assert!(!service.remove_change(&a).await.unwrap());
        assert_eq!(service.pending_count().await.unwrap(), 1);

        service.clear_pending().await.unwrap();
        service.connection().set_connected(true).await;
        assert!(backend.write_calls().is_empty());
    }

    #[tokio::test]
    async fn replays_from_sqlite_log() {
        let backend = Arc::new(MockBackend::new());
        let connection = ConnectionManager::new(
            Arc::new(BackendProbe::new(backend.clone())),
            RetryPolicy::default(),
            false,
        );
        let log = SqliteChangeLog::in_memory().await.unwrap();
        let service = DataSyncService::new(log, backend.clone(), connection);

        service.queue_change(insert("A")).await.unwrap();
        service.queue_change(insert("B")).await.unwrap();
        let report = service.sync_pending_changes().await.unwrap();

        assert_eq!(report.applied, 2);
        assert_eq!(service.pending_count().await.unwrap(), 0);
        assert_eq!(backend.rows("events").len(), 2);
    }

    #[tokio::test]
    async fn concurrent_passes_apply_each_change_once() {
        let (service, backend) = service(false);
        for name in ["A", "B", "C"] {
            service.queue_change(insert(name)).await.unwrap();
        }

        let (one, two) = tokio::join!(
            service.sync_pending_changes(),
            service.sync_pending_changes()
        );
        assert_eq!(one.unwrap().applied + two.unwrap().applied, 3);
        assert_eq!(backend.rows("events").len(), 3);
    }
}
