//! Local persistence for Bastion.
//!
//! Two layers:
//! - [`KeyValueStore`]: string values under string keys (memory, files).
//! - [`ChangeLog`]: the durable, ordered list of pending changes. Entries
//!   are addressed by [`ChangeId`], never by position or value.

mod file;
mod kv_log;
mod memory;
mod sqlite;

pub use file::FileStore;
pub use kv_log::KvChangeLog;
pub use memory::MemoryStore;
pub use sqlite::SqliteChangeLog;

use crate::config::{StoreConfig, StoreKind};
use async_trait::async_trait;
use bastion_sync_types::{ChangeId, PendingChange, StoredChange};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Key under which [`KvChangeLog`] keeps the whole pending list.
pub const PENDING_CHANGES_KEY: &str = "pendingChanges";

/// File name of the SQLite change log inside the data directory.
pub const SQLITE_FILE_NAME: &str = "pending_changes.db";

/// Storage layer errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Key contains characters the store cannot represent.
    #[error("invalid key: {key:?}")]
    InvalidKey {
        /// The rejected key.
        key: String,
    },

    /// Persisted data does not have the expected shape.
    #[error("corrupt entry {location}: {reason}")]
    Corrupt {
        /// Where the bad data lives.
        location: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Database path error.
    #[error("invalid database path: {path}")]
    InvalidPath {
        /// The invalid path.
        path: PathBuf,
    },
}

/// String values under string keys.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value. Missing keys are `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Delete a value. Missing keys are not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// The durable list of changes waiting to be applied remotely.
///
/// Implementations keep insertion order and survive process restarts
/// (except the in-memory test variants).
#[async_trait]
pub trait ChangeLog: Send + Sync {
    /// Append a change and return it with its assigned id.
    async fn append(&self, change: PendingChange) -> Result<StoredChange, StoreError>;

    /// All entries, oldest first.
    async fn list(&self) -> Result<Vec<StoredChange>, StoreError>;

    /// Remove the entry with `id`. Returns whether it was present.
    async fn remove(&self, id: &ChangeId) -> Result<bool, StoreError>;

    /// Remove every entry.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Number of entries.
    async fn count(&self) -> Result<usize, StoreError> {
        Ok(self.list().await?.len())
    }
}

#[async_trait]
impl<T: ChangeLog + ?Sized> ChangeLog for Box<T> {
    async fn append(&self, change: PendingChange) -> Result<StoredChange, StoreError> {
        (**self).append(change).await
    }

    async fn list(&self) -> Result<Vec<StoredChange>, StoreError> {
        (**self).list().await
    }

    async fn remove(&self, id: &ChangeId) -> Result<bool, StoreError> {
        (**self).remove(id).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        (**self).clear().await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        (**self).count().await
    }
}

#[async_trait]
impl<T: ChangeLog + ?Sized> ChangeLog for Arc<T> {
    async fn append(&self, change: PendingChange) -> Result<StoredChange, StoreError> {
        (**self).append(change).await
    }

    async fn list(&self) -> Result<Vec<StoredChange>, StoreError> {
        (**self).list().await
    }

    async fn remove(&self, id: &ChangeId) -> Result<bool, StoreError> {
        (**self).remove(id).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        (**self).clear().await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        (**self).count().await
    }
}

/// Open the change log described by `config`.
pub async fn open_change_log(config: &StoreConfig) -> Result<Box<dyn ChangeLog>, StoreError> {
    let log: Box<dyn ChangeLog> = match config.kind {
        StoreKind::Memory => Box::new(KvChangeLog::new(MemoryStore::new())),
        StoreKind::File => Box::new(KvChangeLog::new(FileStore::open(&config.path).await?)),
        StoreKind::Sqlite => {
            tokio::fs::create_dir_all(&config.path).await?;
            Box::new(SqliteChangeLog::new(&config.path.join(SQLITE_FILE_NAME)).await?)
        }
    };
    tracing::debug!(kind = ?config.kind, path = %config.path.display(), "opened change log");
    Ok(log)
}
