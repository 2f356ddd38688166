//! Change log kept as one JSON array under a single key.
//!
//! Every mutation reads the full list, changes it and writes it back. An
//! internal lock serializes those cycles within a process; separate
//! processes sharing one directory are not coordinated (use
//! [`SqliteChangeLog`](super::SqliteChangeLog) for that).

use super::{ChangeLog, KeyValueStore, StoreError, PENDING_CHANGES_KEY};
use async_trait::async_trait;
use bastion_sync_types::{ChangeId, PendingChange, StoredChange};
use serde::Deserialize;
use tokio::sync::Mutex;

/// [`ChangeLog`] over any [`KeyValueStore`].
#[derive(Debug)]
pub struct KvChangeLog<S> {
    store: S,
    key: String,
    lock: Mutex<()>,
}

/// A persisted entry. Lists written before entries carried ids hold bare
/// changes; those are given ids on first load.
#[derive(Deserialize)]
#[serde(untagged)]
enum Entry {
    Stored(StoredChange),
    Legacy(PendingChange),
}

impl<S: KeyValueStore> KvChangeLog<S> {
    /// Log stored under [`PENDING_CHANGES_KEY`].
    pub fn new(store: S) -> Self {
        Self::with_key(store, PENDING_CHANGES_KEY)
    }

    /// Log stored under a custom key.
    pub fn with_key(store: S, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            lock: Mutex::new(()),
        }
    }

    /// The underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read the list. Caller must hold `lock`.
    async fn load(&self) -> Result<Vec<StoredChange>, StoreError> {
        let Some(raw) = self.store.get(&self.key).await? else {
            return Ok(Vec::new());
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let entries: Vec<Entry> = serde_json::from_str(&raw).map_err(|e| StoreError::Corrupt {
            location: self.key.clone(),
            reason: e.to_string(),
        })?;

        let mut migrated = 0usize;
        let changes: Vec<StoredChange> = entries
            .into_iter()
            .map(|entry| match entry {
                Entry::Stored(stored) => stored,
                Entry::Legacy(change) => {
                    migrated += 1;
                    StoredChange::new(change)
                }
            })
            .collect();

        if migrated > 0 {
            tracing::info!(key = %self.key, migrated, "assigned ids to legacy pending changes");
            self.save(&changes).await?;
        }
        Ok(changes)
    }

    /// Write the list. Caller must hold `lock`.
    async fn save(&self, changes: &[StoredChange]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(changes)?;
        self.store.set(&self.key, raw).await
    }
}

#[async_trait]
impl<S: KeyValueStore> ChangeLog for KvChangeLog<S> {
    async fn append(&self, change: PendingChange) -> Result<StoredChange, StoreError> {
        let _guard = self.lock.lock().await;
        let mut changes = self.load().await?;
        let stored = StoredChange::new(change);
        changes.push(stored.clone());
        self.save(&changes).await?;
        Ok(stored)
    }

    async fn list(&self) -> Result<Vec<StoredChange>, StoreError> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    async fn remove(&self, id: &ChangeId) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut changes = self.load().await?;
        let before = changes.len();
        changes.retain(|c| &c.id != id);
        if changes.len() == before {
            return Ok(false);
        }
        self.save(&changes).await?;
        Ok(true)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.store.remove(&self.key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn change(name: &str) -> PendingChange {
        let Value::Object(data) = json!({ "name": name }) else {
            unreachable!()
        };
        PendingChange::insert("events", data)
    }

    #[tokio::test]
    async fn append_list_remove() {
        let log = KvChangeLog::new(MemoryStore::new());
        let a = log.append(change("A")).await.unwrap();
        let b = log.append(change("B")).await.unwrap();

        let ids: Vec<_> = log.list().await.unwrap().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![a.id, b.id]);

        assert!(log.remove(&a.id).await.unwrap());
        assert!(!log.remove(&a.id).await.unwrap());
        assert_eq!(log.list().await.unwrap(), vec![b]);
    }

    #[tokio::test]
    async fn identical_changes_are_removed_individually() {
        let log = KvChangeLog::new(MemoryStore::new());
        let first = log.append(change("same")).await.unwrap();
        let second = log.append(change("same")).await.unwrap();

        log.remove(&first.id).await.unwrap();
        assert_eq!(log.list().await.unwrap(), vec![second]);
    }

    #[tokio::test]
    async fn stored_under_pending_changes_key() {
        let store = MemoryStore::new();
        let log = KvChangeLog::new(store.clone());
        log.append(change("A")).await.unwrap();

        let raw = store.get(PENDING_CHANGES_KEY).await.unwrap().unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[0]["table"], json!("events"));
        assert_eq!(value[0]["operation"], json!("insert"));
        assert_eq!(value[0]["data"], json!({"name": "A"}));
        assert!(value[0]["id"].is_string());
    }

    #[tokio::test]
    async fn legacy_entries_get_stable_ids() {
        let store = MemoryStore::new();
        store
            .set(
                PENDING_CHANGES_KEY,
                r#"[{"table":"events","operation":"insert","data":{"name":"X"}}]"#.into(),
            )
            .await
            .unwrap();

        let log = KvChangeLog::new(store);
        let first = log.list().await.unwrap();
        let second = log.list().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first, second);
        assert_eq!(first[0].change, change("X"));
    }

    #[tokio::test]
    async fn corrupt_list_is_reported_and_clearable() {
        let store = MemoryStore::new();
        store
            .set(PENDING_CHANGES_KEY, "{not json".into())
            .await
            .unwrap();

        let log = KvChangeLog::new(store);
        assert!(matches!(
            log.list().await,
            Err(StoreError::Corrupt { .. })
        ));

        log.clear().await.unwrap();
        assert!(log.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_appends_are_not_lost() {
        let log = Arc::new(KvChangeLog::new(MemoryStore::new()));
        let mut handles = Vec::new();
        for i in 0..20 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                log.append(change(&format!("c{i}"))).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(log.count().await.unwrap(), 20);
    }
}
