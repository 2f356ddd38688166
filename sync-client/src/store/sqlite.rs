//! SQLite change log.

use super::{ChangeLog, StoreError};
use async_trait::async_trait;
use bastion_sync_types::{ChangeId, ChangeOperation, PendingChange, Record, StoredChange};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// [`ChangeLog`] in a SQLite table.
///
/// Each append and removal is a single statement, so several processes
/// can share one database file. Order comes from an autoincrement column.
#[derive(Debug, Clone)]
pub struct SqliteChangeLog {
    pool: SqlitePool,
}

impl SqliteChangeLog {
    /// Open the log at `path`, creating the database if it doesn't exist.
    pub async fn new(path: &Path) -> Result<Self, StoreError> {
        if path.file_name().is_none() {
            return Err(StoreError::InvalidPath {
                path: path.to_path_buf(),
            });
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let log = Self { pool };
        log.run_migrations().await?;
        Ok(log)
    }

    /// Create an in-memory log (for testing).
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(":memory:")?;

        // A second connection would see a different database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let log = Self { pool };
        log.run_migrations().await?;
        Ok(log)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS pending_changes (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                change_id TEXT NOT NULL UNIQUE,
                table_name TEXT NOT NULL,
                operation TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn current_timestamp() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0)
    }
}

#[async_trait]
impl ChangeLog for SqliteChangeLog {
    async fn append(&self, change: PendingChange) -> Result<StoredChange, StoreError> {
        let stored = StoredChange::new(change);
        let data = serde_json::to_string(&stored.change.data)?;

        sqlx::query(
            r#"
            INSERT INTO pending_changes (change_id, table_name, operation, data, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(stored.id.to_string())
        .bind(&stored.change.table)
        .bind(stored.change.operation.to_string())
        .bind(data)
        .bind(Self::current_timestamp())
        .execute(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn list(&self) -> Result<Vec<StoredChange>, StoreError> {
        let rows = sqlx::query_as::<_, ChangeRow>(
            r#"
            SELECT change_id, table_name, operation, data
            FROM pending_changes
            ORDER BY seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(StoredChange::try_from).collect()
    }

    async fn remove(&self, id: &ChangeId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM pending_changes WHERE change_id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM pending_changes")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn count(&self) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_changes")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

/// Internal row type for SQLite queries.
#[derive(sqlx::FromRow)]
struct ChangeRow {
    change_id: String,
    table_name: String,
    operation: String,
    data: String,
}

impl TryFrom<ChangeRow> for StoredChange {
    type Error = StoreError;

    fn try_from(row: ChangeRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| StoreError::Corrupt {
            location: format!("pending_changes/{}", row.change_id),
            reason,
        };

        let id = ChangeId::parse(&row.change_id)
            .ok_or_else(|| corrupt("change_id is not a uuid".into()))?;
        let operation: ChangeOperation =
            serde_json::from_value(Value::String(row.operation.clone()))
                .map_err(|e| corrupt(e.to_string()))?;
        let data: Record = serde_json::from_str(&row.data).map_err(|e| corrupt(e.to_string()))?;

        Ok(StoredChange {
            id,
            change: PendingChange::new(row.table_name, operation, data),
        })
    }
}
