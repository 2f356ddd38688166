//! Wiring of the client stack for one CLI invocation.

use anyhow::{Context, Result};
use bastion_sync_client::{
    open_change_log, schemas, BackendProbe, ChangeLog, Config, ConnectionManager, DataSource,
    DataSyncService, SubmissionResource,
};
use std::sync::Arc;

/// Change log as opened from configuration.
pub type Log = Box<dyn ChangeLog>;

/// Resource type used by every command.
pub type Resource = SubmissionResource<Log, DataSource>;

/// Connection manager, sync service and data source for this process.
pub struct App {
    sync: DataSyncService<Log, DataSource>,
    source: &'static str,
}

/// Outcome of [`App::flush`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushSummary {
    /// Whether the backend was reachable at the end.
    pub connected: bool,
    /// Changes applied during the flush.
    pub applied: usize,
    /// Changes still pending.
    pub remaining: usize,
}

impl App {
    /// Build the stack described by `config`.
    pub async fn open(config: &Config) -> Result<Self> {
        let backend = Arc::new(
            DataSource::from_config(&config.backend).context("Failed to set up backend")?,
        );
        let connection = ConnectionManager::new(
            Arc::new(BackendProbe::new(backend.clone())),
            config.connection.retry_policy(),
            config.connection.start_connected,
        );
        let log = open_change_log(&config.store)
            .await
            .with_context(|| format!("Failed to open change log in {}", config.store.path.display()))?;

        Ok(Self {
            source: backend.name(),
            sync: DataSyncService::new(log, backend, connection),
        })
    }

    /// The write path.
    pub fn sync(&self) -> &DataSyncService<Log, DataSource> {
        &self.sync
    }

    /// `live` or `mock`.
    pub fn source_name(&self) -> &'static str {
        self.source
    }

    /// The resource for `entity`.
    pub fn resource(&self, entity: &str) -> Result<Resource> {
        let schema = schemas::by_entity(entity).with_context(|| {
            let known: Vec<_> = schemas::all().iter().map(|s| s.entity).collect();
            format!("Unknown entity '{}' (expected one of: {})", entity, known.join(", "))
        })?;
        Ok(SubmissionResource::new(schema, self.sync.clone()))
    }

    /// Probe the backend and, if it answers, replay the change log.
    pub async fn flush(&self) -> Result<FlushSummary> {
        let before = self.sync.pending_count().await?;
        let connection = self.sync.connection();

        if connection.probe_now().await {
            if let Err(e) = self.sync.sync_pending_changes().await {
                if !e.is_connectivity() {
                    return Err(e.into());
                }
                tracing::warn!("Flush interrupted: {}", e);
            }
        }

        let remaining = self.sync.pending_count().await?;
        Ok(FlushSummary {
            connected: connection.is_connected(),
            applied: before.saturating_sub(remaining),
            remaining,
        })
    }
}

/// Config for a mock-backed app whose change log lives in `dir`.
#[cfg(test)]
pub fn mock_config(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.backend.source = bastion_sync_client::SourceKind::Mock;
    config.store.kind = bastion_sync_client::StoreKind::File;
    config.store.path = dir.to_path_buf();
    config
}

/// A mock-backed app whose change log lives in `dir`.
#[cfg(test)]
pub async fn mock_app(dir: &std::path::Path) -> App {
    App::open(&mock_config(dir)).await.unwrap()
}
