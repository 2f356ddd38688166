//! # sync-client
//!
//! Connectivity-aware write queue for the Bastion site and back-office.
//!
//! Applications construct one [`ConnectionManager`] and one
//! [`DataSyncService`] at startup and pass them to the submission
//! resources. Writes are recorded in a durable [`ChangeLog`] before any
//! network call, and replayed oldest first whenever the backend is
//! reachable.
//!
//! ## Features
//!
//! - **Deferred operations**: FIFO queue drained on reconnect
//! - **Bounded reconnection**: one retry timer, exponential backoff
//! - **Durable change log**: key-value (memory, JSON file) or SQLite
//! - **Backend abstraction**: REST service or seeded in-memory mock
//! - **Pure state machine**: uses sync-core for side-effect-free logic
//!
//! ## Example
//!
//! ```ignore
//! use bastion_sync_client::*;
//!
//! let config = Config::from_file(Path::new("bastion.toml"))?;
//! let backend = Arc::new(DataSource::from_config(&config.backend)?);
//! let manager = ConnectionManager::new(
//!     Arc::new(BackendProbe::new(backend.clone())),
//!     config.connection.retry_policy(),
//!     config.connection.start_connected,
//! );
//! let log = open_change_log(&config.store).await?;
//! let sync = DataSyncService::new(log, backend, manager);
//!
//! let events = SubmissionResource::new(schemas::events(), sync.clone());
//! events.submit(fields).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod config;
pub mod connection;
pub mod mock_data;
pub mod resource;
pub mod source;
pub mod store;
pub mod sync;

pub use backend::{
    kind_for_status, Backend, BackendProbe, Filter, HealthProbe, MockBackend, MockCall,
    RestBackend, RestConfig,
};
pub use config::{
    BackendConfig, Config, ConfigError, ConnectionConfig, LoggingConfig, SourceKind, StoreConfig,
    StoreKind,
};
pub use connection::{ConnectionManager, ListenerId, Operation};
pub use resource::{ResourceError, SubmissionResource};
pub use source::DataSource;
pub use store::{
    open_change_log, ChangeLog, FileStore, KeyValueStore, KvChangeLog, MemoryStore,
    SqliteChangeLog, StoreError, PENDING_CHANGES_KEY,
};
pub use sync::{DataSyncService, SyncError, SyncReport};

pub use bastion_sync_core::schemas;
