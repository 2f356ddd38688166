//! Data source selection.
//!
//! The live backend and the sample-data mock sit behind one [`Backend`]
//! so the choice is made once at startup and nowhere else.

use crate::backend::{Backend, Filter, MockBackend, RestBackend};
use crate::config::{BackendConfig, SourceKind};
use crate::mock_data;
use async_trait::async_trait;
use bastion_sync_types::{BackendError, Record, RecordId};

/// The backend the application talks to.
#[derive(Debug, Clone)]
pub enum DataSource<B = RestBackend> {
    /// The real service.
    Live(B),
    /// In-memory sample data.
    Mock(MockBackend),
}

impl DataSource<RestBackend> {
    /// Build the source described by `config`. Mock sources start with the
    /// sample data from [`mock_data`].
    pub fn from_config(config: &BackendConfig) -> Result<Self, BackendError> {
        let source = match config.source {
            SourceKind::Live => DataSource::Live(RestBackend::new(config.rest_config())?),
            SourceKind::Mock => DataSource::Mock(mock_data::seeded()),
        };
        tracing::info!(source = source.name(), "data source selected");
        Ok(source)
    }
}

impl<B> DataSource<B> {
    /// Short name for logs and status output.
    pub fn name(&self) -> &'static str {
        match self {
            DataSource::Live(_) => "live",
            DataSource::Mock(_) => "mock",
        }
    }

    /// Whether this is the sample-data source.
    pub fn is_mock(&self) -> bool {
        matches!(self, DataSource::Mock(_))
    }
}

#[async_trait]
impl<B: Backend> Backend for DataSource<B> {
    async fn insert(&self, table: &str, record: Record) -> Result<Record, BackendError> {
        match self {
            DataSource::Live(b) => b.insert(table, record).await,
            DataSource::Mock(m) => m.insert(table, record).await,
        }
    }

    async fn update(
        &self,
        table: &str,
        id: &RecordId,
        fields: Record,
    ) -> Result<Record, BackendError> {
        match self {
            DataSource::Live(b) => b.update(table, id, fields).await,
            DataSource::Mock(m) => m.update(table, id, fields).await,
        }
    }

    async fn delete(&self, table: &str, id: &RecordId) -> Result<(), BackendError> {
        match self {
            DataSource::Live(b) => b.delete(table, id).await,
            DataSource::Mock(m) => m.delete(table, id).await,
        }
    }

    async fn select(&self, table: &str, filters: &[Filter]) -> Result<Vec<Record>, BackendError> {
        match self {
            DataSource::Live(b) => b.select(table, filters).await,
            DataSource::Mock(m) => m.select(table, filters).await,
        }
    }

    async fn ping(&self) -> Result<(), BackendError> {
        match self {
            DataSource::Live(b) => b.ping().await,
            DataSource::Mock(m) => m.ping().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_config_gives_seeded_mock() {
        let config = BackendConfig {
            source: SourceKind::Mock,
            ..BackendConfig::default()
        };
        let source = DataSource::from_config(&config).unwrap();
        assert!(source.is_mock());
        assert_eq!(source.name(), "mock");

        let events = source.select("events", &[]).await.unwrap();
        assert!(!events.is_empty());
        source.ping().await.unwrap();
    }

    #[test]
    fn live_config_gives_rest_backend() {
        let config = BackendConfig {
            source: SourceKind::Live,
            url: "https://project.example.co".into(),
            ..BackendConfig::default()
        };
        let source = DataSource::from_config(&config).unwrap();
        assert!(!source.is_mock());
        assert!(matches!(&source, DataSource::Live(rest) if rest.base_url() == "https://project.example.co"));
    }

    #[tokio::test]
    async fn delegates_to_wrapped_backend() {
        let inner = MockBackend::new();
        let source: DataSource<MockBackend> = DataSource::Live(inner.clone());

        source.insert("events", Record::new()).await.unwrap();
        assert_eq!(inner.rows("events").len(), 1);
        assert_eq!(source.name(), "live");
    }
}
