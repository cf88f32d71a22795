//! In-memory saga store for tests and dev.
//!
//! Shares the info cache with the Postgres path, so correlation
//! configuration errors and the serializer pair behave identically; rows are
//! held as encoded text and round-trip through the saga type's serializers.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use postbox_core::{PersistenceConfig, SagaDefinition, StorageError};

use super::info_cache::SagaInfoCache;
use super::{SagaDataRecord, SagaStorage};

#[derive(Debug, Clone)]
struct StoredRow {
    encoded: String,
    correlation_value: Option<String>,
    version: i32,
}

#[derive(Debug)]
pub struct InMemorySagaStore {
    cache: SagaInfoCache,
    tables: RwLock<HashMap<String, HashMap<Uuid, StoredRow>>>,
}

impl InMemorySagaStore {
    pub fn new(config: &PersistenceConfig, definitions: &[SagaDefinition]) -> Self {
        let cache = SagaInfoCache::new();
        cache.warm_up(config, definitions);
        Self {
            cache,
            tables: RwLock::new(HashMap::new()),
        }
    }

    fn record(
        &self,
        saga_type: &str,
        id: Uuid,
        row: &StoredRow,
    ) -> Result<SagaDataRecord, StorageError> {
        let info = self.cache.get(saga_type)?;
        Ok(SagaDataRecord {
            id,
            data: (info.decode)(&row.encoded)?,
            correlation_value: row.correlation_value.clone(),
            version: row.version,
        })
    }
}

#[async_trait]
impl SagaStorage for InMemorySagaStore {
    async fn create(&self, saga_type: &str, record: SagaDataRecord) -> Result<(), StorageError> {
        let info = self.cache.get(saga_type)?;
        let encoded = (info.encode)(&record.data)?;

        let mut tables = self.tables.write().unwrap();
        let rows = tables.entry(saga_type.to_string()).or_default();
        if rows.contains_key(&record.id) {
            return Err(StorageError::concurrency(format!(
                "saga '{saga_type}' {} was created concurrently",
                record.id
            )));
        }
        rows.insert(
            record.id,
            StoredRow {
                encoded,
                correlation_value: record.correlation_value,
                version: 0,
            },
        );
        Ok(())
    }

    async fn get(&self, saga_type: &str, id: Uuid) -> Result<Option<SagaDataRecord>, StorageError> {
        // Resolve metadata even on a miss so unknown saga types fail loudly.
        self.cache.get(saga_type)?;
        let tables = self.tables.read().unwrap();
        tables
            .get(saga_type)
            .and_then(|rows| rows.get(&id))
            .map(|row| self.record(saga_type, id, row))
            .transpose()
    }

    async fn get_by_correlation(
        &self,
        saga_type: &str,
        value: &str,
    ) -> Result<Option<SagaDataRecord>, StorageError> {
        let info = self.cache.get(saga_type)?;
        // Same taxonomy as the SQL path: no correlation property configured
        // is a configuration error.
        info.commands.get_by_correlation()?;

        let tables = self.tables.read().unwrap();
        let Some(rows) = tables.get(saga_type) else {
            return Ok(None);
        };
        rows.iter()
            .find(|(_, row)| row.correlation_value.as_deref() == Some(value))
            .map(|(id, row)| self.record(saga_type, *id, row))
            .transpose()
    }

    async fn update(
        &self,
        saga_type: &str,
        id: Uuid,
        data: JsonValue,
        expected_version: i32,
    ) -> Result<(), StorageError> {
        let info = self.cache.get(saga_type)?;
        let encoded = (info.encode)(&data)?;

        let mut tables = self.tables.write().unwrap();
        let row = tables
            .get_mut(saga_type)
            .and_then(|rows| rows.get_mut(&id))
            .ok_or_else(|| StorageError::not_found(format!("saga '{saga_type}' {id}")))?;

        if row.version != expected_version {
            return Err(StorageError::concurrency(format!(
                "update of saga '{saga_type}' {id} lost to a concurrent writer \
                 (current version {})",
                row.version
            )));
        }
        row.encoded = encoded;
        row.version += 1;
        Ok(())
    }

    async fn complete(
        &self,
        saga_type: &str,
        id: Uuid,
        expected_version: i32,
    ) -> Result<(), StorageError> {
        self.cache.get(saga_type)?;

        let mut tables = self.tables.write().unwrap();
        let rows = tables
            .get_mut(saga_type)
            .ok_or_else(|| StorageError::not_found(format!("saga '{saga_type}' {id}")))?;
        let row = rows
            .get(&id)
            .ok_or_else(|| StorageError::not_found(format!("saga '{saga_type}' {id}")))?;

        if row.version != expected_version {
            return Err(StorageError::concurrency(format!(
                "complete of saga '{saga_type}' {id} lost to a concurrent writer \
                 (current version {})",
                row.version
            )));
        }
        rows.remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postbox_core::{ConfigError, CorrelationProperty, Dialect};
    use serde_json::json;

    const SAGA: &str = "OrderPolicy";

    fn store() -> InMemorySagaStore {
        let config = PersistenceConfig::new(Dialect::PostgreSql, "Sales").unwrap();
        InMemorySagaStore::new(
            &config,
            &[
                SagaDefinition::new(SAGA, Some(CorrelationProperty::string("OrderNumber"))),
                SagaDefinition::new("UncorrelatedPolicy", None),
            ],
        )
    }

    #[tokio::test]
    async fn create_then_get_returns_version_zero() {
        let store = store();
        let id = Uuid::now_v7();
        store
            .create(
                SAGA,
                SagaDataRecord::new(id, json!({"step": "started"}), Some("42".into())),
            )
            .await
            .unwrap();

        let record = store.get(SAGA, id).await.unwrap().unwrap();
        assert_eq!(record.version, 0);
        assert_eq!(record.data, json!({"step": "started"}));
    }

    #[tokio::test]
    async fn concurrent_create_conflicts() {
        let store = store();
        let id = Uuid::now_v7();
        let record = SagaDataRecord::new(id, json!({}), Some("42".into()));
        store.create(SAGA, record.clone()).await.unwrap();

        assert!(matches!(
            store.create(SAGA, record).await,
            Err(StorageError::Concurrency(_))
        ));
    }

    #[tokio::test]
    async fn same_expected_version_yields_one_winner() {
        let store = store();
        let id = Uuid::now_v7();
        store
            .create(SAGA, SagaDataRecord::new(id, json!({"n": 0}), None))
            .await
            .unwrap();

        store.update(SAGA, id, json!({"n": 1}), 0).await.unwrap();
        let lost = store.update(SAGA, id, json!({"n": 2}), 0).await;
        assert!(matches!(lost, Err(StorageError::Concurrency(_))));

        // The losing caller's re-read shows the winner's state.
        let record = store.get(SAGA, id).await.unwrap().unwrap();
        assert_eq!(record.data, json!({"n": 1}));
        assert_eq!(record.version, 1);
    }

    #[tokio::test]
    async fn update_of_missing_saga_is_not_found() {
        let store = store();
        assert!(matches!(
            store.update(SAGA, Uuid::now_v7(), json!({}), 0).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn complete_under_stale_version_conflicts() {
        let store = store();
        let id = Uuid::now_v7();
        store
            .create(SAGA, SagaDataRecord::new(id, json!({}), None))
            .await
            .unwrap();
        store.update(SAGA, id, json!({"n": 1}), 0).await.unwrap();

        assert!(matches!(
            store.complete(SAGA, id, 0).await,
            Err(StorageError::Concurrency(_))
        ));

        store.complete(SAGA, id, 1).await.unwrap();
        assert!(store.get(SAGA, id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn correlation_lookup_finds_the_instance() {
        let store = store();
        let id = Uuid::now_v7();
        store
            .create(
                SAGA,
                SagaDataRecord::new(id, json!({"step": "started"}), Some("PO-7".into())),
            )
            .await
            .unwrap();

        let found = store.get_by_correlation(SAGA, "PO-7").await.unwrap().unwrap();
        assert_eq!(found.id, id);
        assert!(store.get_by_correlation(SAGA, "PO-8").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn correlation_lookup_without_property_is_a_config_error() {
        let store = store();
        let err = store
            .get_by_correlation("UncorrelatedPolicy", "PO-7")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::Config(ConfigError::NoCorrelationProperty { .. })
        ));
    }

    #[tokio::test]
    async fn unknown_saga_type_fails_loudly() {
        let store = store();
        assert!(matches!(
            store.get("GhostPolicy", Uuid::now_v7()).await,
            Err(StorageError::Config(ConfigError::UnknownSagaType { .. }))
        ));
    }
}
