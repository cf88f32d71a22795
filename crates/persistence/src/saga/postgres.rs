//! Postgres-backed saga store.
//!
//! Versioned conditional writes: update bumps `PersistenceVersion` inside the
//! statement, complete deletes under the same guard. A zero-row result is
//! disambiguated with a follow-up read so conflicts and missing rows surface
//! as different errors.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::instrument;
use uuid::Uuid;

use postbox_core::{ConfigError, Dialect, PersistenceConfig, SagaDefinition, StorageError};

use super::info_cache::SagaInfoCache;
use super::{SagaDataRecord, SagaStorage};
use crate::pg::{is_unique_violation, map_sqlx_error};

/// Saga store over a Postgres connection pool.
#[derive(Debug)]
pub struct PostgresSagaStore {
    pool: PgPool,
    cache: SagaInfoCache,
}

impl PostgresSagaStore {
    /// Warms the info cache for every registered saga definition; fails fast
    /// on a dialect mismatch.
    pub fn new(
        pool: PgPool,
        config: &PersistenceConfig,
        definitions: &[SagaDefinition],
    ) -> Result<Self, ConfigError> {
        if config.dialect() != Dialect::PostgreSql {
            return Err(ConfigError::DialectMismatch {
                expected: Dialect::PostgreSql,
                actual: config.dialect(),
            });
        }
        let cache = SagaInfoCache::new();
        cache.warm_up(config, definitions);
        Ok(Self { pool, cache })
    }

    fn record_from_row(row: &PgRow) -> Result<SagaDataRecord, StorageError> {
        Ok(SagaDataRecord {
            id: row
                .try_get("id")
                .map_err(|e| StorageError::database(format!("read Id: {e}")))?,
            data: row
                .try_get("data")
                .map_err(|e| StorageError::database(format!("read Data: {e}")))?,
            // The serialized state blob carries the correlation value; the
            // column exists for lookups, not for reads.
            correlation_value: None,
            version: row
                .try_get("persistenceversion")
                .map_err(|e| StorageError::database(format!("read PersistenceVersion: {e}")))?,
        })
    }

    /// Distinguish "lost the version race" from "row is gone".
    async fn conflict_or_not_found(
        &self,
        saga_type: &str,
        id: Uuid,
        operation: &str,
    ) -> StorageError {
        match self.get(saga_type, id).await {
            Ok(Some(current)) => StorageError::concurrency(format!(
                "{operation} of saga '{saga_type}' {id} lost to a concurrent writer \
                 (current version {})",
                current.version
            )),
            Ok(None) => StorageError::not_found(format!("saga '{saga_type}' {id}")),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl SagaStorage for PostgresSagaStore {
    #[instrument(skip(self, record), fields(id = %record.id), err)]
    async fn create(&self, saga_type: &str, record: SagaDataRecord) -> Result<(), StorageError> {
        let info = self.cache.get(saga_type)?;

        let mut query = sqlx::query(&info.commands.insert().sql)
            .bind(record.id)
            .bind(&record.data);
        if info.definition.correlation().is_some() {
            query = query.bind(&record.correlation_value);
        }

        query.execute(&self.pool).await.map_err(|e| {
            if is_unique_violation(&e) {
                StorageError::concurrency(format!(
                    "saga '{saga_type}' {} was created concurrently",
                    record.id
                ))
            } else {
                map_sqlx_error("saga_create", e)
            }
        })?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get(&self, saga_type: &str, id: Uuid) -> Result<Option<SagaDataRecord>, StorageError> {
        let info = self.cache.get(saga_type)?;

        let row = sqlx::query(&info.commands.get_by_id().sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("saga_get", e))?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    #[instrument(skip(self, value), err)]
    async fn get_by_correlation(
        &self,
        saga_type: &str,
        value: &str,
    ) -> Result<Option<SagaDataRecord>, StorageError> {
        let info = self.cache.get(saga_type)?;
        let template = info.commands.get_by_correlation()?;

        let row = sqlx::query(&template.sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("saga_get_by_correlation", e))?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    #[instrument(skip(self, data), err)]
    async fn update(
        &self,
        saga_type: &str,
        id: Uuid,
        data: JsonValue,
        expected_version: i32,
    ) -> Result<(), StorageError> {
        let info = self.cache.get(saga_type)?;

        let result = sqlx::query(&info.commands.update().sql)
            .bind(&data)
            .bind(id)
            .bind(expected_version)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("saga_update", e))?;

        if result.rows_affected() == 0 {
            return Err(self.conflict_or_not_found(saga_type, id, "update").await);
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn complete(
        &self,
        saga_type: &str,
        id: Uuid,
        expected_version: i32,
    ) -> Result<(), StorageError> {
        let info = self.cache.get(saga_type)?;

        let result = sqlx::query(&info.commands.complete().sql)
            .bind(id)
            .bind(expected_version)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("saga_complete", e))?;

        if result.rows_affected() == 0 {
            return Err(self.conflict_or_not_found(saga_type, id, "complete").await);
        }
        Ok(())
    }
}
