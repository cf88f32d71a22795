//! Postgres-backed outbox store.
//!
//! Executes the `postbox-core` command templates over an sqlx pool, binding
//! values in template parameter order. Duplicate-key on store maps to
//! [`StoreOutcome::AlreadyExists`] via SQLSTATE 23505; dispatch row semantics
//! are delegated to the injected [`ConcurrencyControl`] strategy.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::instrument;

use postbox_core::commands::OutboxCommands;
use postbox_core::{ConfigError, Dialect, PersistenceConfig, StorageError, StoreOutcome};

use super::strategy::ConcurrencyControl;
use super::{OutboxRecord, OutboxStorage};
use crate::pg::{is_unique_violation, map_sqlx_error};
use crate::transaction::TransactionScope;

/// Outbox store over a Postgres connection pool.
///
/// The trait methods run each operation in its own connection-owned
/// transaction; the `*_in` variants enlist in an ambient [`TransactionScope`]
/// the caller commits once.
#[derive(Clone)]
pub struct PostgresOutboxStore {
    pool: PgPool,
    commands: Arc<OutboxCommands>,
    strategy: Arc<dyn ConcurrencyControl>,
}

impl PostgresOutboxStore {
    /// Fails fast when the configuration selects a different dialect; this
    /// store only speaks PostgreSql.
    pub fn new(
        pool: PgPool,
        config: &PersistenceConfig,
        strategy: Arc<dyn ConcurrencyControl>,
    ) -> Result<Self, ConfigError> {
        if config.dialect() != Dialect::PostgreSql {
            return Err(ConfigError::DialectMismatch {
                expected: Dialect::PostgreSql,
                actual: config.dialect(),
            });
        }
        Ok(Self {
            pool,
            commands: Arc::new(OutboxCommands::build(config)),
            strategy,
        })
    }

    /// Store inside an ambient transaction scope.
    #[instrument(skip(self, scope, operations), err)]
    pub async fn store_in(
        &self,
        scope: &mut TransactionScope,
        message_id: &str,
        operations: Vec<JsonValue>,
    ) -> Result<StoreOutcome, StorageError> {
        let result = sqlx::query(&self.commands.store().sql)
            .bind(message_id)
            .bind(JsonValue::Array(operations))
            .execute(&mut **scope.tx())
            .await;

        match result {
            Ok(_) => Ok(StoreOutcome::Inserted),
            Err(e) if is_unique_violation(&e) => Ok(StoreOutcome::AlreadyExists),
            Err(e) => Err(map_sqlx_error("outbox_store", e)),
        }
    }

    /// Mark dispatched inside an ambient transaction scope.
    #[instrument(skip(self, scope), err)]
    pub async fn set_as_dispatched_in(
        &self,
        scope: &mut TransactionScope,
        message_id: &str,
    ) -> Result<(), StorageError> {
        let observed = self
            .strategy
            .prepare_dispatch(scope.tx(), message_id)
            .await?;
        if observed.already_dispatched {
            return Ok(());
        }
        self.strategy
            .mark_dispatched(scope.tx(), message_id, observed)
            .await
    }
}

#[async_trait]
impl OutboxStorage for PostgresOutboxStore {
    #[instrument(skip(self, operations), err)]
    async fn store(
        &self,
        message_id: &str,
        operations: Vec<JsonValue>,
    ) -> Result<StoreOutcome, StorageError> {
        let mut scope = TransactionScope::begin(&self.pool).await?;
        let outcome = self.store_in(&mut scope, message_id, operations).await?;
        scope.commit().await?;
        Ok(outcome)
    }

    #[instrument(skip(self), err)]
    async fn set_as_dispatched(&self, message_id: &str) -> Result<(), StorageError> {
        let mut scope = TransactionScope::begin(&self.pool).await?;
        self.set_as_dispatched_in(&mut scope, message_id).await?;
        scope.commit().await
    }

    #[instrument(skip(self), err)]
    async fn try_get(&self, message_id: &str) -> Result<Option<OutboxRecord>, StorageError> {
        let row = sqlx::query(&self.commands.get().sql)
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("outbox_get", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let operations: JsonValue = row
            .try_get("operations")
            .map_err(|e| StorageError::database(format!("read Operations: {e}")))?;
        let operations = match operations {
            JsonValue::Array(items) => items,
            other => {
                return Err(StorageError::Serialization(format!(
                    "outbox Operations column holds a non-array payload: {other}"
                )));
            }
        };

        Ok(Some(OutboxRecord {
            message_id: row
                .try_get("messageid")
                .map_err(|e| StorageError::database(format!("read MessageId: {e}")))?,
            dispatched: row
                .try_get("dispatched")
                .map_err(|e| StorageError::database(format!("read Dispatched: {e}")))?,
            dispatched_at: row
                .try_get("dispatchedat")
                .map_err(|e| StorageError::database(format!("read DispatchedAt: {e}")))?,
            persistence_version: row
                .try_get("persistenceversion")
                .map_err(|e| StorageError::database(format!("read PersistenceVersion: {e}")))?,
            operations,
        }))
    }

    #[instrument(skip(self), err)]
    async fn remove_entries_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let result = sqlx::query(&self.commands.cleanup().sql)
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("outbox_cleanup", e))?;
        Ok(result.rows_affected())
    }
}

impl std::fmt::Debug for PostgresOutboxStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresOutboxStore")
            .field("table", &self.commands.table())
            .finish_non_exhaustive()
    }
}
