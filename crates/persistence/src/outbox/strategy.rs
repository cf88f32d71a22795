//! Concurrency control strategies for outbox dispatch.
//!
//! Selected once at configuration time and injected at the persister's
//! construction; no flag threads through the call stack. Both strategies are
//! built from the same dialect/command-builder pair, so swapping one for the
//! other touches no builder.
//!
//! - [`PessimisticDispatch`] locks the row before reading the dispatched
//!   flag and holds the lock for the surrounding transaction. No two
//!   transactions can concurrently believe the same message is undispatched.
//!   Costs throughput under contention.
//! - [`OptimisticDispatch`] reads without locking and marks with a
//!   version-guarded update. Zero rows affected means a concurrent dispatch
//!   won; the losing attempt is a safe no-op, with `MessageId` uniqueness —
//!   not locks — preventing duplicate delivery.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Postgres, Row, Transaction};
use std::sync::Arc;
use tracing::debug;

use postbox_core::commands::OutboxCommands;
use postbox_core::{PersistenceConfig, StorageError};

use crate::pg::map_sqlx_error;

/// What `prepare_dispatch` observed about the record, inside the current
/// transaction.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DispatchState {
    pub already_dispatched: bool,
    pub observed_version: i32,
}

/// Policy governing how the dispatch transition is read, protected and
/// written.
#[async_trait]
pub trait ConcurrencyControl: Send + Sync {
    /// Read the record's dispatch state inside `tx`, acquiring whatever
    /// protection the policy requires.
    async fn prepare_dispatch(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        message_id: &str,
    ) -> Result<DispatchState, StorageError>;

    /// Perform the false → true transition for a record `prepare_dispatch`
    /// observed as undispatched.
    async fn mark_dispatched(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        message_id: &str,
        observed: DispatchState,
    ) -> Result<(), StorageError>;
}

/// Row-locking strategy: strict serialization of dispatch.
#[derive(Debug, Clone)]
pub struct PessimisticDispatch {
    commands: Arc<OutboxCommands>,
}

impl PessimisticDispatch {
    pub fn new(config: &PersistenceConfig) -> Self {
        Self {
            commands: Arc::new(OutboxCommands::build(config)),
        }
    }
}

#[async_trait]
impl ConcurrencyControl for PessimisticDispatch {
    async fn prepare_dispatch(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        message_id: &str,
    ) -> Result<DispatchState, StorageError> {
        let row = sqlx::query(&self.commands.get_for_update().sql)
            .bind(message_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("outbox_lock", e))?
            .ok_or_else(|| StorageError::not_found(format!("outbox record '{message_id}'")))?;

        Ok(DispatchState {
            already_dispatched: row
                .try_get("dispatched")
                .map_err(|e| StorageError::database(format!("read Dispatched: {e}")))?,
            observed_version: row
                .try_get("persistenceversion")
                .map_err(|e| StorageError::database(format!("read PersistenceVersion: {e}")))?,
        })
    }

    async fn mark_dispatched(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        message_id: &str,
        _observed: DispatchState,
    ) -> Result<(), StorageError> {
        // The lock from prepare_dispatch is still held; an unconditional
        // update is safe.
        sqlx::query(&self.commands.mark_dispatched().sql)
            .bind(Utc::now())
            .bind(message_id)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("outbox_mark_dispatched", e))?;
        Ok(())
    }
}

/// Version-guarded strategy: first committer wins, the loser no-ops.
#[derive(Debug, Clone)]
pub struct OptimisticDispatch {
    commands: Arc<OutboxCommands>,
}

impl OptimisticDispatch {
    pub fn new(config: &PersistenceConfig) -> Self {
        Self {
            commands: Arc::new(OutboxCommands::build(config)),
        }
    }
}

#[async_trait]
impl ConcurrencyControl for OptimisticDispatch {
    async fn prepare_dispatch(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        message_id: &str,
    ) -> Result<DispatchState, StorageError> {
        let row = sqlx::query(&self.commands.get().sql)
            .bind(message_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("outbox_read", e))?
            .ok_or_else(|| StorageError::not_found(format!("outbox record '{message_id}'")))?;

        Ok(DispatchState {
            already_dispatched: row
                .try_get("dispatched")
                .map_err(|e| StorageError::database(format!("read Dispatched: {e}")))?,
            observed_version: row
                .try_get("persistenceversion")
                .map_err(|e| StorageError::database(format!("read PersistenceVersion: {e}")))?,
        })
    }

    async fn mark_dispatched(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        message_id: &str,
        observed: DispatchState,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(&self.commands.mark_dispatched_versioned().sql)
            .bind(Utc::now())
            .bind(message_id)
            .bind(observed.observed_version)
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_error("outbox_mark_dispatched", e))?;

        if result.rows_affected() == 0 {
            // A concurrent dispatcher won the version race. This attempt is
            // redundant; MessageId uniqueness already guarantees the side
            // effects went out exactly once.
            debug!(message_id, "outbox record dispatched concurrently");
        }
        Ok(())
    }
}
