//! Outbox persistence: durable log of pending side-effect operations with
//! deduplicated, at-least-once dispatch.
//!
//! A record is created when a message handler requests durable deferred side
//! effects, mutated only by the dispatch step, and deleted by time-bounded
//! cleanup of dispatched records. `MessageId` uniqueness is what prevents
//! duplicate delivery; the concurrency control strategy decides how the
//! false → true dispatch transition is protected.

pub mod in_memory;
pub mod postgres;
pub mod strategy;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::sync::Arc;

use postbox_core::{StorageError, StoreOutcome};

pub use in_memory::InMemoryOutboxStore;
pub use postgres::PostgresOutboxStore;

/// One outbox row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboxRecord {
    /// Globally unique natural key.
    pub message_id: String,
    /// Transitions false → true exactly once; never back.
    pub dispatched: bool,
    pub dispatched_at: Option<DateTime<Utc>>,
    /// Optimistic token; bumped by the dispatch transition.
    pub persistence_version: i32,
    /// Ordered pending operations, cleared on dispatch.
    pub operations: Vec<JsonValue>,
}

impl OutboxRecord {
    /// A fresh, undispatched record.
    pub fn pending(message_id: impl Into<String>, operations: Vec<JsonValue>) -> Self {
        Self {
            message_id: message_id.into(),
            dispatched: false,
            dispatched_at: None,
            persistence_version: 0,
            operations,
        }
    }
}

/// Durable outbox store.
///
/// Implementations must keep `store` idempotent (duplicate natural key is
/// success, not an error), make the dispatch transition happen at most once
/// under concurrency, and never let cleanup touch undispatched work.
#[async_trait]
pub trait OutboxStorage: Send + Sync {
    /// Insert a new record with `dispatched = false`.
    ///
    /// Both of two concurrent callers storing the same `message_id` observe
    /// success; exactly one row exists afterwards.
    async fn store(
        &self,
        message_id: &str,
        operations: Vec<JsonValue>,
    ) -> Result<StoreOutcome, StorageError>;

    /// Mark the record dispatched via the active concurrency control
    /// strategy. Succeeds even if the record was already marked.
    async fn set_as_dispatched(&self, message_id: &str) -> Result<(), StorageError>;

    /// `None` when no record exists — distinct from "found but dispatched".
    async fn try_get(&self, message_id: &str) -> Result<Option<OutboxRecord>, StorageError>;

    /// Delete dispatched records older than `cutoff`; returns the number of
    /// rows removed.
    async fn remove_entries_older_than(&self, cutoff: DateTime<Utc>)
    -> Result<u64, StorageError>;
}

#[async_trait]
impl<S> OutboxStorage for Arc<S>
where
    S: OutboxStorage + ?Sized,
{
    async fn store(
        &self,
        message_id: &str,
        operations: Vec<JsonValue>,
    ) -> Result<StoreOutcome, StorageError> {
        (**self).store(message_id, operations).await
    }

    async fn set_as_dispatched(&self, message_id: &str) -> Result<(), StorageError> {
        (**self).set_as_dispatched(message_id).await
    }

    async fn try_get(&self, message_id: &str) -> Result<Option<OutboxRecord>, StorageError> {
        (**self).try_get(message_id).await
    }

    async fn remove_entries_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        (**self).remove_entries_older_than(cutoff).await
    }
}
