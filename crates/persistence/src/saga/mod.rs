//! Saga persistence: versioned create/read/update/complete with optimistic
//! concurrency throughout.
//!
//! Every saga type is registered at warm-up; the info cache resolves its
//! table, correlation column and serializer pair once and serves concurrent
//! reads for the process lifetime. Conflicts are reported distinctly from
//! "not found" so callers can re-read and retry business logic instead of
//! silently overwriting.

pub mod in_memory;
pub mod info_cache;
pub mod postgres;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use uuid::Uuid;

use postbox_core::StorageError;

pub use in_memory::InMemorySagaStore;
pub use postgres::PostgresSagaStore;

/// One saga row: identity, serialized state and the concurrency version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaDataRecord {
    pub id: Uuid,
    pub data: JsonValue,
    /// Value of the correlation property, when the saga type has one.
    pub correlation_value: Option<String>,
    /// Strictly increases on every successful update.
    pub version: i32,
}

impl SagaDataRecord {
    /// A fresh record at version 0.
    pub fn new(id: Uuid, data: JsonValue, correlation_value: Option<String>) -> Self {
        Self {
            id,
            data,
            correlation_value,
            version: 0,
        }
    }
}

/// Durable saga store.
#[async_trait]
pub trait SagaStorage: Send + Sync {
    /// Insert a new saga instance at version 0. A concurrent create of the
    /// same instance is a concurrency conflict — the caller re-reads the
    /// winner's row.
    async fn create(&self, saga_type: &str, record: SagaDataRecord) -> Result<(), StorageError>;

    /// Unlocked single-row read; `None` when the instance does not exist.
    async fn get(&self, saga_type: &str, id: Uuid) -> Result<Option<SagaDataRecord>, StorageError>;

    /// Look up by the configured correlation property value.
    ///
    /// A saga type without a correlation property yields a configuration
    /// error, never a query-time failure.
    async fn get_by_correlation(
        &self,
        saga_type: &str,
        value: &str,
    ) -> Result<Option<SagaDataRecord>, StorageError>;

    /// Conditional update guarded by `expected_version`, bumping the stored
    /// version by one. Zero rows affected on an existing row signals a
    /// concurrency conflict.
    async fn update(
        &self,
        saga_type: &str,
        id: Uuid,
        data: JsonValue,
        expected_version: i32,
    ) -> Result<(), StorageError>;

    /// Conditional delete under the same version guard.
    async fn complete(
        &self,
        saga_type: &str,
        id: Uuid,
        expected_version: i32,
    ) -> Result<(), StorageError>;
}

#[async_trait]
impl<S> SagaStorage for Arc<S>
where
    S: SagaStorage + ?Sized,
{
    async fn create(&self, saga_type: &str, record: SagaDataRecord) -> Result<(), StorageError> {
        (**self).create(saga_type, record).await
    }

    async fn get(&self, saga_type: &str, id: Uuid) -> Result<Option<SagaDataRecord>, StorageError> {
        (**self).get(saga_type, id).await
    }

    async fn get_by_correlation(
        &self,
        saga_type: &str,
        value: &str,
    ) -> Result<Option<SagaDataRecord>, StorageError> {
        (**self).get_by_correlation(saga_type, value).await
    }

    async fn update(
        &self,
        saga_type: &str,
        id: Uuid,
        data: JsonValue,
        expected_version: i32,
    ) -> Result<(), StorageError> {
        (**self).update(saga_type, id, data, expected_version).await
    }

    async fn complete(
        &self,
        saga_type: &str,
        id: Uuid,
        expected_version: i32,
    ) -> Result<(), StorageError> {
        (**self).complete(saga_type, id, expected_version).await
    }
}
