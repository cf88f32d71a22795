//! In-memory outbox store for tests and dev.
//!
//! Implements the same semantics as the Postgres store: idempotent store,
//! at-most-one dispatch transition, cleanup that never touches undispatched
//! work. The interior lock serializes mutations the way the database engine
//! does for the SQL path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::RwLock;

use postbox_core::{StorageError, StoreOutcome};

use super::{OutboxRecord, OutboxStorage};

#[derive(Debug, Default)]
pub struct InMemoryOutboxStore {
    records: RwLock<HashMap<String, OutboxRecord>>,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OutboxStorage for InMemoryOutboxStore {
    async fn store(
        &self,
        message_id: &str,
        operations: Vec<JsonValue>,
    ) -> Result<StoreOutcome, StorageError> {
        let mut records = self.records.write().unwrap();
        if records.contains_key(message_id) {
            return Ok(StoreOutcome::AlreadyExists);
        }
        records.insert(
            message_id.to_string(),
            OutboxRecord::pending(message_id, operations),
        );
        Ok(StoreOutcome::Inserted)
    }

    async fn set_as_dispatched(&self, message_id: &str) -> Result<(), StorageError> {
        let mut records = self.records.write().unwrap();
        let record = records
            .get_mut(message_id)
            .ok_or_else(|| StorageError::not_found(format!("outbox record '{message_id}'")))?;

        if record.dispatched {
            return Ok(());
        }
        record.dispatched = true;
        record.dispatched_at = Some(Utc::now());
        record.persistence_version += 1;
        record.operations.clear();
        Ok(())
    }

    async fn try_get(&self, message_id: &str) -> Result<Option<OutboxRecord>, StorageError> {
        let records = self.records.read().unwrap();
        Ok(records.get(message_id).cloned())
    }

    async fn remove_entries_older_than(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StorageError> {
        let mut records = self.records.write().unwrap();
        let before = records.len();
        records.retain(|_, r| !(r.dispatched && r.dispatched_at.is_some_and(|at| at < cutoff)));
        Ok((before - records.len()) as u64)
    }
}
