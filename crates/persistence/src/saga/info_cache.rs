//! Per-saga-type metadata cache.
//!
//! Populated once at warm-up from the registered saga definitions; read
//! concurrently without further writes for the process lifetime. This is the
//! only cross-call shared mutable state in the layer.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value as JsonValue;

use postbox_core::commands::SagaCommands;
use postbox_core::{ConfigError, PersistenceConfig, SagaDefinition, StorageError};

/// Resolved metadata for one saga type: definition, command templates and
/// the serializer pair (state → text, text → state).
pub struct SagaInfo {
    pub definition: SagaDefinition,
    pub commands: SagaCommands,
    pub encode: fn(&JsonValue) -> Result<String, StorageError>,
    pub decode: fn(&str) -> Result<JsonValue, StorageError>,
}

fn encode_json(value: &JsonValue) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|e| StorageError::Serialization(e.to_string()))
}

fn decode_json(text: &str) -> Result<JsonValue, StorageError> {
    serde_json::from_str(text).map_err(|e| StorageError::Serialization(e.to_string()))
}

#[derive(Default)]
pub struct SagaInfoCache {
    inner: RwLock<HashMap<String, Arc<SagaInfo>>>,
}

impl SagaInfoCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve and cache metadata for every registered saga type.
    ///
    /// Runs once at startup; after warm-up the cache is read-only.
    pub fn warm_up(&self, config: &PersistenceConfig, definitions: &[SagaDefinition]) {
        let mut inner = self.inner.write().unwrap();
        for definition in definitions {
            inner.insert(
                definition.name().to_string(),
                Arc::new(SagaInfo {
                    commands: SagaCommands::build(config, definition),
                    definition: definition.clone(),
                    encode: encode_json,
                    decode: decode_json,
                }),
            );
        }
    }

    /// Metadata for a saga type; unknown types are a configuration error.
    pub fn get(&self, saga_type: &str) -> Result<Arc<SagaInfo>, ConfigError> {
        self.inner
            .read()
            .unwrap()
            .get(saga_type)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownSagaType {
                saga: saga_type.to_string(),
            })
    }
}

impl std::fmt::Debug for SagaInfoCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read().unwrap();
        f.debug_struct("SagaInfoCache")
            .field("saga_types", &inner.keys().collect::<Vec<_>>())
            .finish()
    }
}
