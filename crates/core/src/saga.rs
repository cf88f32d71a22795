//! Saga metadata: definitions and correlation properties.

use crate::dialect::TableSuffix;

/// Value type of a correlation property.
///
/// Only string correlation values are supported; the enum is the extension
/// point for richer types.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CorrelationType {
    String,
}

/// The saga field used to look up an in-flight saga instance from an
/// incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationProperty {
    name: String,
    value_type: CorrelationType,
}

impl CorrelationProperty {
    pub fn string(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type: CorrelationType::String,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> CorrelationType {
        self.value_type
    }

    /// Column the property is persisted in.
    pub fn column_name(&self) -> String {
        format!("Correlation_{}", self.name)
    }
}

/// Per-saga-type metadata, computed once at startup and immutable thereafter.
///
/// Drives DDL emission and correlation-based lookup queries. The table suffix
/// is derived from the saga name; Oracle deployments use a truncated alias to
/// fit the engine's identifier cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaDefinition {
    name: String,
    table_suffix: TableSuffix,
    correlation: Option<CorrelationProperty>,
}

/// Oracle saga table aliases keep this many characters of the saga name.
const ORACLE_SAGA_ALIAS_LEN: usize = 5;

impl SagaDefinition {
    pub fn new(name: impl Into<String>, correlation: Option<CorrelationProperty>) -> Self {
        let name = name.into();
        let short: String = name.chars().take(ORACLE_SAGA_ALIAS_LEN).collect();
        Self {
            table_suffix: TableSuffix::aliased(name.clone(), short),
            name,
            correlation,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_suffix(&self) -> &TableSuffix {
        &self.table_suffix
    }

    pub fn correlation(&self) -> Option<&CorrelationProperty> {
        self.correlation.as_ref()
    }
}
