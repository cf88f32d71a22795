//! Error taxonomy for the persistence layer.
//!
//! Configuration problems fail fast at startup and never surface at query
//! time. Duplicate keys on store/subscribe are not errors at all — they
//! resolve to [`StoreOutcome::AlreadyExists`]. Concurrency conflicts are
//! reported distinctly from "not found" so callers can choose a retry policy.

use thiserror::Error;

/// Startup-time configuration error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Table prefix exceeds the engine's identifier budget.
    #[error(
        "table prefix '{prefix}' contains more than {max} characters, which is not supported \
         by SQL persistence using {dialect}; shorten the endpoint name or configure a shorter \
         table prefix"
    )]
    PrefixTooLong {
        prefix: String,
        max: usize,
        dialect: crate::Dialect,
    },

    /// Table prefix contains non-ASCII characters.
    #[error(
        "table prefix '{prefix}' contains non-ASCII characters, which is not supported by SQL \
         persistence using {dialect}; change the endpoint name or configure an ASCII table prefix"
    )]
    PrefixNotAscii {
        prefix: String,
        dialect: crate::Dialect,
    },

    /// A lookup by correlation property was requested for a saga type that
    /// has none configured.
    #[error("saga '{saga}' has no configured correlation property")]
    NoCorrelationProperty { saga: String },

    /// A correlation property uses a value type the mapping layer does not
    /// support. Only string correlation values are mapped today.
    #[error("correlation property '{property}' on saga '{saga}' has an unmapped value type")]
    UnmappedCorrelationType { saga: String, property: String },

    /// A saga type was addressed that was never registered at warm-up.
    #[error("saga '{saga}' is not registered; register every saga definition at startup")]
    UnknownSagaType { saga: String },

    /// A store built for one dialect was handed a configuration for another.
    #[error("store supports the {expected} dialect but the configuration selects {actual}")]
    DialectMismatch {
        expected: crate::Dialect,
        actual: crate::Dialect,
    },
}

/// Runtime storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// A version-guarded update/delete affected zero rows while the row
    /// exists: another writer won. Distinct from [`StorageError::NotFound`].
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    /// The addressed row does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Payload (de)serialization failed.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// The database rejected or failed the operation.
    #[error("database error: {0}")]
    Database(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl StorageError {
    pub fn concurrency(msg: impl Into<String>) -> Self {
        Self::Concurrency(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }
}

/// Result of an idempotent insert.
///
/// A duplicate natural key means "already stored" and both callers observe
/// success; it is never surfaced as an error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The row was inserted by this call.
    Inserted,
    /// A row with the same natural key already existed.
    AlreadyExists,
}

impl StoreOutcome {
    pub fn is_new(self) -> bool {
        matches!(self, Self::Inserted)
    }
}
