//! Pure SQL generation layer: dialects, command builders, DDL, configuration.
//!
//! Nothing in this crate performs I/O. Builders take an immutable
//! [`PersistenceConfig`] and emit [`CommandTemplate`]s — SQL text plus the
//! ordered parameter names a caller must bind — for the fixed operation set
//! required by saga, outbox and subscription semantics. The execution layer
//! lives in `postbox-persistence`.

pub mod command;
pub mod commands;
pub mod config;
pub mod ddl;
pub mod dialect;
pub mod error;
pub mod saga;

pub use command::{CommandTemplate, build_in_clause};
pub use config::PersistenceConfig;
pub use dialect::{Dialect, TableSuffix};
pub use error::{ConfigError, StorageError, StoreOutcome};
pub use saga::{CorrelationProperty, CorrelationType, SagaDefinition};
