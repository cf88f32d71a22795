//! Execution layer: transaction scopes, concurrency control strategies, and
//! the outbox/saga persisters.
//!
//! Each store comes in two flavours: a Postgres implementation over an sqlx
//! connection pool (the production path) and an in-memory implementation with
//! the same semantics for tests and dev, mirroring the split used for the
//! command builders in `postbox-core`.

pub mod outbox;
pub mod saga;
pub mod transaction;

mod pg;

pub use outbox::{InMemoryOutboxStore, OutboxRecord, OutboxStorage, PostgresOutboxStore};
pub use outbox::strategy::{
    ConcurrencyControl, DispatchState, OptimisticDispatch, PessimisticDispatch,
};
pub use saga::{InMemorySagaStore, PostgresSagaStore, SagaDataRecord, SagaStorage};
pub use saga::info_cache::{SagaInfo, SagaInfoCache};
pub use transaction::TransactionScope;
