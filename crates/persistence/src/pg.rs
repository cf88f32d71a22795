//! sqlx error mapping shared by the Postgres stores.
//!
//! SQLSTATE 23505 (unique violation) is the signal both the outbox store and
//! the saga store key off: duplicate natural key on store, concurrent insert
//! on saga create.

use postbox_core::StorageError;

pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StorageError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            if db_err.code().as_deref() == Some("23505") {
                StorageError::Concurrency(msg)
            } else {
                StorageError::Database(msg)
            }
        }
        sqlx::Error::PoolClosed => {
            StorageError::database(format!("connection pool closed in {operation}"))
        }
        _ => StorageError::database(format!("sqlx error in {operation}: {err}")),
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23505");
    }
    false
}
