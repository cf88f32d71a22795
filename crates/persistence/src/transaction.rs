//! Transaction scopes.
//!
//! One connection and at most one open transaction per logical unit of work.
//! The scope guarantees release on every exit path: `commit`/`rollback`
//! consume it, and dropping an open scope rolls the transaction back (sqlx
//! semantics), so an early `?` return can never leak an open transaction.
//!
//! Persisters support two acquisition styles with the same contract: a
//! connection-owned transaction the store opens and commits around a single
//! operation, and an ambient scope the caller opens, threads through several
//! `*_in` operations, and commits once.

use sqlx::{PgPool, Postgres, Transaction};

use postbox_core::StorageError;

use crate::pg::map_sqlx_error;

/// An open database transaction bound to the current unit of work.
pub struct TransactionScope {
    tx: Transaction<'static, Postgres>,
}

impl TransactionScope {
    pub async fn begin(pool: &PgPool) -> Result<Self, StorageError> {
        let tx = pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Self { tx })
    }

    pub async fn commit(self) -> Result<(), StorageError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    pub async fn rollback(self) -> Result<(), StorageError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback_transaction", e))
    }

    /// The underlying transaction, for statement execution.
    pub fn tx(&mut self) -> &mut Transaction<'static, Postgres> {
        &mut self.tx
    }
}

impl std::fmt::Debug for TransactionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionScope").finish_non_exhaustive()
    }
}
