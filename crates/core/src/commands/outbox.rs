//! Outbox command builders.
//!
//! The outbox table is the dedup point for side-effect dispatch: `MessageId`
//! is the natural key, `Dispatched` transitions false → true exactly once,
//! and `PersistenceVersion` carries the optimistic token. Which of these
//! templates a dispatcher issues is the concurrency control strategy's call;
//! the builders themselves are strategy-agnostic.

use crate::command::CommandTemplate;
use crate::config::PersistenceConfig;
use crate::dialect::{Dialect, TableSuffix};

/// Outbox command set for one deployment.
#[derive(Debug, Clone)]
pub struct OutboxCommands {
    table: String,
    store: CommandTemplate,
    get: CommandTemplate,
    get_for_update: CommandTemplate,
    mark_dispatched: CommandTemplate,
    mark_dispatched_versioned: CommandTemplate,
    cleanup: CommandTemplate,
}

const RECORD_COLUMNS: &str = "MessageId, Dispatched, DispatchedAt, PersistenceVersion, Operations";

impl OutboxCommands {
    pub fn build(config: &PersistenceConfig) -> Self {
        let dialect = config.dialect();
        let suffix = TableSuffix::aliased("OutboxData", "OD");
        let table = dialect.qualified_table(config.schema(), config.table_prefix(), &suffix);

        let store = CommandTemplate::new(
            format!(
                "INSERT INTO {table}\n\
                 \x20   ({RECORD_COLUMNS})\n\
                 VALUES\n\
                 \x20   ({}, {}, NULL, 0, {})",
                dialect.param("MessageId", 1),
                dialect.bool_literal(false),
                dialect.param("Operations", 2),
            ),
            &["MessageId", "Operations"],
        );

        let get = CommandTemplate::new(
            format!(
                "SELECT {RECORD_COLUMNS}\nFROM {table}\nWHERE MessageId = {}",
                dialect.param("MessageId", 1),
            ),
            &["MessageId"],
        );

        // Row lock held for the duration of the surrounding transaction.
        let get_for_update = CommandTemplate::new(
            match dialect {
                Dialect::MsSqlServer => format!(
                    "SELECT {RECORD_COLUMNS}\n\
                     FROM {table} WITH (UPDLOCK, ROWLOCK)\n\
                     WHERE MessageId = @MessageId"
                ),
                _ => format!(
                    "SELECT {RECORD_COLUMNS}\nFROM {table}\nWHERE MessageId = {}\nFOR UPDATE",
                    dialect.param("MessageId", 1),
                ),
            },
            &["MessageId"],
        );

        // Dispatched operations are cleared; only the dedup row remains.
        let mark_dispatched = CommandTemplate::new(
            format!(
                "UPDATE {table}\n\
                 SET Dispatched = {}, DispatchedAt = {}, Operations = '[]'\n\
                 WHERE MessageId = {}",
                dialect.bool_literal(true),
                dialect.param("DispatchedAt", 1),
                dialect.param("MessageId", 2),
            ),
            &["DispatchedAt", "MessageId"],
        );

        let mark_dispatched_versioned = CommandTemplate::new(
            format!(
                "UPDATE {table}\n\
                 SET Dispatched = {}, DispatchedAt = {}, Operations = '[]',\n\
                 \x20   PersistenceVersion = PersistenceVersion + 1\n\
                 WHERE MessageId = {} AND PersistenceVersion = {}",
                dialect.bool_literal(true),
                dialect.param("DispatchedAt", 1),
                dialect.param("MessageId", 2),
                dialect.param("ExpectedVersion", 3),
            ),
            &["DispatchedAt", "MessageId", "ExpectedVersion"],
        );

        // Never deletes undispatched work.
        let cleanup = CommandTemplate::new(
            format!(
                "DELETE FROM {table}\nWHERE Dispatched = {} AND DispatchedAt < {}",
                dialect.bool_literal(true),
                dialect.param("Cutoff", 1),
            ),
            &["Cutoff"],
        );

        Self {
            table,
            store,
            get,
            get_for_update,
            mark_dispatched,
            mark_dispatched_versioned,
            cleanup,
        }
    }

    /// Insert a fresh record with `Dispatched` false and version 0.
    ///
    /// A duplicate-key failure means the record was already stored; callers
    /// resolve it to success.
    pub fn store(&self) -> &CommandTemplate {
        &self.store
    }

    pub fn get(&self) -> &CommandTemplate {
        &self.get
    }

    /// Unlocked read plus versioned update — the optimistic pair.
    pub fn mark_dispatched_versioned(&self) -> &CommandTemplate {
        &self.mark_dispatched_versioned
    }

    /// Locking read plus unconditional update — the pessimistic pair.
    pub fn get_for_update(&self) -> &CommandTemplate {
        &self.get_for_update
    }

    pub fn mark_dispatched(&self) -> &CommandTemplate {
        &self.mark_dispatched
    }

    pub fn cleanup(&self) -> &CommandTemplate {
        &self.cleanup
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commands(dialect: Dialect) -> OutboxCommands {
        let config = PersistenceConfig::new(dialect, "Sales").unwrap();
        OutboxCommands::build(&config)
    }

    #[test]
    fn store_starts_undispatched_at_version_zero() {
        let pg = commands(Dialect::PostgreSql);
        let store = pg.store();
        assert!(store.sql.contains("FALSE, NULL, 0"));
        assert_eq!(store.params, ["MessageId", "Operations"]);

        let my = commands(Dialect::MySql);
        let store = my.store();
        assert!(store.sql.contains("0, NULL, 0"));
    }

    #[test]
    fn pessimistic_read_locks_the_row() {
        let ms = commands(Dialect::MsSqlServer);
        assert!(ms.get_for_update().sql.contains("WITH (UPDLOCK, ROWLOCK)"));
        assert!(!ms.get().sql.contains("UPDLOCK"));

        for dialect in [Dialect::MySql, Dialect::Oracle, Dialect::PostgreSql] {
            assert!(commands(dialect).get_for_update().sql.ends_with("FOR UPDATE"));
        }
    }

    #[test]
    fn versioned_mark_guards_on_the_observed_version() {
        let oracle = commands(Dialect::Oracle);
        let template = oracle.mark_dispatched_versioned();
        assert!(
            template
                .sql
                .contains("WHERE MessageId = :MessageId AND PersistenceVersion = :ExpectedVersion")
        );
        assert!(template.sql.contains("PersistenceVersion = PersistenceVersion + 1"));
        assert_eq!(template.params, ["DispatchedAt", "MessageId", "ExpectedVersion"]);
    }

    #[test]
    fn cleanup_only_touches_dispatched_rows() {
        let pg = commands(Dialect::PostgreSql);
        assert!(
            pg.cleanup()
                .sql
                .contains("WHERE Dispatched = TRUE AND DispatchedAt < $1")
        );

        let ms = commands(Dialect::MsSqlServer);
        assert!(
            ms.cleanup()
                .sql
                .contains("WHERE Dispatched = 1 AND DispatchedAt < @Cutoff")
        );
    }

    #[test]
    fn oracle_table_uses_the_short_alias() {
        assert_eq!(commands(Dialect::Oracle).table(), "\"SALESOD\"");
    }
}
