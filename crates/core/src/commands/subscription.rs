//! Subscription command builders.
//!
//! Subscribe must insert-or-update atomically without ever violating the
//! `(Subscriber, MessageType)` uniqueness invariant, and each engine has its
//! own way of getting there:
//!
//! - MsSqlServer: a locking `MERGE WITH (HOLDLOCK)` — without the lock hint
//!   two concurrent subscribers can both pass the MERGE's match phase and
//!   collide on insert.
//! - MySql: `INSERT ... ON DUPLICATE KEY UPDATE`.
//! - PostgreSql: `INSERT ... ON CONFLICT ... DO UPDATE`.
//! - Oracle: no native upsert here, so a PL/SQL block catches
//!   `DUP_VAL_ON_INDEX` and rolls the statement back as a successful no-op.

use crate::command::{CommandTemplate, build_in_clause};
use crate::config::PersistenceConfig;
use crate::dialect::{Dialect, TableSuffix};

/// Subscription command set for one deployment.
#[derive(Debug, Clone)]
pub struct SubscriptionCommands {
    dialect: Dialect,
    table: String,
    subscribe: CommandTemplate,
    unsubscribe: CommandTemplate,
}

const SUBSCRIBE_PARAMS: [&str; 4] = ["Subscriber", "MessageType", "Endpoint", "PersistenceVersion"];

impl SubscriptionCommands {
    pub fn build(config: &PersistenceConfig) -> Self {
        let dialect = config.dialect();
        let suffix = TableSuffix::aliased("SubscriptionData", "SS");
        let table = dialect.qualified_table(config.schema(), config.table_prefix(), &suffix);

        Self {
            dialect,
            subscribe: build_subscribe(dialect, &table),
            unsubscribe: build_unsubscribe(dialect, &table),
            table,
        }
    }

    /// Idempotent upsert of one `(Subscriber, MessageType)` pair.
    pub fn subscribe(&self) -> &CommandTemplate {
        &self.subscribe
    }

    /// Deleting a pair that was never subscribed affects zero rows; not an
    /// error.
    pub fn unsubscribe(&self) -> &CommandTemplate {
        &self.unsubscribe
    }

    /// Distinct `(Subscriber, Endpoint)` pairs subscribed to any of
    /// `message_type_count` message types.
    ///
    /// The placeholder count is decided at call time; the template carries
    /// exactly `message_type_count` placeholders and parameter names.
    pub fn get_subscribers(&self, message_type_count: usize) -> CommandTemplate {
        let (in_clause, params) =
            build_in_clause(self.dialect, message_type_count, "type", 1);
        CommandTemplate {
            sql: format!(
                "SELECT DISTINCT Subscriber, Endpoint\nFROM {}\nWHERE MessageType IN {}",
                self.table, in_clause
            ),
            params,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

fn build_subscribe(dialect: Dialect, table: &str) -> CommandTemplate {
    let sql = match dialect {
        Dialect::MsSqlServer => format!(
            "MERGE {table} WITH (HOLDLOCK) AS target\n\
             USING (SELECT @Subscriber AS Subscriber, @MessageType AS MessageType) AS source\n\
             ON target.Subscriber = source.Subscriber\n\
             AND target.MessageType = source.MessageType\n\
             WHEN MATCHED THEN\n\
             \x20   UPDATE SET Endpoint = @Endpoint, PersistenceVersion = @PersistenceVersion\n\
             WHEN NOT MATCHED THEN\n\
             \x20   INSERT (Subscriber, MessageType, Endpoint, PersistenceVersion)\n\
             \x20   VALUES (@Subscriber, @MessageType, @Endpoint, @PersistenceVersion);"
        ),
        Dialect::MySql => format!(
            "INSERT INTO {table}\n\
             \x20   (Subscriber, MessageType, Endpoint, PersistenceVersion)\n\
             VALUES\n\
             \x20   (@Subscriber, @MessageType, @Endpoint, @PersistenceVersion)\n\
             ON DUPLICATE KEY UPDATE\n\
             \x20   Endpoint = @Endpoint,\n\
             \x20   PersistenceVersion = @PersistenceVersion"
        ),
        Dialect::Oracle => format!(
            "BEGIN\n\
             \x20   INSERT INTO {table}\n\
             \x20       (Subscriber, MessageType, Endpoint, PersistenceVersion)\n\
             \x20   VALUES\n\
             \x20       (:Subscriber, :MessageType, :Endpoint, :PersistenceVersion);\n\
             \x20   COMMIT;\n\
             EXCEPTION\n\
             \x20   WHEN DUP_VAL_ON_INDEX\n\
             \x20   THEN ROLLBACK;\n\
             END;"
        ),
        Dialect::PostgreSql => format!(
            "INSERT INTO {table}\n\
             \x20   (Subscriber, MessageType, Endpoint, PersistenceVersion)\n\
             VALUES\n\
             \x20   ($1, $2, $3, $4)\n\
             ON CONFLICT (Subscriber, MessageType) DO UPDATE\n\
             \x20   SET Endpoint = EXCLUDED.Endpoint,\n\
             \x20       PersistenceVersion = EXCLUDED.PersistenceVersion"
        ),
    };
    CommandTemplate::new(sql, &SUBSCRIBE_PARAMS)
}

fn build_unsubscribe(dialect: Dialect, table: &str) -> CommandTemplate {
    let sql = format!(
        "DELETE FROM {table}\nWHERE Subscriber = {} AND MessageType = {}",
        dialect.param("Subscriber", 1),
        dialect.param("MessageType", 2),
    );
    CommandTemplate::new(sql, &["Subscriber", "MessageType"])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commands(dialect: Dialect) -> SubscriptionCommands {
        let config = PersistenceConfig::new(dialect, "Sales").unwrap();
        SubscriptionCommands::build(&config)
    }

    #[test]
    fn ms_sql_server_subscribe_locks_the_merge() {
        let ms = commands(Dialect::MsSqlServer);
        let subscribe = &ms.subscribe().sql;
        assert!(subscribe.contains("MERGE [dbo].[SalesSubscriptionData] WITH (HOLDLOCK)"));
        assert!(subscribe.contains("WHEN NOT MATCHED THEN"));
    }

    #[test]
    fn my_sql_subscribe_uses_duplicate_key_update() {
        let my = commands(Dialect::MySql);
        let subscribe = &my.subscribe().sql;
        assert!(subscribe.contains("INSERT INTO `SalesSubscriptionData`"));
        assert!(subscribe.contains("ON DUPLICATE KEY UPDATE"));
    }

    #[test]
    fn oracle_subscribe_swallows_duplicate_index_violation() {
        let oracle = commands(Dialect::Oracle);
        let subscribe = &oracle.subscribe().sql;
        assert!(subscribe.contains("INSERT INTO \"SALESSS\""));
        assert!(subscribe.contains("WHEN DUP_VAL_ON_INDEX"));
        assert!(subscribe.contains("ROLLBACK"));
    }

    #[test]
    fn postgres_subscribe_upserts_on_conflict() {
        let pg = commands(Dialect::PostgreSql);
        let subscribe = &pg.subscribe().sql;
        assert!(subscribe.contains("ON CONFLICT (Subscriber, MessageType) DO UPDATE"));
    }

    #[test]
    fn subscribe_binds_in_canonical_order() {
        for dialect in [
            Dialect::MsSqlServer,
            Dialect::MySql,
            Dialect::Oracle,
            Dialect::PostgreSql,
        ] {
            assert_eq!(
                commands(dialect).subscribe().params,
                ["Subscriber", "MessageType", "Endpoint", "PersistenceVersion"]
            );
        }
    }

    #[test]
    fn get_subscribers_emits_exactly_n_placeholders() {
        for dialect in [
            Dialect::MsSqlServer,
            Dialect::MySql,
            Dialect::Oracle,
            Dialect::PostgreSql,
        ] {
            let template = commands(dialect).get_subscribers(5);
            assert_eq!(template.params.len(), 5);
            assert!(template.sql.contains("SELECT DISTINCT Subscriber, Endpoint"));
        }
        let oracle = commands(Dialect::Oracle).get_subscribers(2);
        assert!(oracle.sql.contains("IN (:type0, :type1)"));
        let pg = commands(Dialect::PostgreSql).get_subscribers(2);
        assert!(pg.sql.contains("IN ($1, $2)"));
    }

    #[test]
    fn get_subscribers_for_no_types_matches_nothing() {
        let template = commands(Dialect::PostgreSql).get_subscribers(0);
        assert!(template.sql.contains("IN (NULL)"));
        assert!(template.params.is_empty());
    }

    #[test]
    fn unsubscribe_targets_the_pair() {
        let oracle = commands(Dialect::Oracle);
        let unsubscribe = oracle.unsubscribe();
        assert!(
            unsubscribe
                .sql
                .contains("WHERE Subscriber = :Subscriber AND MessageType = :MessageType")
        );
        assert_eq!(unsubscribe.params, ["Subscriber", "MessageType"]);
    }
}
