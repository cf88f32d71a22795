//! DDL script builders.
//!
//! Create/drop scripts for the three on-disk contracts: saga tables, the
//! outbox table and the subscription table. The scripts are handed to
//! deployment tooling; nothing here executes them.

use crate::config::PersistenceConfig;
use crate::dialect::TableSuffix;
use crate::saga::SagaDefinition;

/// Create script for one saga table: Id, correlation column when configured,
/// Data, PersistenceVersion.
pub fn build_saga_create(config: &PersistenceConfig, definition: &SagaDefinition) -> String {
    let dialect = config.dialect();
    let table =
        dialect.qualified_table(config.schema(), config.table_prefix(), definition.table_suffix());

    let correlation_column = definition
        .correlation()
        .map(|prop| format!("    {} {} NULL,\n", prop.column_name(), dialect.string_type(200)))
        .unwrap_or_default();

    format!(
        "CREATE TABLE {table} (\n\
         \x20   Id {} NOT NULL PRIMARY KEY,\n\
         {correlation_column}\
         \x20   Data {} NOT NULL,\n\
         \x20   PersistenceVersion {} NOT NULL\n\
         )",
        dialect.guid_type(),
        dialect.json_type(),
        dialect.int_type(),
    )
}

pub fn build_saga_drop(config: &PersistenceConfig, definition: &SagaDefinition) -> String {
    let dialect = config.dialect();
    let table =
        dialect.qualified_table(config.schema(), config.table_prefix(), definition.table_suffix());
    format!("DROP TABLE {table}")
}

/// Create script for the outbox table. `MessageId` is the primary key —
/// dedup rests on this uniqueness.
pub fn build_outbox_create(config: &PersistenceConfig) -> String {
    let dialect = config.dialect();
    let table = dialect.qualified_table(
        config.schema(),
        config.table_prefix(),
        &TableSuffix::aliased("OutboxData", "OD"),
    );

    format!(
        "CREATE TABLE {table} (\n\
         \x20   MessageId {} NOT NULL PRIMARY KEY,\n\
         \x20   Dispatched {} NOT NULL,\n\
         \x20   DispatchedAt {} NULL,\n\
         \x20   PersistenceVersion {} NOT NULL,\n\
         \x20   Operations {} NOT NULL\n\
         )",
        dialect.string_type(200),
        dialect.bool_type(),
        dialect.timestamp_type(),
        dialect.int_type(),
        dialect.json_type(),
    )
}

pub fn build_outbox_drop(config: &PersistenceConfig) -> String {
    let dialect = config.dialect();
    let table = dialect.qualified_table(
        config.schema(),
        config.table_prefix(),
        &TableSuffix::aliased("OutboxData", "OD"),
    );
    format!("DROP TABLE {table}")
}

/// Create script for the subscription table; primary key is
/// `(Subscriber, MessageType)`, the uniqueness the subscribe upsert relies on.
pub fn build_subscription_create(config: &PersistenceConfig) -> String {
    let dialect = config.dialect();
    let table = dialect.qualified_table(
        config.schema(),
        config.table_prefix(),
        &TableSuffix::aliased("SubscriptionData", "SS"),
    );

    format!(
        "CREATE TABLE {table} (\n\
         \x20   Subscriber {} NOT NULL,\n\
         \x20   MessageType {} NOT NULL,\n\
         \x20   Endpoint {} NULL,\n\
         \x20   PersistenceVersion {} NOT NULL,\n\
         \x20   PRIMARY KEY (Subscriber, MessageType)\n\
         )",
        dialect.string_type(200),
        dialect.string_type(200),
        dialect.string_type(200),
        dialect.string_type(23),
    )
}

pub fn build_subscription_drop(config: &PersistenceConfig) -> String {
    let dialect = config.dialect();
    let table = dialect.qualified_table(
        config.schema(),
        config.table_prefix(),
        &TableSuffix::aliased("SubscriptionData", "SS"),
    );
    format!("DROP TABLE {table}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::saga::CorrelationProperty;

    #[test]
    fn saga_table_carries_the_correlation_column() {
        let config = PersistenceConfig::new(Dialect::PostgreSql, "Sales").unwrap();
        let definition = SagaDefinition::new(
            "OrderPolicy",
            Some(CorrelationProperty::string("OrderNumber")),
        );
        let ddl = build_saga_create(&config, &definition);
        assert!(ddl.contains("CREATE TABLE \"public\".\"SalesOrderPolicy\""));
        assert!(ddl.contains("Correlation_OrderNumber VARCHAR(200) NULL"));
        assert!(ddl.contains("Data JSONB NOT NULL"));
    }

    #[test]
    fn saga_table_without_correlation_has_no_extra_column() {
        let config = PersistenceConfig::new(Dialect::MySql, "Sales").unwrap();
        let definition = SagaDefinition::new("OrderPolicy", None);
        let ddl = build_saga_create(&config, &definition);
        assert!(!ddl.contains("Correlation_"));
        assert!(ddl.contains("Data JSON NOT NULL"));
    }

    #[test]
    fn outbox_table_keys_on_message_id() {
        let config = PersistenceConfig::new(Dialect::MsSqlServer, "Sales").unwrap();
        let ddl = build_outbox_create(&config);
        assert!(ddl.contains("MessageId NVARCHAR(200) NOT NULL PRIMARY KEY"));
        assert!(ddl.contains("DispatchedAt DATETIME2 NULL"));
        assert!(ddl.contains("Operations NVARCHAR(MAX) NOT NULL"));
    }

    #[test]
    fn subscription_table_keys_on_subscriber_and_message_type() {
        let config = PersistenceConfig::new(Dialect::Oracle, "Sales").unwrap();
        let ddl = build_subscription_create(&config);
        assert!(ddl.contains("CREATE TABLE \"SALESSS\""));
        assert!(ddl.contains("PRIMARY KEY (Subscriber, MessageType)"));
    }

    #[test]
    fn drop_scripts_target_the_same_tables() {
        let config = PersistenceConfig::new(Dialect::PostgreSql, "Sales").unwrap();
        assert_eq!(
            build_outbox_drop(&config),
            "DROP TABLE \"public\".\"SalesOutboxData\""
        );
    }
}
