//! Saga command builders.
//!
//! Every mutation is guarded by the row's `PersistenceVersion`: update bumps
//! it by one in the same statement, complete deletes under the same guard.
//! Zero rows affected is the concurrency-conflict signal the persister
//! reports — never a silent overwrite.

use crate::command::CommandTemplate;
use crate::config::PersistenceConfig;
use crate::dialect::Dialect;
use crate::error::ConfigError;
use crate::saga::SagaDefinition;

/// Saga command set for one saga type in one deployment.
#[derive(Debug, Clone)]
pub struct SagaCommands {
    saga_name: String,
    table: String,
    insert: CommandTemplate,
    get_by_id: CommandTemplate,
    get_by_correlation: Option<CommandTemplate>,
    update: CommandTemplate,
    complete: CommandTemplate,
}

impl SagaCommands {
    pub fn build(config: &PersistenceConfig, definition: &SagaDefinition) -> Self {
        let dialect = config.dialect();
        let table =
            dialect.qualified_table(config.schema(), config.table_prefix(), definition.table_suffix());

        let insert = build_insert(dialect, &table, definition);
        let get_by_id = CommandTemplate::new(
            format!(
                "SELECT Id, Data, PersistenceVersion\nFROM {table}\nWHERE Id = {}",
                dialect.param("Id", 1),
            ),
            &["Id"],
        );
        let get_by_correlation = definition.correlation().map(|prop| {
            CommandTemplate::new(
                format!(
                    "SELECT Id, Data, PersistenceVersion\nFROM {table}\nWHERE {} = {}",
                    prop.column_name(),
                    dialect.param("CorrelationValue", 1),
                ),
                &["CorrelationValue"],
            )
        });
        let update = CommandTemplate::new(
            format!(
                "UPDATE {table}\n\
                 SET Data = {}, PersistenceVersion = PersistenceVersion + 1\n\
                 WHERE Id = {} AND PersistenceVersion = {}",
                dialect.param("Data", 1),
                dialect.param("Id", 2),
                dialect.param("ExpectedVersion", 3),
            ),
            &["Data", "Id", "ExpectedVersion"],
        );
        let complete = CommandTemplate::new(
            format!(
                "DELETE FROM {table}\nWHERE Id = {} AND PersistenceVersion = {}",
                dialect.param("Id", 1),
                dialect.param("ExpectedVersion", 2),
            ),
            &["Id", "ExpectedVersion"],
        );

        Self {
            saga_name: definition.name().to_string(),
            table,
            insert,
            get_by_id,
            get_by_correlation,
            update,
            complete,
        }
    }

    /// Insert with initial version 0.
    pub fn insert(&self) -> &CommandTemplate {
        &self.insert
    }

    pub fn get_by_id(&self) -> &CommandTemplate {
        &self.get_by_id
    }

    /// Correlation lookup; a configuration error when the saga type has no
    /// correlation property.
    pub fn get_by_correlation(&self) -> Result<&CommandTemplate, ConfigError> {
        self.get_by_correlation
            .as_ref()
            .ok_or_else(|| ConfigError::NoCorrelationProperty {
                saga: self.saga_name.clone(),
            })
    }

    /// Version-guarded update, bumping the version by one.
    pub fn update(&self) -> &CommandTemplate {
        &self.update
    }

    /// Version-guarded delete.
    pub fn complete(&self) -> &CommandTemplate {
        &self.complete
    }

    pub fn saga_name(&self) -> &str {
        &self.saga_name
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

fn build_insert(dialect: Dialect, table: &str, definition: &SagaDefinition) -> CommandTemplate {
    match definition.correlation() {
        Some(prop) => CommandTemplate::new(
            format!(
                "INSERT INTO {table}\n\
                 \x20   (Id, Data, PersistenceVersion, {})\n\
                 VALUES\n\
                 \x20   ({}, {}, 0, {})",
                prop.column_name(),
                dialect.param("Id", 1),
                dialect.param("Data", 2),
                dialect.param("CorrelationValue", 3),
            ),
            &["Id", "Data", "CorrelationValue"],
        ),
        None => CommandTemplate::new(
            format!(
                "INSERT INTO {table}\n\
                 \x20   (Id, Data, PersistenceVersion)\n\
                 VALUES\n\
                 \x20   ({}, {}, 0)",
                dialect.param("Id", 1),
                dialect.param("Data", 2),
            ),
            &["Id", "Data"],
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saga::CorrelationProperty;

    fn commands(dialect: Dialect) -> SagaCommands {
        let config = PersistenceConfig::new(dialect, "Sales").unwrap();
        let definition = SagaDefinition::new(
            "OrderPolicy",
            Some(CorrelationProperty::string("OrderNumber")),
        );
        SagaCommands::build(&config, &definition)
    }

    #[test]
    fn insert_starts_at_version_zero_with_correlation_column() {
        let ms = commands(Dialect::MsSqlServer);
        let insert = ms.insert();
        assert!(insert.sql.contains("[dbo].[SalesOrderPolicy]"));
        assert!(insert.sql.contains("Correlation_OrderNumber"));
        assert!(insert.sql.contains(", 0,"));
        assert_eq!(insert.params, ["Id", "Data", "CorrelationValue"]);
    }

    #[test]
    fn insert_without_correlation_omits_the_column() {
        let config = PersistenceConfig::new(Dialect::PostgreSql, "Sales").unwrap();
        let definition = SagaDefinition::new("OrderPolicy", None);
        let built = SagaCommands::build(&config, &definition);
        let insert_sql = &built.insert().sql;
        assert!(!insert_sql.contains("Correlation_"));
        assert!(insert_sql.contains("($1, $2, 0)"));
    }

    #[test]
    fn update_bumps_version_under_guard() {
        let oracle = commands(Dialect::Oracle);
        let update = oracle.update();
        assert!(update.sql.contains("PersistenceVersion = PersistenceVersion + 1"));
        assert!(update.sql.contains("WHERE Id = :Id AND PersistenceVersion = :ExpectedVersion"));
        assert_eq!(update.params, ["Data", "Id", "ExpectedVersion"]);
    }

    #[test]
    fn complete_deletes_under_the_same_guard() {
        let pg = commands(Dialect::PostgreSql);
        let complete = pg.complete();
        assert!(complete.sql.contains("WHERE Id = $1 AND PersistenceVersion = $2"));
    }

    #[test]
    fn correlation_lookup_requires_a_configured_property() {
        let config = PersistenceConfig::new(Dialect::MySql, "Sales").unwrap();
        let definition = SagaDefinition::new("OrderPolicy", None);
        let commands = SagaCommands::build(&config, &definition);
        assert!(matches!(
            commands.get_by_correlation(),
            Err(ConfigError::NoCorrelationProperty { .. })
        ));
    }

    #[test]
    fn correlation_lookup_targets_the_correlation_column() {
        let my = commands(Dialect::MySql);
        let template = my.get_by_correlation().unwrap();
        assert!(
            template
                .sql
                .contains("WHERE Correlation_OrderNumber = @CorrelationValue")
        );
    }
}
