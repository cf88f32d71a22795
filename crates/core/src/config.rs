//! Persistence configuration.

use crate::dialect::Dialect;
use crate::error::ConfigError;

/// Immutable configuration shared by every component constructor.
///
/// Built once by the caller at startup; there is no ambient global. Identifier
/// rules are validated here, eagerly — a malformed prefix must fail before any
/// SQL is ever issued, not at query time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceConfig {
    dialect: Dialect,
    table_prefix: String,
    schema: String,
}

impl PersistenceConfig {
    /// Build a configuration with the dialect's default schema.
    pub fn new(dialect: Dialect, table_prefix: impl Into<String>) -> Result<Self, ConfigError> {
        Self::with_schema(dialect, table_prefix, dialect.default_schema())
    }

    /// Build a configuration with an explicit schema.
    pub fn with_schema(
        dialect: Dialect,
        table_prefix: impl Into<String>,
        schema: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let table_prefix = table_prefix.into();
        validate_table_prefix(dialect, &table_prefix)?;
        Ok(Self {
            dialect,
            table_prefix,
            schema: schema.into(),
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn table_prefix(&self) -> &str {
        &self.table_prefix
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }
}

fn validate_table_prefix(dialect: Dialect, prefix: &str) -> Result<(), ConfigError> {
    let Some(max) = dialect.max_table_prefix_len() else {
        return Ok(());
    };
    if prefix.chars().count() > max {
        return Err(ConfigError::PrefixTooLong {
            prefix: prefix.to_string(),
            max,
            dialect,
        });
    }
    if !prefix.is_ascii() {
        return Err(ConfigError::PrefixNotAscii {
            prefix: prefix.to_string(),
            dialect,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_PREFIX: &str = "VeryLongEndpointNameThatExceedsTwentyFiveChars";

    #[test]
    fn oracle_rejects_long_prefix_naming_the_limit() {
        let err = PersistenceConfig::new(Dialect::Oracle, LONG_PREFIX).unwrap_err();
        assert!(matches!(err, ConfigError::PrefixTooLong { max: 25, .. }));
        assert!(err.to_string().contains("25"));
        assert!(err.to_string().contains(LONG_PREFIX));
    }

    #[test]
    fn oracle_rejects_non_ascii_prefix() {
        let err = PersistenceConfig::new(Dialect::Oracle, "Bestellwésen").unwrap_err();
        assert!(matches!(err, ConfigError::PrefixNotAscii { .. }));
    }

    #[test]
    fn ms_sql_server_accepts_the_same_prefix() {
        let config = PersistenceConfig::new(Dialect::MsSqlServer, LONG_PREFIX).unwrap();
        assert_eq!(config.table_prefix(), LONG_PREFIX);
        assert_eq!(config.schema(), "dbo");
    }

    #[test]
    fn oracle_accepts_prefix_at_the_limit() {
        let prefix = "A".repeat(25);
        assert!(PersistenceConfig::new(Dialect::Oracle, prefix).is_ok());
    }

    #[test]
    fn explicit_schema_is_kept() {
        let config =
            PersistenceConfig::with_schema(Dialect::PostgreSql, "Sales", "billing").unwrap();
        assert_eq!(config.schema(), "billing");
    }
}
