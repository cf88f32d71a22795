//! SQL engine dialects.
//!
//! Exactly one dialect is selected per deployment and stays fixed for the
//! process lifetime. Every per-engine difference the command builders care
//! about — identifier quoting, parameter markers, type mappings, identifier
//! length caps — is answered here, so the builders themselves contain no
//! engine switches.

use serde::{Deserialize, Serialize};

/// A supported SQL engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    MsSqlServer,
    MySql,
    Oracle,
    PostgreSql,
}

/// Oracle caps identifier length; qualified names are truncated to fit.
const ORACLE_MAX_IDENTIFIER: usize = 30;

/// Maximum table-prefix length accepted for Oracle deployments.
///
/// Leaves room inside the 30-character identifier cap for the aliased table
/// suffixes the builders append. Validated eagerly by
/// [`crate::PersistenceConfig::new`].
pub const ORACLE_MAX_PREFIX: usize = 25;

impl Dialect {
    /// Quote a single identifier per engine rules.
    ///
    /// Oracle identifiers are uppercased; quoted lowercase names would
    /// otherwise be distinct from the unquoted uppercase names DDL tooling
    /// creates.
    pub fn quote(&self, ident: &str) -> String {
        match self {
            Self::MsSqlServer => format!("[{ident}]"),
            Self::MySql => format!("`{ident}`"),
            Self::Oracle => format!("\"{}\"", ident.to_uppercase()),
            Self::PostgreSql => format!("\"{ident}\""),
        }
    }

    /// Parameter marker for a named parameter at 1-based bind `position`.
    ///
    /// MsSqlServer and MySql use `@Name`, Oracle uses named `:Name` binds,
    /// PostgreSql uses positional `$n`. Bind order is carried separately by
    /// [`crate::CommandTemplate::params`].
    pub fn param(&self, name: &str, position: usize) -> String {
        match self {
            Self::MsSqlServer | Self::MySql => format!("@{name}"),
            Self::Oracle => format!(":{name}"),
            Self::PostgreSql => format!("${position}"),
        }
    }

    /// Fully qualified, quoted table name: `schema.prefix + suffix`.
    ///
    /// MySql has no schema qualifier here; Oracle uses the short alias and
    /// truncates to the engine's identifier cap.
    pub fn qualified_table(&self, schema: &str, prefix: &str, suffix: &TableSuffix) -> String {
        match self {
            Self::MsSqlServer | Self::PostgreSql => format!(
                "{}.{}",
                self.quote(schema),
                self.quote(&format!("{prefix}{}", suffix.long))
            ),
            Self::MySql => self.quote(&format!("{prefix}{}", suffix.long)),
            Self::Oracle => {
                let name: String = format!("{prefix}{}", suffix.short)
                    .chars()
                    .take(ORACLE_MAX_IDENTIFIER)
                    .collect();
                self.quote(&name)
            }
        }
    }

    /// Maximum table-prefix length, where the engine imposes one.
    pub fn max_table_prefix_len(&self) -> Option<usize> {
        match self {
            Self::Oracle => Some(ORACLE_MAX_PREFIX),
            _ => None,
        }
    }

    /// Column type used for serialized JSON payloads.
    pub fn json_type(&self) -> &'static str {
        match self {
            Self::MsSqlServer => "NVARCHAR(MAX)",
            Self::MySql => "JSON",
            Self::Oracle => "NCLOB",
            Self::PostgreSql => "JSONB",
        }
    }

    /// Column type for booleans.
    pub fn bool_type(&self) -> &'static str {
        match self {
            Self::MsSqlServer => "BIT",
            Self::MySql => "BOOLEAN",
            Self::Oracle => "NUMBER(1)",
            Self::PostgreSql => "BOOLEAN",
        }
    }

    /// Literal for a boolean value in SQL text.
    pub fn bool_literal(&self, value: bool) -> &'static str {
        match self {
            Self::PostgreSql => {
                if value { "TRUE" } else { "FALSE" }
            }
            _ => {
                if value { "1" } else { "0" }
            }
        }
    }

    /// Column type for UTC timestamps.
    pub fn timestamp_type(&self) -> &'static str {
        match self {
            Self::MsSqlServer => "DATETIME2",
            Self::MySql => "DATETIME(6)",
            Self::Oracle => "TIMESTAMP",
            Self::PostgreSql => "TIMESTAMPTZ",
        }
    }

    /// Column type for bounded strings.
    pub fn string_type(&self, len: usize) -> String {
        match self {
            Self::MsSqlServer => format!("NVARCHAR({len})"),
            Self::MySql | Self::PostgreSql => format!("VARCHAR({len})"),
            Self::Oracle => format!("VARCHAR2({len} CHAR)"),
        }
    }

    /// Column type for UUID identifiers.
    pub fn guid_type(&self) -> &'static str {
        match self {
            Self::MsSqlServer => "UNIQUEIDENTIFIER",
            Self::MySql => "VARCHAR(38)",
            Self::Oracle => "VARCHAR2(38)",
            Self::PostgreSql => "UUID",
        }
    }

    /// Column type for 32-bit integers.
    pub fn int_type(&self) -> &'static str {
        match self {
            Self::Oracle => "NUMBER(10)",
            Self::PostgreSql => "INTEGER",
            _ => "INT",
        }
    }

    /// Default schema name where the engine uses one.
    pub fn default_schema(&self) -> &'static str {
        match self {
            Self::MsSqlServer => "dbo",
            Self::PostgreSql => "public",
            Self::MySql | Self::Oracle => "",
        }
    }
}

impl core::fmt::Display for Dialect {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::MsSqlServer => "MsSqlServer",
            Self::MySql => "MySql",
            Self::Oracle => "Oracle",
            Self::PostgreSql => "PostgreSql",
        };
        f.write_str(name)
    }
}

/// Logical table suffix with an Oracle-friendly short alias.
///
/// The long form is appended to the table prefix on engines without tight
/// identifier limits; the short alias keeps Oracle names inside the cap
/// (e.g. `SubscriptionData` / `SS`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSuffix {
    pub long: String,
    pub short: String,
}

impl TableSuffix {
    /// Suffix whose short alias equals the long name (already short enough).
    pub fn uniform(name: impl Into<String>) -> Self {
        let long = name.into();
        let short = long.clone();
        Self { long, short }
    }

    /// Suffix with an explicit short alias for Oracle.
    pub fn aliased(long: impl Into<String>, short: impl Into<String>) -> Self {
        Self {
            long: long.into(),
            short: short.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_per_dialect() {
        assert_eq!(Dialect::MsSqlServer.quote("Outbox"), "[Outbox]");
        assert_eq!(Dialect::MySql.quote("Outbox"), "`Outbox`");
        assert_eq!(Dialect::Oracle.quote("Outbox"), "\"OUTBOX\"");
        assert_eq!(Dialect::PostgreSql.quote("Outbox"), "\"Outbox\"");
    }

    #[test]
    fn parameter_markers() {
        assert_eq!(Dialect::MsSqlServer.param("MessageId", 1), "@MessageId");
        assert_eq!(Dialect::MySql.param("MessageId", 1), "@MessageId");
        assert_eq!(Dialect::Oracle.param("MessageId", 1), ":MessageId");
        assert_eq!(Dialect::PostgreSql.param("MessageId", 3), "$3");
    }

    #[test]
    fn qualified_table_uses_schema_where_supported() {
        let suffix = TableSuffix::aliased("SubscriptionData", "SS");
        assert_eq!(
            Dialect::MsSqlServer.qualified_table("dbo", "Sales", &suffix),
            "[dbo].[SalesSubscriptionData]"
        );
        assert_eq!(
            Dialect::MySql.qualified_table("", "Sales", &suffix),
            "`SalesSubscriptionData`"
        );
        assert_eq!(
            Dialect::PostgreSql.qualified_table("public", "Sales", &suffix),
            "\"public\".\"SalesSubscriptionData\""
        );
    }

    #[test]
    fn oracle_uses_short_alias_uppercased() {
        let suffix = TableSuffix::aliased("SubscriptionData", "SS");
        assert_eq!(
            Dialect::Oracle.qualified_table("", "Sales", &suffix),
            "\"SALESSS\""
        );
    }

    #[test]
    fn oracle_truncates_to_identifier_cap() {
        let suffix = TableSuffix::uniform("AVeryLongSagaNameIndeed");
        let quoted = Dialect::Oracle.qualified_table("", "TwentyFiveCharacterPrefix", &suffix);
        // 30 chars of identifier plus the two quotes.
        assert_eq!(quoted.len(), 32);
    }

    #[test]
    fn oracle_truncation_counts_chars_not_bytes() {
        // A multi-byte character straddling the cap must not split.
        let suffix = TableSuffix::aliased("Uberwachung", "ÜÜÜÜÜÜ");
        let prefix = "A".repeat(25);
        let quoted = Dialect::Oracle.qualified_table("", &prefix, &suffix);
        assert_eq!(quoted.chars().count(), 32);
        assert!(quoted.ends_with("Ü\""));
    }
}
