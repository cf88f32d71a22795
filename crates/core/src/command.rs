//! Command templates and placeholder-list generation.

use crate::dialect::Dialect;

/// A ready-to-execute SQL command: text plus the parameter names in the exact
/// order the caller must bind values.
///
/// Named-parameter engines (`@Name`, `:Name`) bind each name once; PostgreSql
/// text carries positional `$n` markers whose positions follow `params`
/// order. Templates are built once at configuration time and reused for the
/// process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    pub sql: String,
    pub params: Vec<String>,
}

impl CommandTemplate {
    pub fn new(sql: impl Into<String>, params: &[&str]) -> Self {
        Self {
            sql: sql.into(),
            params: params.iter().map(|p| (*p).to_string()).collect(),
        }
    }
}

/// Build an `IN (...)` clause with exactly `count` placeholders.
///
/// Parameter names are `{name_prefix}0 .. {name_prefix}{count-1}`;
/// `first_position` is the 1-based bind position of the first placeholder
/// (only PostgreSql markers depend on it). `count == 0` yields `(NULL)`,
/// which is valid on every supported engine and matches no rows.
pub fn build_in_clause(
    dialect: Dialect,
    count: usize,
    name_prefix: &str,
    first_position: usize,
) -> (String, Vec<String>) {
    if count == 0 {
        return ("(NULL)".to_string(), Vec::new());
    }

    let mut names = Vec::with_capacity(count);
    let mut markers = Vec::with_capacity(count);
    for i in 0..count {
        let name = format!("{name_prefix}{i}");
        markers.push(dialect.param(&name, first_position + i));
        names.push(name);
    }
    (format!("({})", markers.join(", ")), names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_list_matches_nothing() {
        let (fragment, names) = build_in_clause(Dialect::MySql, 0, "type", 1);
        assert_eq!(fragment, "(NULL)");
        assert!(names.is_empty());
    }

    #[test]
    fn single_placeholder() {
        let (fragment, names) = build_in_clause(Dialect::MsSqlServer, 1, "type", 1);
        assert_eq!(fragment, "(@type0)");
        assert_eq!(names, vec!["type0"]);
    }

    #[test]
    fn oracle_uses_named_binds() {
        let (fragment, names) = build_in_clause(Dialect::Oracle, 3, "type", 1);
        assert_eq!(fragment, "(:type0, :type1, :type2)");
        assert_eq!(names, vec!["type0", "type1", "type2"]);
    }

    #[test]
    fn postgres_positions_respect_offset() {
        let (fragment, _) = build_in_clause(Dialect::PostgreSql, 3, "type", 2);
        assert_eq!(fragment, "($2, $3, $4)");
    }

    proptest! {
        #[test]
        fn placeholder_count_always_matches(count in 0usize..200) {
            for dialect in [
                Dialect::MsSqlServer,
                Dialect::MySql,
                Dialect::Oracle,
                Dialect::PostgreSql,
            ] {
                let (fragment, names) = build_in_clause(dialect, count, "type", 1);
                prop_assert_eq!(names.len(), count);
                if count > 0 {
                    // One separator fewer than placeholders.
                    prop_assert_eq!(
                        fragment.matches(", ").count(),
                        count - 1
                    );
                }
            }
        }
    }
}
