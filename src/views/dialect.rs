use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::SiteAdminError;

/// Names of the capture groups shared by every dialect's patterns
pub(crate) const DROP_NAMES: &str = "drop_names";
pub(crate) const HELPER_SCHEMA: &str = "helper_schema";
pub(crate) const HELPER_VIEW: &str = "helper_view";
pub(crate) const CREATE_SCHEMA: &str = "create_schema";
pub(crate) const CREATE_VIEW: &str = "create_view";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    #[strum(to_string = "postgresql", serialize = "pgsql", serialize = "postgres")]
    PostgreSql,
    #[strum(to_string = "sqlserver", serialize = "mssql")]
    SqlServer,
}

impl DialectKind {
    pub fn dialect(&self) -> &'static SqlDialect {
        match self {
            DialectKind::PostgreSql => &POSTGRESQL,
            DialectKind::SqlServer => &SQL_SERVER,
        }
    }
}

/// Surface syntax of one SQL dialect.
///
/// Identifiers are written as `[a-z0-9]\w*` so that names beginning with an
/// underscore can never match.
#[derive(Debug)]
pub struct SqlDialect {
    pub kind: DialectKind,
    /// Both drop forms: plain `DROP VIEW` over a comma-separated name list and
    /// the `core.fn_dropifexists` helper
    pub drop_pattern: &'static str,
    /// Start of a `CREATE VIEW` statement, up to and including `AS`
    pub create_pattern: &'static str,
    /// End of a statement
    pub terminator_pattern: &'static str,
    /// Rendered drop statement; `{schema}` and `{view}` are substituted
    pub drop_template: &'static str,
}

pub static POSTGRESQL: SqlDialect = SqlDialect {
    kind: DialectKind::PostgreSql,
    drop_pattern: r"DROP\s+VIEW\s+(?:IF\s+EXISTS\s+)?(?P<drop_names>\w+\.[a-z0-9]\w*(?:\s*,\s*\w+\.\w+)*)(?:\s+(?:CASCADE|RESTRICT)\b)?|SELECT\s+core\.fn_dropifexists\s*\(\s*'(?P<helper_view>[a-z0-9]\w*)'\s*,\s*'(?P<helper_schema>\w+)'\s*,\s*'VIEW'\s*,\s*NULL\s*\)",
    create_pattern: r"CREATE\s+(?:OR\s+REPLACE\s+)?VIEW\s+(?P<create_schema>\w+)\.(?P<create_view>[a-z0-9]\w*)\s+AS\b",
    terminator_pattern: r";",
    drop_template: "SELECT core.fn_dropifexists('{view}', '{schema}', 'VIEW', NULL);",
};

pub static SQL_SERVER: SqlDialect = SqlDialect {
    kind: DialectKind::SqlServer,
    drop_pattern: r"(?:IF\s+OBJECT_ID\s*\(\s*'[^']*'\s*(?:,\s*'V'\s*)?\)\s+IS\s+NOT\s+NULL\s+)?DROP\s+VIEW\s+(?:IF\s+EXISTS\s+)?(?P<drop_names>\w+\.[a-z0-9]\w*(?:\s*,\s*\w+\.\w+)*)|EXEC\s+core\.fn_dropifexists\s*\(?\s*'(?P<helper_view>[a-z0-9]\w*)'\s*,\s*'(?P<helper_schema>\w+)'\s*,\s*'VIEW'\s*,\s*NULL\s*\)?",
    create_pattern: r"CREATE\s+VIEW\s+(?P<create_schema>\w+)\.(?P<create_view>[a-z0-9]\w*)\s+AS\b",
    terminator_pattern: r"^[ \t]*GO[ \t]*$",
    drop_template: "EXEC core.fn_dropifexists '{view}', '{schema}', 'VIEW', NULL\nGO",
};

impl SqlDialect {
    /// Build the combined statement pattern: a drop (with an optional trailing
    /// terminator) or a create running lazily up to the first terminator.
    ///
    /// Case-insensitive, multi-line, dot matches newline, CRLF-aware.
    pub fn statement_regex(&self) -> Result<Regex, SiteAdminError> {
        let pattern = format!(
            r"(?imsR)(?:(?:{drop})(?:\s*{term})?)|(?:(?:{create}).*?{term})",
            drop = self.drop_pattern,
            create = self.create_pattern,
            term = self.terminator_pattern,
        );
        Ok(Regex::new(&pattern)?)
    }

    pub fn render_drop(&self, schema: &str, view: &str) -> String {
        self.drop_template
            .replace("{schema}", schema)
            .replace("{view}", view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(dialect: &SqlDialect, sql: &str) -> Vec<String> {
        let re = dialect.statement_regex().unwrap();
        re.find_iter(sql).map(|m| m.as_str().to_string()).collect()
    }

    #[test]
    fn test_dialect_kind_parse_and_display() {
        assert_eq!("postgresql".parse::<DialectKind>().unwrap(), DialectKind::PostgreSql);
        assert_eq!("PGSQL".parse::<DialectKind>().unwrap(), DialectKind::PostgreSql);
        assert_eq!("mssql".parse::<DialectKind>().unwrap(), DialectKind::SqlServer);
        assert_eq!("SqlServer".parse::<DialectKind>().unwrap(), DialectKind::SqlServer);
        assert!("oracle".parse::<DialectKind>().is_err());

        assert_eq!(DialectKind::PostgreSql.to_string(), "postgresql");
        assert_eq!(DialectKind::SqlServer.to_string(), "sqlserver");
    }

    #[test]
    fn test_postgres_patterns_compile() {
        assert!(POSTGRESQL.statement_regex().is_ok());
        assert!(SQL_SERVER.statement_regex().is_ok());
    }

    #[test]
    fn test_postgres_create_includes_terminator() {
        let found = matches(
            &POSTGRESQL,
            "-- comment\nCREATE OR REPLACE VIEW core.Users AS\n  SELECT * FROM core.Principals;\n",
        );
        assert_eq!(
            found,
            vec!["CREATE OR REPLACE VIEW core.Users AS\n  SELECT * FROM core.Principals;"]
        );
    }

    #[test]
    fn test_postgres_drop_forms() {
        let sql = "DROP VIEW core.a;\nSELECT core.fn_dropifexists('b', 'core', 'VIEW', NULL);\ndrop view if exists core.c;";
        let found = matches(&POSTGRESQL, sql);
        assert_eq!(
            found,
            vec![
                "DROP VIEW core.a;",
                "SELECT core.fn_dropifexists('b', 'core', 'VIEW', NULL);",
                "drop view if exists core.c;",
            ]
        );
    }

    #[test]
    fn test_postgres_drop_lists_and_cascade() {
        let sql = "DROP VIEW IF EXISTS core.a CASCADE;\nDROP VIEW core.b, core.c RESTRICT;\n";
        let found = matches(&POSTGRESQL, sql);
        assert_eq!(
            found,
            vec!["DROP VIEW IF EXISTS core.a CASCADE;", "DROP VIEW core.b, core.c RESTRICT;"]
        );
    }

    #[test]
    fn test_helper_for_tables_is_ignored() {
        let sql = "SELECT core.fn_dropifexists('t', 'core', 'TABLE', NULL);";
        assert!(matches(&POSTGRESQL, sql).is_empty());
    }

    #[test]
    fn test_underscore_names_never_match() {
        let sql = "CREATE VIEW core._internal AS SELECT 1;\nDROP VIEW core._internal;";
        assert!(matches(&POSTGRESQL, sql).is_empty());
    }

    #[test]
    fn test_create_without_terminator_does_not_match() {
        assert!(matches(&POSTGRESQL, "CREATE VIEW core.foo AS SELECT 1").is_empty());
        assert!(matches(&SQL_SERVER, "CREATE VIEW core.foo AS SELECT 1;").is_empty());
    }

    #[test]
    fn test_sql_server_create_ends_at_go_line() {
        let sql = "CREATE VIEW core.Foo AS\r\n  SELECT 1 AS Going\r\nGO\r\n\r\nCREATE VIEW core.Bar AS SELECT 2\nGO\n";
        let found = matches(&SQL_SERVER, sql);
        assert_eq!(
            found,
            vec![
                "CREATE VIEW core.Foo AS\r\n  SELECT 1 AS Going\r\nGO",
                "CREATE VIEW core.Bar AS SELECT 2\nGO",
            ]
        );
    }

    #[test]
    fn test_sql_server_drop_forms() {
        let sql = "IF OBJECT_ID('core.a','V') IS NOT NULL DROP VIEW core.a\nGO\nEXEC core.fn_dropifexists 'b', 'core', 'VIEW', NULL\nGO\nDROP VIEW IF EXISTS core.c, core.d\nGO\n";
        let found = matches(&SQL_SERVER, sql);
        assert_eq!(
            found,
            vec![
                "IF OBJECT_ID('core.a','V') IS NOT NULL DROP VIEW core.a\nGO",
                "EXEC core.fn_dropifexists 'b', 'core', 'VIEW', NULL\nGO",
                "DROP VIEW IF EXISTS core.c, core.d\nGO",
            ]
        );
    }

    #[test]
    fn test_render_drop() {
        assert_eq!(
            POSTGRESQL.render_drop("core", "foo"),
            "SELECT core.fn_dropifexists('foo', 'core', 'VIEW', NULL);"
        );
        assert_eq!(
            SQL_SERVER.render_drop("core", "foo"),
            "EXEC core.fn_dropifexists 'foo', 'core', 'VIEW', NULL\nGO"
        );
    }
}
