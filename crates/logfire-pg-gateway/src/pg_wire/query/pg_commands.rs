//! psql meta-command interception
//!
//! psql expands `\dt` and `\d` into catalog queries against `pg_catalog`, which
//! the upstream does not have. Those queries are recognized here and answered
//! with the equivalent statement the user should run instead.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

/// Catalog query psql 15+ sends for `\dt`, whitespace-normalized
pub(crate) const LIST_TABLES_QUERY: &str = r#"SELECT n.nspname as "Schema", c.relname as "Name", CASE c.relkind WHEN 'r' THEN 'table' WHEN 'v' THEN 'view' WHEN 'm' THEN 'materialized view' WHEN 'i' THEN 'index' WHEN 'S' THEN 'sequence' WHEN 't' THEN 'TOAST table' WHEN 'f' THEN 'foreign table' WHEN 'p' THEN 'partitioned table' WHEN 'I' THEN 'partitioned index' END as "Type", pg_catalog.pg_get_userbyid(c.relowner) as "Owner" FROM pg_catalog.pg_class c LEFT JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace LEFT JOIN pg_catalog.pg_am am ON am.oid = c.relam WHERE c.relkind IN ('r','p','') AND n.nspname <> 'pg_catalog' AND n.nspname !~ '^pg_toast' AND n.nspname <> 'information_schema' AND pg_catalog.pg_table_is_visible(c.oid) ORDER BY 1,2;"#;

/// `\d <table>`
static DESCRIBE_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^SELECT c\.oid, n\.nspname, c\.relname FROM pg_catalog\.pg_class c LEFT JOIN pg_catalog\.pg_namespace n ON n\.oid = c\.relnamespace WHERE c\.relname OPERATOR\(pg_catalog\.~\) '\^\(([^)]+)\)\$' COLLATE pg_catalog\.default AND pg_catalog\.pg_table_is_visible\(c\.oid\) ORDER BY 2, 3;$",
    )
    .expect("valid describe-table pattern")
});

/// `\d <schema>.<table>`; capture 1 is the table, capture 2 the schema
static DESCRIBE_SCHEMA_TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^SELECT c\.oid, n\.nspname, c\.relname FROM pg_catalog\.pg_class c LEFT JOIN pg_catalog\.pg_namespace n ON n\.oid = c\.relnamespace WHERE c\.relname OPERATOR\(pg_catalog\.~\) '\^\(([^)]+)\)\$' COLLATE pg_catalog\.default AND n\.nspname OPERATOR\(pg_catalog\.~\) '\^\(([^)]+)\)\$' COLLATE pg_catalog\.default ORDER BY 2, 3;$",
    )
    .expect("valid describe-schema-table pattern")
});

/// A recognized psql meta-command and what to run instead
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsqlCommand {
    pub command: String,
    pub suggestion: String,
}

/// Collapse whitespace runs to single spaces and trim
pub fn normalize_whitespace(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Recognize psql's catalog queries for `\dt`, `\d table` and `\d schema.table`
pub fn detect_psql_command(sql: &str) -> Option<PsqlCommand> {
    let normalized = normalize_whitespace(sql);

    let detected = if normalized == LIST_TABLES_QUERY {
        PsqlCommand {
            command: "\\dt".into(),
            suggestion: "show tables;".into(),
        }
    } else if let Some(caps) = DESCRIBE_TABLE.captures(&normalized) {
        let table = &caps[1];
        PsqlCommand {
            command: format!("\\d {}", table),
            suggestion: format!("show columns from {};", table),
        }
    } else if let Some(caps) = DESCRIBE_SCHEMA_TABLE.captures(&normalized) {
        let (table, schema) = (&caps[1], &caps[2]);
        PsqlCommand {
            command: format!("\\d {}.{}", schema, table),
            suggestion: format!("show columns from {}.{};", schema, table),
        }
    } else {
        return None;
    };

    info!(
        command = %detected.command,
        suggestion = %detected.suggestion,
        "Intercepted psql meta-command"
    );
    Some(detected)
}
