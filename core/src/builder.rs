//! SQL statement rendering from structured fragments.
//!
//! A table name may be a simple name (`champions`) or, for SELECT, a join
//! clause (`champions c JOIN skins s ON c.id = s.champion_id`). Table,
//! column, and selection text is inserted verbatim; only values travel
//! through bound parameters.
//!
//! # Example
//!
//! ```
//! use sqlhelper_core::{SqlStatementBuilder, StatementBuilder};
//!
//! let builder = SqlStatementBuilder;
//! assert_eq!(
//!     builder.build_select("champions", Some(&["id", "name"][..]), Some("owned = ?"), None, None, Some("name")),
//!     "SELECT id,name FROM champions WHERE owned = ? ORDER BY name"
//! );
//! assert_eq!(
//!     builder.build_insert("champions", &["id", "name"], true),
//!     "INSERT INTO champions (id,name) VALUES (:id,:name)"
//! );
//! ```

const PROJECTION_ALL: &str = "*";

/// Renders SELECT, INSERT, UPDATE, and DELETE statements.
///
/// Implementations must be pure: the same arguments always produce the
/// same text.
pub trait StatementBuilder: Send + Sync {
    /// `SELECT <projection|*> FROM <table> [WHERE ..] [GROUP BY ..] [HAVING ..] [ORDER BY ..]`
    ///
    /// Clauses whose argument is `None` or empty are omitted.
    fn build_select(
        &self,
        table: &str,
        projection: Option<&[&str]>,
        selection: Option<&str>,
        group_by: Option<&str>,
        having: Option<&str>,
        sort: Option<&str>,
    ) -> String;

    /// `INSERT INTO <table> (<cols>) VALUES (<placeholders>)`
    fn build_insert(&self, table: &str, column_names: &[&str], use_named_parameters: bool) -> String;

    /// `UPDATE <table> SET <col>=<placeholder>, .. [WHERE ..]`
    fn build_update(
        &self,
        table: &str,
        updating_column_names: &[&str],
        selection: Option<&str>,
        use_named_parameters: bool,
    ) -> String;

    /// `DELETE FROM <table> [WHERE ..]`
    fn build_delete(&self, table: &str, selection: Option<&str>) -> String;
}

/// The default [`StatementBuilder`], emitting plain ANSI-style SQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlStatementBuilder;

impl StatementBuilder for SqlStatementBuilder {
    fn build_select(
        &self,
        table: &str,
        projection: Option<&[&str]>,
        selection: Option<&str>,
        group_by: Option<&str>,
        having: Option<&str>,
        sort: Option<&str>,
    ) -> String {
        let columns = match projection {
            Some(columns) if !columns.is_empty() => columns.join(","),
            _ => PROJECTION_ALL.to_string(),
        };
        let mut sql = format!("SELECT {columns} FROM {table}");
        push_clause(&mut sql, "WHERE", selection);
        push_clause(&mut sql, "GROUP BY", group_by);
        push_clause(&mut sql, "HAVING", having);
        push_clause(&mut sql, "ORDER BY", sort);
        sql
    }

    fn build_insert(&self, table: &str, column_names: &[&str], use_named_parameters: bool) -> String {
        let placeholders: Vec<String> = column_names
            .iter()
            .map(|column| placeholder(column, use_named_parameters))
            .collect();
        format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            column_names.join(","),
            placeholders.join(",")
        )
    }

    fn build_update(
        &self,
        table: &str,
        updating_column_names: &[&str],
        selection: Option<&str>,
        use_named_parameters: bool,
    ) -> String {
        let assignments: Vec<String> = updating_column_names
            .iter()
            .map(|column| format!("{column}={}", placeholder(column, use_named_parameters)))
            .collect();
        let mut sql = format!("UPDATE {table} SET {}", assignments.join(", "));
        push_clause(&mut sql, "WHERE", selection);
        sql
    }

    fn build_delete(&self, table: &str, selection: Option<&str>) -> String {
        let mut sql = format!("DELETE FROM {table}");
        push_clause(&mut sql, "WHERE", selection);
        sql
    }
}

fn placeholder(column: &str, named: bool) -> String {
    if named {
        format!(":{column}")
    } else {
        "?".to_string()
    }
}

fn push_clause(sql: &mut String, keyword: &str, body: Option<&str>) {
    if let Some(body) = body.filter(|b| !b.is_empty()) {
        sql.push(' ');
        sql.push_str(keyword);
        sql.push(' ');
        sql.push_str(body);
    }
}
