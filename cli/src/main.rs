use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use sqlhelper_core::{
    Connection, ContentValues, Cursor, CursorExt, HelperConfig, MigrationScript, OpenHelper,
    Operation, QueryOperation, UpdateOperation, Value,
};
use sqlhelper_sqlite::{SqliteConnection, SqliteConnectionFactory};
use tracing::debug;
use tracing_subscriber::EnvFilter;

type Helper = OpenHelper<SqliteConnectionFactory, MigrationScript>;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum CliOutputFormat {
    Json,
    Table,
}

#[derive(Debug, Parser)]
#[command(name = "sqlhelper")]
#[command(about = "Prepare versioned SQLite databases and run structured statements")]
struct Cli {
    /// Helper configuration file (YAML).
    #[arg(long, global = true, default_value = "sqlhelper.yml")]
    config: PathBuf,

    /// Log statements and lifecycle steps to stderr.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Prepare the database and report its location and schema version.
    Status,
    /// Run a SELECT and print the rows.
    Query(QueryArgs),
    /// Insert one row.
    Insert(InsertArgs),
    /// Update the rows matching a selection.
    Update(UpdateArgs),
    /// Delete the rows matching a selection.
    Delete(DeleteArgs),
}

/// WHERE clause and its arguments, shared by query, update, and delete.
#[derive(Debug, Args)]
struct SelectionArgs {
    /// WHERE clause body, with `?` or `:name` markers.
    #[arg(long = "where")]
    selection: Option<String>,

    /// Positional argument for a `?` marker (repeatable, in order).
    #[arg(long = "arg")]
    args: Vec<String>,

    /// Named argument NAME=VALUE for a `:NAME` marker (repeatable).
    #[arg(long = "named")]
    named: Vec<String>,
}

#[derive(Debug, Args)]
struct QueryArgs {
    /// Table name or join clause.
    #[arg(long)]
    table: String,

    /// Comma-separated result columns (default: all).
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    #[command(flatten)]
    selection: SelectionArgs,

    #[arg(long)]
    group_by: Option<String>,

    #[arg(long)]
    having: Option<String>,

    #[arg(long)]
    order_by: Option<String>,

    #[arg(long, default_value = "table")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct InsertArgs {
    #[arg(long)]
    table: String,

    /// Column value COLUMN=VALUE (repeatable).
    #[arg(long = "value", required = true)]
    values: Vec<String>,
}

#[derive(Debug, Args)]
struct UpdateArgs {
    #[arg(long)]
    table: String,

    /// Column value COLUMN=VALUE (repeatable).
    #[arg(long = "value", required = true)]
    values: Vec<String>,

    #[command(flatten)]
    selection: SelectionArgs,
}

#[derive(Debug, Args)]
struct DeleteArgs {
    #[arg(long)]
    table: String,

    #[command(flatten)]
    selection: SelectionArgs,
}

/// Query result as printed by `--format json`.
#[derive(Debug, Serialize)]
struct QueryOutput {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Status => run_status(&cli.config),
        Command::Query(args) => run_query(&cli.config, args),
        Command::Insert(args) => run_insert(&cli.config, args),
        Command::Update(args) => run_update(&cli.config, args),
        Command::Delete(args) => run_delete(&cli.config, args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("sqlhelper=debug,sqlhelper_core=debug,sqlhelper_sqlite=debug")
    } else {
        EnvFilter::new("sqlhelper=warn,sqlhelper_core=warn,sqlhelper_sqlite=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn open_helper(config_path: &Path) -> Result<Helper, String> {
    let config = HelperConfig::load(config_path)
        .map_err(|e| format!("Failed to load config '{}': {e}", config_path.display()))?;
    debug!(config = %config_path.display(), "Loaded configuration");
    OpenHelper::from_config(SqliteConnectionFactory, &config)
        .map_err(|e| format!("Invalid database location: {e}"))
}

fn prepare(helper: &Helper) -> Result<Arc<SqliteConnection>, String> {
    helper
        .prepare()
        .map_err(|e| format!("Failed to prepare database '{}': {e}", helper.location()))
}

fn run_status(config_path: &Path) -> Result<(), String> {
    let helper = open_helper(config_path)?;
    let db = prepare(&helper)?;
    let version = db
        .schema_version()
        .map_err(|e| format!("Failed to read schema version: {e}"))?;

    println!("Database: {}", helper.location());
    println!("Open: {}", if db.is_open() { "yes" } else { "no" });
    println!("Schema version: {version}");
    println!("State: {}", helper.state());

    helper
        .close()
        .map_err(|e| format!("Failed to close database: {e}"))
}

fn run_query(config_path: &Path, args: QueryArgs) -> Result<(), String> {
    let helper = open_helper(config_path)?;
    let db = prepare(&helper)?;

    let mut query = QueryOperation::new(db.as_ref()).table(&args.table);
    if !args.columns.is_empty() {
        query = query.projection(args.columns);
    }
    if let Some(group_by) = args.group_by {
        query = query.group_by(group_by);
    }
    if let Some(having) = args.having {
        query = query.having(having);
    }
    if let Some(order_by) = args.order_by {
        query = query.sort(order_by);
    }
    let query = apply_selection(query, args.selection)?;

    let mut cursor = query
        .execute_query()
        .map_err(|e| format!("Query on '{}' failed: {e}", args.table))?;
    let output = collect_rows(cursor.as_mut())?;
    cursor.close();

    match args.format {
        CliOutputFormat::Json => {
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| format!("Failed to serialize rows: {e}"))?;
            println!("{json}");
        }
        CliOutputFormat::Table => print_table(&output),
    }

    helper
        .close()
        .map_err(|e| format!("Failed to close database: {e}"))
}

fn run_insert(config_path: &Path, args: InsertArgs) -> Result<(), String> {
    let values = parse_assignments(&args.values)?;
    let helper = open_helper(config_path)?;
    let db = prepare(&helper)?;

    let inserted = UpdateOperation::new(db.as_ref())
        .table(&args.table)
        .content_values(values)
        .execute_insert()
        .map_err(|e| format!("Insert into '{}' failed: {e}", args.table))?;
    println!(
        "Inserted {inserted} row(s) into '{}' (last row id {}).",
        args.table,
        db.last_inserted_row_id()
    );

    helper
        .close()
        .map_err(|e| format!("Failed to close database: {e}"))
}

fn run_update(config_path: &Path, args: UpdateArgs) -> Result<(), String> {
    let values = parse_assignments(&args.values)?;
    let helper = open_helper(config_path)?;
    let db = prepare(&helper)?;

    let update = UpdateOperation::new(db.as_ref())
        .table(&args.table)
        .content_values(values);
    let updated = apply_selection(update, args.selection)?
        .execute_update()
        .map_err(|e| format!("Update of '{}' failed: {e}", args.table))?;
    println!("Updated {updated} row(s) in '{}'.", args.table);

    helper
        .close()
        .map_err(|e| format!("Failed to close database: {e}"))
}

fn run_delete(config_path: &Path, args: DeleteArgs) -> Result<(), String> {
    let helper = open_helper(config_path)?;
    let db = prepare(&helper)?;

    let delete = UpdateOperation::new(db.as_ref()).table(&args.table);
    let deleted = apply_selection(delete, args.selection)?
        .execute_delete()
        .map_err(|e| format!("Delete from '{}' failed: {e}", args.table))?;
    println!("Deleted {deleted} row(s) from '{}'.", args.table);

    helper
        .close()
        .map_err(|e| format!("Failed to close database: {e}"))
}

fn apply_selection<O: Operation>(mut operation: O, args: SelectionArgs) -> Result<O, String> {
    if let Some(selection) = args.selection {
        operation = operation.selection(selection);
    }
    if !args.args.is_empty() {
        let values: Vec<Value> = args.args.iter().map(|a| parse_value(a)).collect();
        operation = operation
            .selection_args(values)
            .map_err(|e| e.to_string())?;
    }
    if !args.named.is_empty() {
        operation = operation
            .named_selection_args(parse_assignments(&args.named)?)
            .map_err(|e| e.to_string())?;
    }
    Ok(operation)
}

fn collect_rows(cursor: &mut dyn Cursor) -> Result<QueryOutput, String> {
    let columns: Vec<String> = (0..cursor.column_count())
        .map(|i| cursor.column_name_for(i).unwrap_or_default().to_string())
        .collect();
    let mut rows = Vec::new();
    while cursor.next() {
        let row = (0..columns.len())
            .map(|i| cursor.get_value(i).cloned())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("Failed to read row: {e}"))?;
        rows.push(row);
    }
    Ok(QueryOutput { columns, rows })
}

fn print_table(output: &QueryOutput) {
    let cells: Vec<Vec<String>> = output
        .rows
        .iter()
        .map(|row| row.iter().map(render_value).collect())
        .collect();
    let widths: Vec<usize> = output
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .map(|row| row[i].len())
                .chain(std::iter::once(name.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    println!("{}", format_line(&output.columns, &widths));
    println!(
        "{}",
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  ")
    );
    for row in &cells {
        println!("{}", format_line(row, &widths));
    }
    println!("({} row(s))", output.rows.len());
}

fn format_line(values: &[String], widths: &[usize]) -> String {
    values
        .iter()
        .zip(widths)
        .map(|(value, &width)| format!("{value:<width$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Unsigned(u) => u.to_string(),
        Value::Double(d) => d.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(bytes) => format!("<{} bytes>", bytes.len()),
        Value::Timestamp(ts) => ts.to_rfc3339(),
    }
}

/// Parses command-line text into a value: `null`, an integer, a real, or
/// text. Quoting with `'...'` forces text.
fn parse_value(text: &str) -> Value {
    if let Some(quoted) = text
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        return Value::Text(quoted.to_string());
    }
    if text.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Ok(i) = text.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(d) = text.parse::<f64>() {
        if d.is_finite() {
            return Value::Double(d);
        }
    }
    Value::Text(text.to_string())
}

fn parse_assignments(assignments: &[String]) -> Result<ContentValues, String> {
    let mut values = ContentValues::new();
    for assignment in assignments {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| format!("Expected NAME=VALUE, got '{assignment}'"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("Missing column name in '{assignment}'"));
        }
        values.insert(name.to_string(), parse_value(value));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value_kinds() {
        assert_eq!(parse_value("NULL"), Value::Null);
        assert_eq!(parse_value("42"), Value::Integer(42));
        assert_eq!(parse_value("-3"), Value::Integer(-3));
        assert_eq!(parse_value("2.5"), Value::Double(2.5));
        assert_eq!(parse_value("Ahri"), Value::from("Ahri"));
        assert_eq!(parse_value("'42'"), Value::from("42"));
        assert_eq!(parse_value("inf"), Value::from("inf"));
        assert_eq!(parse_value(""), Value::from(""));
    }

    #[test]
    fn test_parse_assignments() {
        let values =
            parse_assignments(&["name=Ahri".to_string(), " level=3".to_string()]).unwrap();
        assert_eq!(values["name"], Value::from("Ahri"));
        assert_eq!(values["level"], Value::Integer(3));
    }

    #[test]
    fn test_parse_assignments_rejects_malformed() {
        assert!(parse_assignments(&["name".to_string()]).is_err());
        assert!(parse_assignments(&["=x".to_string()]).is_err());
    }

    #[test]
    fn test_render_value() {
        assert_eq!(render_value(&Value::Null), "NULL");
        assert_eq!(render_value(&Value::Blob(vec![1, 2, 3])), "<3 bytes>");
        assert_eq!(render_value(&Value::Double(1.5)), "1.5");
    }
}
