//! rusqlite-backed [`Connection`] and [`ConnectionFactory`].
//!
//! A [`SqliteConnection`] keeps its `rusqlite::Connection` behind a mutex,
//! so one handle can be shared between threads; statements on the same
//! handle run one at a time. Query results are read completely into a
//! [`RowSetCursor`] before the lock is released.

use std::fs;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{OpenFlags, Statement};
use sqlhelper_core::{
    Connection, ConnectionFactory, Cursor, DatabaseError, DatabaseLocation, Parameters,
    Result, RowSetCursor, TransactionAction,
};
use tracing::debug;

use crate::error::{
    SqliteError, close_failure, execution_failure, open_failure, transaction_failure,
};
use crate::value::{SqlValue, from_value_ref};

/// Creates [`SqliteConnection`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteConnectionFactory;

impl ConnectionFactory for SqliteConnectionFactory {
    type Connection = SqliteConnection;

    fn create(&self, location: DatabaseLocation) -> SqliteConnection {
        SqliteConnection::new(location)
    }
}

/// A SQLite database handle.
///
/// Created closed; [`open`](Connection::open) creates the database file
/// (and its parent directories) if needed.
#[derive(Debug)]
pub struct SqliteConnection {
    location: DatabaseLocation,
    inner: Mutex<Option<rusqlite::Connection>>,
}

impl SqliteConnection {
    pub fn new(location: DatabaseLocation) -> Self {
        Self {
            location,
            inner: Mutex::new(None),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<rusqlite::Connection>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_open<T>(&self, f: impl FnOnce(&rusqlite::Connection) -> Result<T>) -> Result<T> {
        let guard = self.lock();
        let conn = guard.as_ref().ok_or(DatabaseError::NotOpen)?;
        f(conn)
    }

    fn connect(&self) -> std::result::Result<rusqlite::Connection, SqliteError> {
        let conn = match &self.location {
            DatabaseLocation::InMemory => rusqlite::Connection::open_in_memory()?,
            DatabaseLocation::Temporary => rusqlite::Connection::open("")?,
            DatabaseLocation::File(path) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).map_err(|source| SqliteError::CreateDirectory {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
                rusqlite::Connection::open_with_flags(path, OpenFlags::default())?
            }
        };
        Ok(conn)
    }

    fn control(&self, sql: &str, action: TransactionAction) -> Result<bool> {
        self.with_open(|conn| {
            conn.execute_batch(sql)
                .map_err(|e| transaction_failure(action, e))?;
            debug!(location = %self.location, %action, "Transaction control");
            Ok(true)
        })
    }
}

impl Connection for SqliteConnection {
    fn open(&self) -> Result<bool> {
        let mut guard = self.lock();
        if guard.is_some() {
            return Ok(true);
        }
        let conn = self.connect().map_err(open_failure)?;
        debug!(location = %self.location, "Opened SQLite database");
        *guard = Some(conn);
        Ok(true)
    }

    fn close(&self) -> Result<bool> {
        let mut guard = self.lock();
        let Some(conn) = guard.take() else {
            return Ok(true);
        };
        match conn.close() {
            Ok(()) => {
                debug!(location = %self.location, "Closed SQLite database");
                Ok(true)
            }
            Err((conn, err)) => {
                *guard = Some(conn);
                Err(close_failure(err))
            }
        }
    }

    fn start_transaction(&self) -> Result<bool> {
        self.control("BEGIN", TransactionAction::Begin)
    }

    fn commit(&self) -> Result<bool> {
        self.control("COMMIT", TransactionAction::Commit)
    }

    fn rollback(&self) -> Result<bool> {
        self.control("ROLLBACK", TransactionAction::Rollback)
    }

    fn execute_update(&self, sql: &str, params: &Parameters) -> Result<usize> {
        self.with_open(|conn| {
            let mut stmt = conn.prepare(sql).map_err(execution_failure)?;
            bind(&mut stmt, params).map_err(execution_failure)?;
            // Drain instead of execute() so PRAGMAs that echo a row still succeed.
            let mut rows = stmt.raw_query();
            while rows.next().map_err(execution_failure)?.is_some() {}
            let changes = usize::try_from(conn.changes()).unwrap_or(usize::MAX);
            debug!(sql, changes, "Executed update");
            Ok(changes)
        })
    }

    fn execute_query(&self, sql: &str, params: &Parameters) -> Result<Box<dyn Cursor>> {
        self.with_open(|conn| {
            let mut stmt = conn.prepare(sql).map_err(execution_failure)?;
            bind(&mut stmt, params).map_err(execution_failure)?;
            let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

            let mut result = Vec::new();
            let mut rows = stmt.raw_query();
            while let Some(row) = rows.next().map_err(execution_failure)? {
                let values = (0..columns.len())
                    .map(|i| row.get_ref(i).map(from_value_ref))
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(execution_failure)?;
                result.push(values);
            }
            debug!(sql, rows = result.len(), "Executed query");
            Ok(Box::new(RowSetCursor::new(columns, result)) as Box<dyn Cursor>)
        })
    }

    fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    fn changes(&self) -> usize {
        self.lock()
            .as_ref()
            .map_or(0, |conn| usize::try_from(conn.changes()).unwrap_or(usize::MAX))
    }

    fn last_inserted_row_id(&self) -> i64 {
        self.lock().as_ref().map_or(0, rusqlite::Connection::last_insert_rowid)
    }

    fn location(&self) -> &DatabaseLocation {
        &self.location
    }
}

/// Binds positional values in order, or named values to `:name` markers.
/// Names already carrying a `:`, `@`, or `$` prefix are used as given.
fn bind(stmt: &mut Statement<'_>, params: &Parameters) -> rusqlite::Result<()> {
    match params {
        Parameters::None => Ok(()),
        Parameters::Positional(values) => {
            let expected = stmt.parameter_count();
            if values.len() != expected {
                return Err(rusqlite::Error::InvalidParameterCount(values.len(), expected));
            }
            for (i, value) in values.iter().enumerate() {
                stmt.raw_bind_parameter(i + 1, SqlValue(value))?;
            }
            Ok(())
        }
        Parameters::Named(values) => {
            for (name, value) in values {
                let marker = if name.starts_with([':', '@', '$']) {
                    name.clone()
                } else {
                    format!(":{name}")
                };
                let index = stmt
                    .parameter_index(&marker)?
                    .ok_or_else(|| rusqlite::Error::InvalidParameterName(marker.clone()))?;
                stmt.raw_bind_parameter(index, SqlValue(value))?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlhelper_core::{CursorExt, Value};

    fn open_memory() -> SqliteConnection {
        let db = SqliteConnectionFactory.create(DatabaseLocation::InMemory);
        db.open().unwrap();
        db.execute_update(
            "CREATE TABLE champions (id INTEGER PRIMARY KEY, name TEXT, level INTEGER)",
            &Parameters::None,
        )
        .unwrap();
        db
    }

    #[test]
    fn test_statements_on_closed_connection_fail() {
        let db = SqliteConnection::new(DatabaseLocation::InMemory);
        assert!(!db.is_open());
        assert!(matches!(
            db.execute_update("SELECT 1", &Parameters::None),
            Err(DatabaseError::NotOpen)
        ));
        assert!(matches!(db.start_transaction(), Err(DatabaseError::NotOpen)));
        assert_eq!(db.changes(), 0);
    }

    #[test]
    fn test_open_twice_is_noop() {
        let db = open_memory();
        assert!(db.open().unwrap());
        let mut cursor = db
            .execute_query("SELECT name FROM sqlite_master WHERE name = 'champions'", &Parameters::None)
            .unwrap();
        assert!(cursor.next());
    }

    #[test]
    fn test_named_binding_accepts_bare_and_prefixed_names() {
        let db = open_memory();
        let mut params = sqlhelper_core::ContentValues::new();
        params.insert("id".to_string(), Value::Integer(1));
        params.insert(":name".to_string(), Value::from("Ahri"));
        let changed = db
            .execute_update(
                "INSERT INTO champions (id, name) VALUES (:id, :name)",
                &Parameters::Named(params),
            )
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(db.last_inserted_row_id(), 1);
    }

    #[test]
    fn test_unknown_named_parameter_fails() {
        let db = open_memory();
        let mut params = sqlhelper_core::ContentValues::new();
        params.insert("nope".to_string(), Value::Integer(1));
        let err = db
            .execute_update("INSERT INTO champions (id) VALUES (:id)", &Parameters::Named(params))
            .unwrap_err();
        assert!(matches!(err, DatabaseError::ExecutionFailure(_)));
    }

    #[test]
    fn test_positional_count_mismatch_fails() {
        let db = open_memory();
        let err = db
            .execute_update(
                "INSERT INTO champions (id, name) VALUES (?, ?)",
                &Parameters::Positional(vec![Value::Integer(1)]),
            )
            .unwrap_err();
        assert!(matches!(err, DatabaseError::ExecutionFailure(_)));
    }

    #[test]
    fn test_query_materializes_rows() {
        let db = open_memory();
        for (id, name) in [(1, "Ahri"), (2, "Braum")] {
            db.execute_update(
                "INSERT INTO champions (id, name, level) VALUES (?, ?, ?)",
                &Parameters::Positional(vec![Value::from(id), Value::from(name), Value::Null]),
            )
            .unwrap();
        }
        let mut cursor = db
            .execute_query("SELECT id, name, level FROM champions ORDER BY id", &Parameters::None)
            .unwrap();
        assert_eq!(cursor.column_count(), 3);
        assert!(cursor.move_to_last());
        assert_eq!(cursor.get_string("name").unwrap(), "Braum");
        assert!(cursor.is_null("level").unwrap());
        assert!(cursor.previous());
        assert_eq!(cursor.get_i64(0).unwrap(), 1);
    }

    #[test]
    fn test_pragma_update_tolerates_result_row() {
        let db = open_memory();
        db.execute_update("PRAGMA journal_mode = MEMORY", &Parameters::None)
            .unwrap();
    }

    #[test]
    fn test_rollback_discards_changes() {
        let db = open_memory();
        db.start_transaction().unwrap();
        db.execute_update("INSERT INTO champions (id) VALUES (1)", &Parameters::None)
            .unwrap();
        db.rollback().unwrap();
        let mut cursor = db
            .execute_query("SELECT count(*) AS n FROM champions", &Parameters::None)
            .unwrap();
        assert!(cursor.next());
        assert_eq!(cursor.get_i64("n").unwrap(), 0);
    }

    #[test]
    fn test_commit_without_transaction_fails() {
        let db = open_memory();
        assert!(matches!(
            db.commit(),
            Err(DatabaseError::TransactionFailure {
                action: TransactionAction::Commit,
                ..
            })
        ));
    }

    #[test]
    fn test_close_then_reopen_memory_is_fresh() {
        let db = open_memory();
        assert!(db.close().unwrap());
        assert!(!db.is_open());
        assert!(db.close().unwrap());
        db.open().unwrap();
        assert!(db.execute_query("SELECT * FROM champions", &Parameters::None).is_err());
    }
}
