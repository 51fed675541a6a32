//! The connection capability consumed from an embedded SQL engine.
//!
//! A [`Connection`] is one logical database handle. Methods take `&self`
//! so that a single handle can be shared (behind an `Arc`) between the
//! [`OpenHelper`](crate::OpenHelper) that prepares it and the operations
//! that use it afterwards; engines serialize access internally.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::cursor::{Cursor, CursorExt};
use crate::error::{DatabaseError, Result};
use crate::value::Parameters;

/// Where a database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    /// Private in-memory database, discarded on close.
    InMemory,
    /// Private on-disk temporary database, deleted on close.
    Temporary,
    /// Database file at an absolute path.
    File(PathBuf),
}

impl DatabaseLocation {
    /// Resolves a database name against a storage root.
    ///
    /// `None` selects an in-memory database and `Some("")` a temporary one;
    /// any other name becomes an absolute path under `storage_root`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::ConfigIo`] if the current directory is
    /// needed to make the path absolute and cannot be read.
    pub fn resolve(name: Option<&str>, storage_root: &Path) -> Result<Self> {
        match name {
            None => Ok(Self::InMemory),
            Some("") => Ok(Self::Temporary),
            Some(name) => Ok(Self::File(std::path::absolute(storage_root.join(name))?)),
        }
    }

    /// The file path, for file databases.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::InMemory | Self::Temporary => None,
        }
    }
}

impl fmt::Display for DatabaseLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InMemory => f.write_str(":memory:"),
            Self::Temporary => f.write_str("(temporary)"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A logical handle to one relational database.
pub trait Connection: Send + Sync {
    /// Opens the database. Opening an already open connection is a no-op.
    ///
    /// # Errors
    ///
    /// [`DatabaseError::OpenFailure`] when the engine cannot open the database.
    fn open(&self) -> Result<bool>;

    /// Closes the database. Closing a closed connection is a no-op.
    fn close(&self) -> Result<bool>;

    fn start_transaction(&self) -> Result<bool>;

    fn commit(&self) -> Result<bool>;

    fn rollback(&self) -> Result<bool>;

    /// Executes a statement that changes the database and returns the
    /// number of rows it affected.
    fn execute_update(&self, sql: &str, params: &Parameters) -> Result<usize>;

    /// Executes a query and returns a cursor positioned before its first row.
    fn execute_query(&self, sql: &str, params: &Parameters) -> Result<Box<dyn Cursor>>;

    fn is_open(&self) -> bool;

    /// Rows affected by the most recent write.
    fn changes(&self) -> usize;

    /// Row id of the most recent successful insert.
    fn last_inserted_row_id(&self) -> i64;

    fn location(&self) -> &DatabaseLocation;

    /// File path of the database; `None` for in-memory and temporary ones.
    fn path(&self) -> Option<&Path> {
        self.location().path()
    }

    /// Reads the persisted schema version (`PRAGMA user_version`).
    fn schema_version(&self) -> Result<u32> {
        let mut cursor = self.execute_query("PRAGMA user_version", &Parameters::None)?;
        let version = if cursor.next() { cursor.get_i64(0)? } else { 0 };
        cursor.close();
        u32::try_from(version).map_err(|_| DatabaseError::TypeMismatch {
            column: "user_version".to_string(),
            expected: "non-negative 32-bit integer",
            found: "integer",
        })
    }

    /// Persists `version` as the schema version.
    fn set_schema_version(&self, version: u32) -> Result<()> {
        self.execute_update(&format!("PRAGMA user_version = {version}"), &Parameters::None)?;
        Ok(())
    }
}

/// Creates unopened [`Connection`]s.
pub trait ConnectionFactory: Send + Sync {
    type Connection: Connection + 'static;

    fn create(&self, location: DatabaseLocation) -> Self::Connection;
}
