//! Error types for the SQLite engine.
//!
//! Engine failures are reported to callers as [`DatabaseError`] variants
//! naming the failing step, with a [`SqliteError`] attached as the source.

use std::path::PathBuf;

use sqlhelper_core::{DatabaseError, TransactionAction};
use thiserror::Error;

/// Errors raised by the SQLite engine.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The directory for a database file could not be created.
    #[error("failed to create directory '{}': {source}", path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An unsigned value does not fit SQLite's signed 64-bit integer.
    #[error("unsigned value {0} does not fit a 64-bit signed integer")]
    UnsignedOverflow(u64),
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;

pub(crate) fn open_failure(err: impl Into<SqliteError>) -> DatabaseError {
    DatabaseError::OpenFailure(Box::new(err.into()))
}

pub(crate) fn close_failure(err: rusqlite::Error) -> DatabaseError {
    DatabaseError::CloseFailure(Box::new(SqliteError::from(err)))
}

pub(crate) fn transaction_failure(action: TransactionAction, err: rusqlite::Error) -> DatabaseError {
    DatabaseError::transaction(action, SqliteError::from(err))
}

pub(crate) fn execution_failure(err: rusqlite::Error) -> DatabaseError {
    DatabaseError::execution(SqliteError::from(err))
}
