//! Error types for statement execution, cursors, and the schema lifecycle.
//!
//! Usage errors ([`DatabaseError::MissingTableName`],
//! [`DatabaseError::MissingContentValues`],
//! [`DatabaseError::InvalidParameterBinding`]) are raised before any
//! statement reaches the engine. Lifecycle and execution errors carry the
//! engine's own error as their `source`.

use std::fmt;
use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Boxed engine error attached as the source of lifecycle and execution failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Engine error reported to every caller that waited on the same failed
/// preparation pass.
#[derive(Debug, Clone)]
pub struct SharedError(Arc<dyn std::error::Error + Send + Sync + 'static>);

impl fmt::Display for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for SharedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

fn share_source(source: BoxError) -> BoxError {
    if source.is::<SharedError>() {
        return source;
    }
    Box::new(SharedError(Arc::from(source)))
}

fn copy_source(source: &BoxError) -> BoxError {
    match source.downcast_ref::<SharedError>() {
        Some(shared) => Box::new(shared.clone()),
        None => source.to_string().into(),
    }
}

/// Transaction control step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionAction {
    Begin,
    Commit,
    Rollback,
}

impl fmt::Display for TransactionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Begin => "begin",
            Self::Commit => "commit",
            Self::Rollback => "rollback",
        })
    }
}

/// Schema lifecycle hook that raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPhase {
    Create,
    Upgrade { from: u32, to: u32 },
    Downgrade { from: u32, to: u32 },
    Open,
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Upgrade { from, to } => write!(f, "upgrade {from} -> {to}"),
            Self::Downgrade { from, to } => write!(f, "downgrade {from} -> {to}"),
            Self::Open => f.write_str("open"),
        }
    }
}

/// Errors that can occur while building, executing, or reading SQL statements
/// and while preparing a database.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An operation was executed without a table name.
    #[error("operation has no table name")]
    MissingTableName,

    /// An insert or update was executed without any content values.
    #[error("operation has no content values")]
    MissingContentValues,

    /// Positional and named selection arguments were both supplied.
    #[error("selection arguments are already bound {bound}; cannot also bind them {requested}")]
    InvalidParameterBinding {
        bound: &'static str,
        requested: &'static str,
    },

    /// The engine could not open the database.
    #[error("failed to open database: {0}")]
    OpenFailure(#[source] BoxError),

    /// The engine could not close the database.
    #[error("failed to close database: {0}")]
    CloseFailure(#[source] BoxError),

    /// Transaction control failed.
    #[error("transaction {action} failed: {source}")]
    TransactionFailure {
        action: TransactionAction,
        #[source]
        source: BoxError,
    },

    /// The configure hook failed.
    #[error("database configuration failed: {0}")]
    ConfigurationFailure(#[source] BoxError),

    /// A create, upgrade, downgrade, or open hook failed.
    #[error("schema {phase} failed: {source}")]
    MigrationFailure {
        phase: MigrationPhase,
        #[source]
        source: BoxError,
    },

    /// The engine rejected or failed to run a bound statement.
    #[error("statement execution failed: {0}")]
    ExecutionFailure(#[source] BoxError),

    /// A statement was issued against a connection that is not open.
    #[error("database is not open")]
    NotOpen,

    /// The cursor was used after [`close`](crate::Cursor::close).
    #[error("cursor is closed")]
    CursorClosed,

    /// A column was read while the cursor was not positioned on a row.
    #[error("cursor is not positioned on a row")]
    NotOnRow,

    /// No column with the given name exists in the result.
    #[error("no such column: {0}")]
    NoSuchColumn(String),

    /// A column index beyond the result's column count.
    #[error("column index {index} out of range for {count} columns")]
    ColumnOutOfRange { index: usize, count: usize },

    /// A typed getter hit a NULL column value.
    #[error("column {column} is NULL")]
    UnexpectedNull { column: String },

    /// A column value could not be converted to the requested type.
    #[error("column {column} holds {found}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Configuration file I/O failure.
    #[error("config I/O error: {0}")]
    ConfigIo(#[from] std::io::Error),

    /// Configuration file could not be parsed or serialized.
    #[error("config YAML error: {0}")]
    ConfigYaml(#[from] serde_yaml::Error),
}

impl DatabaseError {
    /// Wraps an engine error raised while executing a statement.
    pub fn execution(source: impl Into<BoxError>) -> Self {
        Self::ExecutionFailure(source.into())
    }

    /// Wraps an engine error raised by transaction control.
    pub fn transaction(action: TransactionAction, source: impl Into<BoxError>) -> Self {
        Self::TransactionFailure {
            action,
            source: source.into(),
        }
    }

    /// Moves every engine source behind a shared handle so that
    /// [`duplicate`](Self::duplicate) can hand out equal copies.
    pub(crate) fn into_shared(self) -> Self {
        match self {
            Self::OpenFailure(source) => Self::OpenFailure(share_source(source)),
            Self::CloseFailure(source) => Self::CloseFailure(share_source(source)),
            Self::TransactionFailure { action, source } => Self::TransactionFailure {
                action,
                source: share_source(source),
            },
            Self::ConfigurationFailure(source) => Self::ConfigurationFailure(share_source(source)),
            Self::MigrationFailure { phase, source } => Self::MigrationFailure {
                phase,
                source: share_source(source),
            },
            Self::ExecutionFailure(source) => Self::ExecutionFailure(share_source(source)),
            other => other,
        }
    }

    /// Same variant and message; shared sources are reused, other sources
    /// are copied by their message.
    pub(crate) fn duplicate(&self) -> Self {
        match self {
            Self::MissingTableName => Self::MissingTableName,
            Self::MissingContentValues => Self::MissingContentValues,
            Self::InvalidParameterBinding { bound, requested } => Self::InvalidParameterBinding {
                bound: *bound,
                requested: *requested,
            },
            Self::OpenFailure(source) => Self::OpenFailure(copy_source(source)),
            Self::CloseFailure(source) => Self::CloseFailure(copy_source(source)),
            Self::TransactionFailure { action, source } => Self::TransactionFailure {
                action: *action,
                source: copy_source(source),
            },
            Self::ConfigurationFailure(source) => Self::ConfigurationFailure(copy_source(source)),
            Self::MigrationFailure { phase, source } => Self::MigrationFailure {
                phase: *phase,
                source: copy_source(source),
            },
            Self::ExecutionFailure(source) => Self::ExecutionFailure(copy_source(source)),
            Self::NotOpen => Self::NotOpen,
            Self::CursorClosed => Self::CursorClosed,
            Self::NotOnRow => Self::NotOnRow,
            Self::NoSuchColumn(name) => Self::NoSuchColumn(name.clone()),
            Self::ColumnOutOfRange { index, count } => Self::ColumnOutOfRange {
                index: *index,
                count: *count,
            },
            Self::UnexpectedNull { column } => Self::UnexpectedNull {
                column: column.clone(),
            },
            Self::TypeMismatch {
                column,
                expected,
                found,
            } => Self::TypeMismatch {
                column: column.clone(),
                expected: *expected,
                found: *found,
            },
            Self::ConfigIo(err) => Self::ConfigIo(io::Error::new(err.kind(), err.to_string())),
            Self::ConfigYaml(err) => {
                Self::ConfigIo(io::Error::new(io::ErrorKind::InvalidData, err.to_string()))
            }
        }
    }

    /// Returns `true` for errors detected before any engine call.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            Self::MissingTableName
                | Self::MissingContentValues
                | Self::InvalidParameterBinding { .. }
        )
    }
}

/// Convenience alias for results with [`DatabaseError`].
pub type Result<T> = std::result::Result<T, DatabaseError>;
