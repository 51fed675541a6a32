//! Engine-agnostic SQL access layer with a versioned schema lifecycle.
//!
//! This crate defines the capabilities an embedded SQL engine provides and
//! the pieces built on top of them:
//!
//! - [`Connection`] and [`ConnectionFactory`]: one logical database handle
//!   and the factory that creates it, unopened, for a [`DatabaseLocation`].
//! - [`Cursor`] and [`CursorExt`]: navigation over a result set and typed
//!   column access. [`RowSetCursor`] is a materialized implementation.
//! - [`StatementBuilder`]: renders SELECT, INSERT, UPDATE, and DELETE text.
//! - [`QueryOperation`] and [`UpdateOperation`]: validate a statement's
//!   table, selection, and arguments, pick the binding mode, and execute it.
//! - [`OpenHelper`]: prepares a connection exactly once (configure, create
//!   or migrate, persist the schema version, open) under concurrent callers,
//!   driven by [`SchemaCallbacks`] such as a declarative [`MigrationScript`].
//!
//! Arguments travel as [`Parameters`]: nothing, a positional list for `?`
//! markers, or a [`ContentValues`] map for `:name` markers.
//!
//! # Example
//!
//! ```no_run
//! use sqlhelper_core::*;
//!
//! # fn run<F: ConnectionFactory>(factory: F) -> Result<()> {
//! let config = HelperConfig::load("sqlhelper.yml")?;
//! let helper = OpenHelper::from_config(factory, &config)?;
//! let db = helper.prepare()?;
//!
//! UpdateOperation::new(db.as_ref())
//!     .table("champions")
//!     .content_values(content_values! { "name" => "Ahri", "level" => 3 })
//!     .execute_insert()?;
//!
//! let mut cursor = QueryOperation::new(db.as_ref())
//!     .table("champions")
//!     .selection("level >= ?")
//!     .selection_args([2])?
//!     .execute_query()?;
//! while cursor.next() {
//!     println!("{}", cursor.get_string("name")?);
//! }
//! # Ok(())
//! # }
//! ```

mod builder;
mod config;
mod connection;
mod cursor;
mod error;
mod helper;
mod migration;
mod operation;
mod value;

pub use builder::{SqlStatementBuilder, StatementBuilder};
pub use config::HelperConfig;
pub use connection::{Connection, ConnectionFactory, DatabaseLocation};
pub use cursor::{Column, Cursor, CursorExt, RowSetCursor};
pub use error::{BoxError, DatabaseError, MigrationPhase, Result, SharedError, TransactionAction};
pub use helper::{LifecycleState, NoopCallbacks, OpenHelper, PreparePhase, SchemaCallbacks};
pub use migration::MigrationScript;
pub use operation::{Operation, OperationContext, QueryOperation, UpdateOperation};
pub use value::{ContentValues, Parameters, Value};
