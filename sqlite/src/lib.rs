//! SQLite engine for the sqlhelper access layer.
//!
//! [`SqliteConnection`] implements [`Connection`](sqlhelper_core::Connection)
//! on top of rusqlite, and [`SqliteConnectionFactory`] plugs it into an
//! [`OpenHelper`](sqlhelper_core::OpenHelper). The schema version lives in
//! SQLite's `PRAGMA user_version` slot.
//!
//! # Quick start
//!
//! ```no_run
//! use sqlhelper_core::{MigrationScript, OpenHelper, Operation, UpdateOperation};
//! use sqlhelper_sqlite::SqliteConnectionFactory;
//!
//! let mut script = MigrationScript::default();
//! script.create.push("CREATE TABLE champions (id INTEGER PRIMARY KEY, name TEXT)".into());
//!
//! let helper = OpenHelper::new(SqliteConnectionFactory, script, Some("app.db"), 1, "data").unwrap();
//! let db = helper.prepare().unwrap();
//!
//! UpdateOperation::new(db.as_ref())
//!     .table("champions")
//!     .content_value("name", "Ahri")
//!     .execute_insert()
//!     .unwrap();
//! ```

mod connection;
mod error;
mod value;

pub use connection::{SqliteConnection, SqliteConnectionFactory};
pub use error::{Result, SqliteError};
