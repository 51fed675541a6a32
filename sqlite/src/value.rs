//! Conversions between [`Value`] and SQLite storage classes.
//!
//! | `Value`     | stored as                     |
//! |-------------|-------------------------------|
//! | `Null`      | NULL                          |
//! | `Bool`      | INTEGER 0 or 1                |
//! | `Integer`   | INTEGER                       |
//! | `Unsigned`  | INTEGER, if it fits in `i64`  |
//! | `Double`    | REAL                          |
//! | `Text`      | TEXT                          |
//! | `Blob`      | BLOB                          |
//! | `Timestamp` | REAL seconds since Unix epoch |
//!
//! Reading back yields the storage class, so booleans come back as
//! integers and timestamps as doubles; the typed cursor getters convert.

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use sqlhelper_core::Value;

use crate::error::SqliteError;

/// Borrowed [`Value`] bindable to a rusqlite statement.
pub(crate) struct SqlValue<'a>(pub(crate) &'a Value);

impl ToSql for SqlValue<'_> {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as Owned;

        Ok(match self.0 {
            Value::Null => ToSqlOutput::Owned(Owned::Null),
            Value::Bool(b) => ToSqlOutput::Owned(Owned::Integer(i64::from(*b))),
            Value::Integer(i) => ToSqlOutput::Owned(Owned::Integer(*i)),
            Value::Unsigned(u) => {
                let i = i64::try_from(*u).map_err(|_| {
                    rusqlite::Error::ToSqlConversionFailure(Box::new(SqliteError::UnsignedOverflow(*u)))
                })?;
                ToSqlOutput::Owned(Owned::Integer(i))
            }
            Value::Double(d) => ToSqlOutput::Owned(Owned::Real(*d)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            Value::Timestamp(t) => {
                let secs = t.timestamp() as f64 + f64::from(t.timestamp_subsec_nanos()) / 1e9;
                ToSqlOutput::Owned(Owned::Real(secs))
            }
        })
    }
}

/// Copies a column value out of a result row.
pub(crate) fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Double(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    }
}
