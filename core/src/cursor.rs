//! Positioned, typed access to query results.
//!
//! A [`Cursor`] starts before the first row. Navigation methods return
//! whether the requested row exists; column reads are only valid while the
//! cursor sits on a row. Typed getters live on [`CursorExt`], which every
//! cursor (including `dyn Cursor`) gets for free, and accept either a
//! column index or a column name:
//!
//! ```
//! use sqlhelper_core::{Cursor, CursorExt, RowSetCursor, Value};
//!
//! let mut cursor = RowSetCursor::new(
//!     vec!["id".into(), "name".into()],
//!     vec![vec![Value::Integer(1), Value::from("Ahri")]],
//! );
//! assert!(cursor.next());
//! assert_eq!(cursor.get_i64(0).unwrap(), 1);
//! assert_eq!(cursor.get_string("name").unwrap(), "Ahri");
//! assert!(!cursor.next());
//! cursor.close();
//! ```

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{DatabaseError, Result};
use crate::value::Value;

/// Column reference by position or by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column<'a> {
    Index(usize),
    Name(&'a str),
}

impl From<usize> for Column<'_> {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl<'a> From<&'a str> for Column<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl<'a> From<&'a String> for Column<'a> {
    fn from(name: &'a String) -> Self {
        Self::Name(name.as_str())
    }
}

/// A positioned result of a query.
///
/// Not safe for concurrent use; each cursor has a single owner and is
/// closed exactly once when the owner is done with it.
pub trait Cursor: Send {
    /// Number of columns in the result.
    fn column_count(&self) -> usize;

    /// Name of the column at `index`, if it exists.
    fn column_name_for(&self, index: usize) -> Option<&str>;

    /// Index of the column called `name`, if it exists.
    fn column_index_for(&self, name: &str) -> Option<usize>;

    /// Raw value of the column at `index` in the current row.
    ///
    /// # Errors
    ///
    /// [`DatabaseError::CursorClosed`], [`DatabaseError::NotOnRow`], or
    /// [`DatabaseError::ColumnOutOfRange`].
    fn value_at(&self, index: usize) -> Result<&Value>;

    /// Moves to the next row.
    fn next(&mut self) -> bool;

    /// Moves to the previous row.
    fn previous(&mut self) -> bool;

    /// Moves to the first row.
    fn move_to_first(&mut self) -> bool;

    /// Moves to the last row.
    fn move_to_last(&mut self) -> bool;

    /// Moves `offset` rows forward (positive) or backward (negative).
    fn move_by(&mut self, offset: isize) -> bool;

    /// Moves to the zero-based row `position`.
    fn move_to_position(&mut self, position: usize) -> bool;

    /// Releases the cursor's rows. Later reads fail with
    /// [`DatabaseError::CursorClosed`] and navigation returns `false`.
    fn close(&mut self);

    /// Returns `true` once [`close`](Self::close) has been called.
    fn is_closed(&self) -> bool;
}

/// Typed column getters for every [`Cursor`].
pub trait CursorExt: Cursor {
    /// Resolves a column reference to an index.
    fn resolve<'c>(&self, column: impl Into<Column<'c>>) -> Result<usize> {
        match column.into() {
            Column::Index(index) => {
                let count = self.column_count();
                if index < count {
                    Ok(index)
                } else {
                    Err(DatabaseError::ColumnOutOfRange { index, count })
                }
            }
            Column::Name(name) => self
                .column_index_for(name)
                .ok_or_else(|| DatabaseError::NoSuchColumn(name.to_string())),
        }
    }

    /// Raw value of a column in the current row.
    fn get_value<'c>(&self, column: impl Into<Column<'c>>) -> Result<&Value> {
        let index = self.resolve(column)?;
        self.value_at(index)
    }

    /// Whether the column holds NULL in the current row.
    fn is_null<'c>(&self, column: impl Into<Column<'c>>) -> Result<bool> {
        Ok(self.get_value(column)?.is_null())
    }

    fn get_bool<'c>(&self, column: impl Into<Column<'c>>) -> Result<bool> {
        let index = self.resolve(column)?;
        match self.value_at(index)? {
            Value::Bool(b) => Ok(*b),
            Value::Integer(i) => Ok(*i != 0),
            Value::Unsigned(u) => Ok(*u != 0),
            Value::Double(d) => Ok(*d != 0.0),
            Value::Text(s) => match s.trim() {
                "1" | "true" | "TRUE" => Ok(true),
                "0" | "false" | "FALSE" => Ok(false),
                _ => Err(mismatch(self, index, "boolean", "text")),
            },
            other => Err(unconvertible(self, index, "boolean", other)),
        }
    }

    fn get_i32<'c>(&self, column: impl Into<Column<'c>>) -> Result<i32> {
        let index = self.resolve(column)?;
        let wide = self.get_i64(index)?;
        i32::try_from(wide).map_err(|_| mismatch(self, index, "32-bit integer", "integer"))
    }

    fn get_i64<'c>(&self, column: impl Into<Column<'c>>) -> Result<i64> {
        let index = self.resolve(column)?;
        match self.value_at(index)? {
            Value::Integer(i) => Ok(*i),
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::Unsigned(u) => {
                i64::try_from(*u).map_err(|_| mismatch(self, index, "integer", "unsigned integer"))
            }
            Value::Double(d) if d.fract() == 0.0 && d.abs() < 9.2e18 => Ok(*d as i64),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| mismatch(self, index, "integer", "text")),
            other => Err(unconvertible(self, index, "integer", other)),
        }
    }

    fn get_u64<'c>(&self, column: impl Into<Column<'c>>) -> Result<u64> {
        let index = self.resolve(column)?;
        match self.value_at(index)? {
            Value::Unsigned(u) => Ok(*u),
            Value::Integer(i) => {
                u64::try_from(*i).map_err(|_| mismatch(self, index, "unsigned integer", "integer"))
            }
            Value::Bool(b) => Ok(u64::from(*b)),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| mismatch(self, index, "unsigned integer", "text")),
            other => Err(unconvertible(self, index, "unsigned integer", other)),
        }
    }

    fn get_f64<'c>(&self, column: impl Into<Column<'c>>) -> Result<f64> {
        let index = self.resolve(column)?;
        match self.value_at(index)? {
            Value::Double(d) => Ok(*d),
            Value::Integer(i) => Ok(*i as f64),
            Value::Unsigned(u) => Ok(*u as f64),
            Value::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| mismatch(self, index, "double", "text")),
            other => Err(unconvertible(self, index, "double", other)),
        }
    }

    fn get_string<'c>(&self, column: impl Into<Column<'c>>) -> Result<String> {
        let index = self.resolve(column)?;
        match self.value_at(index)? {
            Value::Text(s) => Ok(s.clone()),
            Value::Integer(i) => Ok(i.to_string()),
            Value::Unsigned(u) => Ok(u.to_string()),
            Value::Double(d) => Ok(d.to_string()),
            Value::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
            Value::Blob(bytes) => String::from_utf8(bytes.clone())
                .map_err(|_| mismatch(self, index, "text", "blob")),
            Value::Timestamp(ts) => Ok(ts.to_rfc3339()),
            Value::Null => Err(unconvertible(self, index, "text", &Value::Null)),
        }
    }

    fn get_bytes<'c>(&self, column: impl Into<Column<'c>>) -> Result<Vec<u8>> {
        let index = self.resolve(column)?;
        match self.value_at(index)? {
            Value::Blob(bytes) => Ok(bytes.clone()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            other => Err(unconvertible(self, index, "blob", other)),
        }
    }

    /// Reads a timestamp. Numbers are seconds since the Unix epoch; text is
    /// RFC 3339 or `YYYY-MM-DD HH:MM:SS[.fff]` in UTC.
    fn get_timestamp<'c>(&self, column: impl Into<Column<'c>>) -> Result<DateTime<Utc>> {
        let index = self.resolve(column)?;
        let parsed = match self.value_at(index)? {
            Value::Timestamp(ts) => Some(*ts),
            Value::Integer(secs) => DateTime::from_timestamp(*secs, 0),
            Value::Double(secs) => seconds_to_timestamp(*secs),
            Value::Text(s) => parse_timestamp(s),
            other => return Err(unconvertible(self, index, "timestamp", other)),
        };
        let found = self.value_at(index)?.kind();
        parsed.ok_or_else(|| mismatch(self, index, "timestamp", found))
    }
}

impl<C: Cursor + ?Sized> CursorExt for C {}

fn column_label<C: Cursor + ?Sized>(cursor: &C, index: usize) -> String {
    cursor
        .column_name_for(index)
        .map_or_else(|| index.to_string(), str::to_string)
}

fn mismatch<C: Cursor + ?Sized>(
    cursor: &C,
    index: usize,
    expected: &'static str,
    found: &'static str,
) -> DatabaseError {
    DatabaseError::TypeMismatch {
        column: column_label(cursor, index),
        expected,
        found,
    }
}

fn unconvertible<C: Cursor + ?Sized>(
    cursor: &C,
    index: usize,
    expected: &'static str,
    value: &Value,
) -> DatabaseError {
    if value.is_null() {
        DatabaseError::UnexpectedNull {
            column: column_label(cursor, index),
        }
    } else {
        mismatch(cursor, index, expected, value.kind())
    }
}

fn seconds_to_timestamp(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Where a [`RowSetCursor`] currently points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    BeforeFirst,
    Row(usize),
    AfterLast,
}

/// A cursor over fully materialized rows.
///
/// Engines that cannot hand out borrowed row streams collect their results
/// into this type; test doubles use it directly.
#[derive(Debug, Clone)]
pub struct RowSetCursor {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    position: Position,
    closed: bool,
}

impl RowSetCursor {
    /// Creates a cursor positioned before the first row.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns,
            rows,
            position: Position::BeforeFirst,
            closed: false,
        }
    }

    /// A cursor with no columns and no rows.
    pub fn empty() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Number of rows in the result.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Zero-based index of the current row, if on one.
    pub fn position(&self) -> Option<usize> {
        match self.position {
            Position::Row(row) => Some(row),
            _ => None,
        }
    }

    /// Moves to `target` (which may lie outside the rows) and reports
    /// whether it landed on a row.
    fn seek(&mut self, target: isize) -> bool {
        if self.closed {
            return false;
        }
        let count = self.rows.len() as isize;
        self.position = if target < 0 {
            Position::BeforeFirst
        } else if target >= count {
            Position::AfterLast
        } else {
            Position::Row(target as usize)
        };
        matches!(self.position, Position::Row(_))
    }

    fn current_index(&self) -> isize {
        match self.position {
            Position::BeforeFirst => -1,
            Position::Row(row) => row as isize,
            Position::AfterLast => self.rows.len() as isize,
        }
    }
}

impl Cursor for RowSetCursor {
    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn column_name_for(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(String::as_str)
    }

    fn column_index_for(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
    }

    fn value_at(&self, index: usize) -> Result<&Value> {
        if self.closed {
            return Err(DatabaseError::CursorClosed);
        }
        let Position::Row(row) = self.position else {
            return Err(DatabaseError::NotOnRow);
        };
        let count = self.columns.len();
        self.rows[row]
            .get(index)
            .filter(|_| index < count)
            .ok_or(DatabaseError::ColumnOutOfRange { index, count })
    }

    fn next(&mut self) -> bool {
        if self.position == Position::AfterLast {
            return false;
        }
        self.seek(self.current_index() + 1)
    }

    fn previous(&mut self) -> bool {
        if self.position == Position::BeforeFirst {
            return false;
        }
        self.seek(self.current_index() - 1)
    }

    fn move_to_first(&mut self) -> bool {
        self.seek(0)
    }

    fn move_to_last(&mut self) -> bool {
        self.seek(self.rows.len() as isize - 1)
    }

    fn move_by(&mut self, offset: isize) -> bool {
        self.seek(self.current_index().saturating_add(offset))
    }

    fn move_to_position(&mut self, position: usize) -> bool {
        self.seek(isize::try_from(position).unwrap_or(isize::MAX))
    }

    fn close(&mut self) {
        self.closed = true;
        self.rows = Vec::new();
        self.position = Position::AfterLast;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
