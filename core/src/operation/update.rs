use tracing::debug;

use super::{Operation, OperationContext};
use crate::builder::{SqlStatementBuilder, StatementBuilder};
use crate::connection::Connection;
use crate::error::{DatabaseError, Result};
use crate::value::{ContentValues, Parameters, Value};

/// An INSERT, UPDATE, or DELETE against a single table.
///
/// Content values map column names to the values written by inserts and
/// updates; they are ignored by deletes.
///
/// # Binding
///
/// - Inserts always use `:column` placeholders bound from the content values.
/// - Updates with named selection arguments bind the content values merged
///   with the selection arguments; a selection argument wins when both use
///   the same key.
/// - Updates without named selection arguments use `?` placeholders and bind
///   the content values (in column order) followed by the positional
///   selection arguments.
/// - Deletes bind the selection arguments as given.
pub struct UpdateOperation<'c, B: StatementBuilder = SqlStatementBuilder> {
    connection: &'c dyn Connection,
    builder: B,
    context: OperationContext,
    content_values: ContentValues,
}

impl<'c> UpdateOperation<'c> {
    /// Creates an operation using the default [`SqlStatementBuilder`].
    pub fn new(connection: &'c dyn Connection) -> Self {
        Self::with_builder(connection, SqlStatementBuilder)
    }
}

impl<'c, B: StatementBuilder> UpdateOperation<'c, B> {
    pub fn with_builder(connection: &'c dyn Connection, builder: B) -> Self {
        Self {
            connection,
            builder,
            context: OperationContext::default(),
            content_values: ContentValues::new(),
        }
    }

    /// Sets one column value.
    pub fn content_value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.content_values.insert(column.into(), value.into());
        self
    }

    /// Adds column values, replacing any already set for the same columns.
    pub fn content_values(mut self, values: ContentValues) -> Self {
        self.content_values.extend(values);
        self
    }

    /// Inserts one row and returns the number of rows inserted.
    ///
    /// # Errors
    ///
    /// [`DatabaseError::MissingContentValues`] or
    /// [`DatabaseError::MissingTableName`] before anything is sent to the
    /// engine; engine failures otherwise.
    pub fn execute_insert(self) -> Result<usize> {
        self.require_content()?;
        let table = self.context.table()?;
        let columns: Vec<&str> = self.content_values.keys().map(String::as_str).collect();
        let sql = self.builder.build_insert(table, &columns, true);
        debug!(sql = %sql, columns = columns.len(), "Executing insert");
        self.connection
            .execute_update(&sql, &Parameters::Named(self.content_values.clone()))
    }

    /// Updates the rows matching the selection and returns how many changed.
    pub fn execute_update(mut self) -> Result<usize> {
        self.require_content()?;
        let args = self.context.take_selection_args();
        let named = args.is_named();

        let table = self.context.table()?;
        let columns: Vec<&str> = self.content_values.keys().map(String::as_str).collect();
        let sql = self
            .builder
            .build_update(table, &columns, self.context.selection(), named);

        let bound = match args {
            Parameters::Named(selection_args) => {
                let mut merged = self.content_values.clone();
                merged.extend(selection_args);
                Parameters::Named(merged)
            }
            Parameters::Positional(selection_args) => Parameters::Positional(
                self.content_values
                    .values()
                    .cloned()
                    .chain(selection_args)
                    .collect(),
            ),
            Parameters::None => {
                Parameters::Positional(self.content_values.values().cloned().collect())
            }
        };
        debug!(sql = %sql, named, args = bound.len(), "Executing update");
        self.connection.execute_update(&sql, &bound)
    }

    /// Deletes the rows matching the selection (all rows without one) and
    /// returns how many were removed.
    pub fn execute_delete(self) -> Result<usize> {
        let table = self.context.table()?;
        let sql = self.builder.build_delete(table, self.context.selection());
        let args = self.context.selection_args();
        debug!(sql = %sql, named = args.is_named(), args = args.len(), "Executing delete");
        self.connection.execute_update(&sql, args)
    }

    fn require_content(&self) -> Result<()> {
        if self.content_values.is_empty() {
            Err(DatabaseError::MissingContentValues)
        } else {
            Ok(())
        }
    }
}

impl<B: StatementBuilder> Operation for UpdateOperation<'_, B> {
    fn context(&self) -> &OperationContext {
        &self.context
    }

    fn context_mut(&mut self) -> &mut OperationContext {
        &mut self.context
    }
}
