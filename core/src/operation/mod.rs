//! Single-use executable SQL operations.
//!
//! An operation pairs a borrowed [`Connection`](crate::Connection) with a
//! [`StatementBuilder`](crate::StatementBuilder), collects the table,
//! selection, and arguments for one statement, validates them, and hands
//! the rendered SQL to the connection. Executing consumes the operation.
//!
//! The table name is either a simple name (`champions`) or, for queries, a
//! join clause. The selection is the body of the WHERE clause, using either
//! `?` markers bound by [`Operation::selection_args`] or `:name` markers
//! bound by [`Operation::named_selection_args`]; only one of the two can be
//! bound on the same operation.

mod query;
mod update;

pub use query::QueryOperation;
pub use update::UpdateOperation;

use crate::error::{DatabaseError, Result};
use crate::value::{ContentValues, Parameters, Value};

/// Table, selection, and selection arguments shared by every operation.
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    table_name: Option<String>,
    selection: Option<String>,
    selection_args: Parameters,
}

impl OperationContext {
    /// The table name, or [`DatabaseError::MissingTableName`] if none was set.
    pub fn table(&self) -> Result<&str> {
        self.table_name
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or(DatabaseError::MissingTableName)
    }

    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    pub fn selection_args(&self) -> &Parameters {
        &self.selection_args
    }

    fn bind(&mut self, args: Parameters) -> Result<()> {
        let conflicting = matches!(
            (&self.selection_args, &args),
            (Parameters::Named(_), Parameters::Positional(_))
                | (Parameters::Positional(_), Parameters::Named(_))
        );
        if conflicting {
            return Err(DatabaseError::InvalidParameterBinding {
                bound: self.selection_args.describe(),
                requested: args.describe(),
            });
        }
        self.selection_args = args;
        Ok(())
    }

    fn take_selection_args(&mut self) -> Parameters {
        std::mem::take(&mut self.selection_args)
    }
}

/// Builder methods common to query and update operations.
pub trait Operation: Sized {
    fn context(&self) -> &OperationContext;

    fn context_mut(&mut self) -> &mut OperationContext;

    /// Sets the table name or join clause.
    fn table(mut self, name: impl Into<String>) -> Self {
        self.context_mut().table_name = Some(name.into());
        self
    }

    /// Sets the WHERE clause body, without the `WHERE` keyword.
    fn selection(mut self, selection: impl Into<String>) -> Self {
        self.context_mut().selection = Some(selection.into());
        self
    }

    /// Binds values, in order, to the `?` markers of the selection.
    ///
    /// # Errors
    ///
    /// [`DatabaseError::InvalidParameterBinding`] if named arguments are
    /// already bound.
    fn selection_args<I, V>(mut self, args: I) -> Result<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let args = args.into_iter().map(Into::into).collect();
        self.context_mut().bind(Parameters::Positional(args))?;
        Ok(self)
    }

    /// Binds values by name to the `:name` markers of the selection. Keys
    /// are given without the colon.
    ///
    /// # Errors
    ///
    /// [`DatabaseError::InvalidParameterBinding`] if positional arguments
    /// are already bound.
    fn named_selection_args(mut self, args: ContentValues) -> Result<Self> {
        self.context_mut().bind(Parameters::Named(args))?;
        Ok(self)
    }
}
